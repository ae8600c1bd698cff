//! URL slugs.

/// Turn arbitrary text into a URL slug.
///
/// Lowercase ASCII letters and digits are kept, common accented Latin letters
/// fold to their base letter, other non-ASCII characters are dropped, and
/// every run of anything else becomes a single `-`.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        let mut buf = [0u8; 4];
        let piece = if c.is_ascii_alphanumeric() {
            &*c.encode_utf8(&mut buf)
        } else if let Some(folded) = fold_latin(c) {
            folded
        } else {
            if c.is_ascii() || c.is_whitespace() {
                pending_dash = true;
            }
            continue;
        };

        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.push_str(piece);
    }

    slug
}

/// Whether `slug` only holds ASCII letters, digits, `-` and `_`.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

const fn fold_latin(c: char) -> Option<&'static str> {
    Some(match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'ł' | 'ľ' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        'þ' => "th",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Member Survey 2025"), "member-survey-2025");
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
        assert_eq!(slugify("snake_case-and--dashes"), "snake-case-and-dashes");
    }

    #[test]
    fn test_slugify_folds_accents() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("Straße"), "strasse");
    }

    #[test]
    fn test_slugify_drops_other_scripts() {
        assert_eq!(slugify("Формы"), "");
        assert_eq!(slugify("Survey 調査"), "survey");
    }

    #[test]
    fn test_slugify_clone_title() {
        assert_eq!(
            slugify("Survey Copy 1741950000"),
            "survey-copy-1741950000"
        );
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("member-survey_2025"));
        assert!(!is_valid_slug("member survey"));
        assert!(!is_valid_slug("café"));
        assert!(!is_valid_slug(""));
    }
}
