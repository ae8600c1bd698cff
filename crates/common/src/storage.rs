//! Blob storage abstraction for uploaded files.
//!
//! Stored files are addressed by relative keys such as
//! `form-submissions/2025/03/14/01hq....pdf`. Any backend that can put, delete
//! and resolve keys works; local filesystem and in-memory backends ship here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::{AppError, AppResult};

/// Metadata of a file written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Storage key (relative path or object key).
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
    /// MD5 hash of the file.
    pub md5: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload a file.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile>;

    /// Delete a file. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Shared handle to the configured storage backend.
pub type StorageService = Arc<dyn StorageBackend>;

fn stored_file(key: &str, url: String, data: &[u8], content_type: &str) -> StoredFile {
    StoredFile {
        key: key.to_string(),
        url,
        size: data.len() as u64,
        content_type: content_type.to_string(),
        md5: format!("{:x}", md5::compute(data)),
    }
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
            return Err(AppError::Storage(format!("Invalid storage key: {key}")));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        Ok(stored_file(key, self.public_url(key), data, content_type))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {e}"))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat file: {e}")))
    }
}

/// In-memory storage backend, for tests and throwaway deployments.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    base_url: String,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage backend.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            files: Arc::default(),
        }
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryStorage {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile> {
        self.files
            .lock()
            .map_err(|_| AppError::Storage("storage lock poisoned".to_string()))?
            .insert(key.to_string(), data.to_vec());
        Ok(stored_file(key, self.public_url(key), data, content_type))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.files
            .lock()
            .map_err(|_| AppError::Storage("storage lock poisoned".to_string()))?
            .remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self
            .files
            .lock()
            .map_err(|_| AppError::Storage("storage lock poisoned".to_string()))?
            .contains_key(key))
    }
}

/// Generate a unique storage key for a file under `prefix`.
#[must_use]
pub fn generate_storage_key(prefix: &str, original_name: &str) -> String {
    use chrono::Utc;

    let date_path = Utc::now().format("%Y/%m/%d").to_string();

    // Extract extension from original name
    let extension = original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase);

    format!(
        "{}/{}/{}.{}",
        prefix.trim_end_matches('/'),
        date_path,
        ulid::Ulid::new().to_string().to_lowercase(),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_storage_key() {
        let key = generate_storage_key("form-submissions", "Scan.PDF");
        assert!(key.starts_with("form-submissions/"));
        assert!(key.ends_with(".pdf"));
        assert_eq!(key.split('/').count(), 5);
    }

    #[test]
    fn test_generate_storage_key_no_extension() {
        let key = generate_storage_key("form-submissions", "file");
        assert!(key.ends_with(".bin"));
    }

    #[test]
    fn test_generate_storage_key_rejects_odd_extension() {
        let key = generate_storage_key("form-submissions", "evil.p/hp");
        assert!(key.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new("/storage");
        let stored = storage
            .upload("form-submissions/a.txt", b"hello", "text/plain")
            .await
            .unwrap();

        assert_eq!(stored.url, "/storage/form-submissions/a.txt");
        assert_eq!(stored.size, 5);
        assert!(storage.exists("form-submissions/a.txt").await.unwrap());

        storage.delete("form-submissions/a.txt").await.unwrap();
        assert!(!storage.exists("form-submissions/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_storage_rejects_traversal() {
        let storage = LocalStorage::new(PathBuf::from("./storage"), "/storage".to_string());
        let result = storage.upload("../etc/passwd", b"x", "text/plain").await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }
}
