//! Form entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "form")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    /// URL-safe public identifier
    #[sea_orm(unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Storage key of the header image
    #[sea_orm(nullable)]
    pub thumbnail: Option<String>,

    /// Ordered field definitions (JSON array)
    #[sea_orm(column_type = "JsonBinary")]
    pub fields: Json,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    #[sea_orm(default_value = true)]
    pub allow_multiple_submissions: bool,

    /// Never persist submitter identity when set
    #[sea_orm(default_value = false)]
    pub is_anonymous: bool,

    #[sea_orm(nullable)]
    pub submission_limit: Option<i32>,

    /// Recorded submissions, maintained atomically alongside inserts/deletes
    #[sea_orm(default_value = 0)]
    pub submission_count: i32,

    #[sea_orm(nullable)]
    pub start_date: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub end_date: Option<DateTimeWithTimeZone>,

    /// Where clients go after a successful submission
    #[sea_orm(column_type = "Text", nullable)]
    pub redirect: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,

    /// Soft-delete marker
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::form_submission::Entity")]
    Submissions,
}

impl Related<super::form_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
