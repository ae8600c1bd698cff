//! Form submission entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "form_submission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub form_id: String,

    /// Submitted values keyed by field label (JSON object)
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,

    #[sea_orm(nullable)]
    pub submitted_by_name: Option<String>,

    #[sea_orm(nullable)]
    pub submitted_by_email: Option<String>,

    #[sea_orm(nullable)]
    pub submitted_by_phone: Option<String>,

    #[sea_orm(nullable)]
    pub ip_address: Option<String>,

    /// Normalized email for single-submission forms; unique per form
    #[sea_orm(nullable)]
    pub dedupe_key: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::form::Entity",
        from = "Column::FormId",
        to = "super::form::Column::Id"
    )]
    Form,
}

impl Related<super::form::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Form.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
