//! Analysis entity
//!
//! The central record of the application: one uploaded-document analysis
//! with its LLM outputs, per-tab view state, and a list of file references
//! pointing into blob storage.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analyses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Ordered `FileRef` array as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub file_metadata: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub summary_response: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub comparison_response: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub language_response: Option<String>,

    /// Per-tab view state; merged per tab on update, never replaced wholesale
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub table_view_state: Option<serde_json::Value>,

    /// Opaque editor draft; replaced wholesale on update
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub draft_state: Option<serde_json::Value>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,

    #[sea_orm(has_many = "super::chat_message::Entity")]
    ChatMessages,

    #[sea_orm(has_many = "super::note::Entity")]
    Notes,

    #[sea_orm(has_many = "super::shared_analysis::Entity")]
    Shares,

    #[sea_orm(has_many = "super::share_token::Entity")]
    ShareTokens,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::chat_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatMessages.def()
    }
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
