//! Share token entity (link grant)
//!
//! A capability: possession of the 64-hex-char token plus a successful claim
//! creates a `SharedAnalysis` row. Expiry, use caps, and the `is_active`
//! switch are evaluated lazily at claim/validation time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "share_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub analysis_id: Uuid,

    pub owner_id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub token: String,

    pub expires_at: Option<DateTimeWithTimeZone>,

    pub max_uses: Option<i32>,

    pub use_count: i32,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis::Entity",
        from = "Column::AnalysisId",
        to = "super::analysis::Column::Id"
    )]
    Analysis,
}

impl Related<super::analysis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Analysis.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
