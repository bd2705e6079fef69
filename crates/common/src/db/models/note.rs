//! Note entity
//!
//! Two-level tree: a top-level note carries an anchor into the document; a
//! reply points at its parent via `parent_note_id` and carries a copy of the
//! parent's tab/anchor fields so it renders at the same location. Nesting is
//! exactly one level deep.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Client-visible note classification.
///
/// Unknown values coerce to `Observational`; a bad string is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Observational,
    Actionable,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Observational => "observational",
            NoteType::Actionable => "actionable",
        }
    }

    /// Coerce a client-supplied string, defaulting to observational
    pub fn coerce(raw: Option<&str>) -> Self {
        match raw {
            Some("actionable") => NoteType::Actionable,
            _ => NoteType::Observational,
        }
    }
}

impl Default for NoteType {
    fn default() -> Self {
        NoteType::Observational
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub analysis_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub tab: String,

    #[sea_orm(column_type = "Text")]
    pub anchor_text: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub anchor_prefix: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub anchor_suffix: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text")]
    pub note_type: String,

    pub author_id: Uuid,

    /// Null for top-level notes; set for replies
    pub parent_note_id: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn is_reply(&self) -> bool {
        self.parent_note_id.is_some()
    }

    pub fn note_type(&self) -> NoteType {
        NoteType::coerce(Some(self.note_type.as_str()))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis::Entity",
        from = "Column::AnalysisId",
        to = "super::analysis::Column::Id"
    )]
    Analysis,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id"
    )]
    Author,
}

impl Related<super::analysis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Analysis.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_type_coercion() {
        assert_eq!(NoteType::coerce(Some("actionable")), NoteType::Actionable);
        assert_eq!(
            NoteType::coerce(Some("observational")),
            NoteType::Observational
        );
        assert_eq!(NoteType::coerce(Some("banana")), NoteType::Observational);
        assert_eq!(NoteType::coerce(None), NoteType::Observational);
    }
}
