//! SeaORM entity models
//!
//! Database entities for DocLens

mod analysis;
mod chat_message;
mod file_ref;
mod note;
mod share_token;
mod shared_analysis;
mod user;

pub use user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, Model as User,
};

pub use analysis::{
    ActiveModel as AnalysisActiveModel, Column as AnalysisColumn, Entity as AnalysisEntity,
    Model as Analysis,
};

pub use chat_message::{
    ActiveModel as ChatMessageActiveModel, Column as ChatMessageColumn,
    Entity as ChatMessageEntity, Model as ChatMessage,
};

pub use note::{
    ActiveModel as NoteActiveModel, Column as NoteColumn, Entity as NoteEntity, Model as Note,
    NoteType,
};

pub use shared_analysis::{
    ActiveModel as SharedAnalysisActiveModel, Column as SharedAnalysisColumn,
    Entity as SharedAnalysisEntity, Model as SharedAnalysis,
};

pub use share_token::{
    ActiveModel as ShareTokenActiveModel, Column as ShareTokenColumn, Entity as ShareTokenEntity,
    Model as ShareToken,
};

pub use file_ref::FileRef;
