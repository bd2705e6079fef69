//! API handlers module

pub mod analyses;
pub mod files;
pub mod health;
pub mod llm;
pub mod share_link;
pub mod shares;
