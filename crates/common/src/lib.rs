//! DocLens Common Library
//!
//! Shared code for the DocLens services including:
//! - Database models and repository patterns
//! - Access evaluation and identity resolution
//! - Sharing, note threads, and duplication
//! - Blob storage abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod access;
pub mod config;
pub mod db;
pub mod duplication;
pub mod errors;
pub mod identity;
pub mod metrics;
pub mod notes;
pub mod sharing;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use identity::Identity;
pub use storage::BlobStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-owner analysis cap; inserting past it evicts the oldest rows
pub const MAX_ANALYSES_PER_OWNER: usize = 20;
