//! AutoMarks Common Library
//!
//! Shared code for the AutoMarks services including:
//! - Database models and the result store repository
//! - Query scopes and their validation
//! - Batch ingestion of extracted result documents
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod metrics;
pub mod scope;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository, ResultRow};
pub use errors::{AppError, Result};
pub use scope::ResultScope;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
