//! Ingestion error types

use automarks_common::errors::AppError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Input directory {path} not readable: {source}")]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No result documents found in {0}")]
    NoDocuments(PathBuf),

    #[error("Batch {batch_id} failed: no document could be saved")]
    BatchFailed { batch_id: String },

    #[error(transparent)]
    App(#[from] AppError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
