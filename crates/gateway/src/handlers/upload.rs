//! Extracted result upload handlers
//!
//! Documents are accepted in bulk and ingested on a background task; clients
//! poll the upload log for progress.

use crate::AppState;
use automarks_common::db::models::UploadLog;
use automarks_common::db::PurgeReport;
use automarks_common::errors::{AppError, Result};
use automarks_common::ingest::{BatchIngestor, ExtractedStudentResult, SourceDocument};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    /// Cohort (YYYY-YYYY) assigned to students seen for the first time
    #[serde(default)]
    pub batch: Option<String>,

    #[validate(length(min = 1, max = 1000))]
    pub documents: Vec<ExtractedStudentResult>,
}

#[derive(Serialize)]
pub struct UploadAccepted {
    pub batch_id: String,
    pub total_files: usize,
    pub status: String,
    pub poll_url: String,
}

#[derive(Serialize)]
pub struct UploadStatusResponse {
    pub batch_id: String,
    pub total_files: i32,
    pub processed: i32,
    pub failed: i32,
    pub current_file: Option<String>,
    pub current_file_index: i32,
    pub percentage: u32,
    pub status: String,
    pub errors: Vec<String>,
}

impl From<UploadLog> for UploadStatusResponse {
    fn from(log: UploadLog) -> Self {
        Self {
            percentage: log.progress_percent().floor() as u32,
            errors: log.errors(),
            batch_id: log.batch_id,
            total_files: log.total_files,
            processed: log.processed_files,
            failed: log.failed_files,
            current_file: log.current_file,
            current_file_index: log.current_file_index,
            status: log.status,
        }
    }
}

#[derive(Serialize)]
pub struct DeleteBatchResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: PurgeReport,
}

/// Label a document by position and USN for progress and error reporting
fn source_label(index: usize, document: &ExtractedStudentResult) -> String {
    format!("document {} ({})", index + 1, document.usn.trim())
}

/// Accept a set of extracted documents and ingest them in the background
pub async fn upload_extracted(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<(StatusCode, Json<UploadAccepted>)> {
    request.validate()?;

    let ingestor = BatchIngestor::new(state.repo.clone(), request.batch.as_deref())?
        .fail_fast(state.config.ingestion.fail_fast);

    let documents: Vec<SourceDocument> = request
        .documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| SourceDocument {
            source: source_label(index, &document),
            document,
        })
        .collect();

    let total_files = documents.len();
    let batch_id = ingestor.start(total_files).await?;

    let task_batch_id = batch_id.clone();
    tokio::spawn(async move {
        if let Err(e) = ingestor.run(&task_batch_id, documents).await {
            tracing::error!(batch_id = %task_batch_id, error = %e, "Upload batch aborted");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadAccepted {
            poll_url: format!("/upload/status/{}", batch_id),
            batch_id,
            total_files,
            status: "PROCESSING".to_string(),
        }),
    ))
}

pub async fn upload_status(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<UploadStatusResponse>> {
    let log = state
        .repo
        .find_upload_log(&batch_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("upload batch", batch_id))?;
    Ok(Json(log.into()))
}

/// Delete every result last written by an upload batch
pub async fn delete_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<DeleteBatchResponse>> {
    let batch_id = batch_id.to_string();
    let report = state.repo.delete_upload_batch(&batch_id).await?;

    tracing::info!(
        batch_id = %batch_id,
        results_deleted = report.results_deleted,
        "Upload batch deleted"
    );

    Ok(Json(DeleteBatchResponse {
        message: format!("Deleted batch {}", batch_id),
        report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(usn: &str) -> ExtractedStudentResult {
        serde_json::from_value(serde_json::json!({
            "usn": usn,
            "student_name": "Asha",
            "semester": 5
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_upload_rejected() {
        let request = UploadRequest {
            batch: None,
            documents: Vec::new(),
        };
        let err: AppError = request.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_source_label() {
        assert_eq!(source_label(0, &document(" 1SV22AD005 ")), "document 1 (1SV22AD005)");
    }
}
