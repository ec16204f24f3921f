//! Batch ingestion of extracted result documents
//!
//! A batch run owns one upload log row. Each document is normalised and saved
//! in its own transaction; per-document failures are recorded on the log and do
//! not stop the batch unless `fail_fast` is set.

mod document;

pub use document::{
    branch_from_usn, normalize_subject_code, normalize_subject_name, ExtractedStudentResult,
    ExtractedSubjectResult, StudentDocument, SubjectEntry,
};

use crate::db::models::{NotificationLevel, UploadStatus};
use crate::db::{Repository, UploadProgress};
use crate::errors::Result;
use crate::metrics::record_ingestion;
use crate::scope::normalize_batch;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A document together with the file or request it came from
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub document: ExtractedStudentResult,
}

/// Final state of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub status: UploadStatus,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub subjects_saved: usize,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct BatchIngestor {
    repo: Repository,
    batch: Option<String>,
    fail_fast: bool,
}

impl BatchIngestor {
    /// `batch` is the cohort assigned to newly seen students
    pub fn new(repo: Repository, batch: Option<&str>) -> Result<Self> {
        Ok(Self {
            repo,
            batch: normalize_batch(batch)?,
            fail_fast: false,
        })
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Create the upload log and return its batch id
    pub async fn start(&self, total_files: usize) -> Result<String> {
        let batch_id = Uuid::new_v4().to_string();
        self.repo
            .create_upload_log(&batch_id, total_files as i32)
            .await?;

        info!(batch_id = %batch_id, total_files, "Upload batch created");
        Ok(batch_id)
    }

    /// Start a batch and process it to completion
    pub async fn ingest(&self, documents: Vec<SourceDocument>) -> Result<BatchOutcome> {
        let batch_id = self.start(documents.len()).await?;
        self.run(&batch_id, documents).await
    }

    /// Process documents under an existing upload log.
    ///
    /// Any store error after the log exists leaves it FAILED rather than
    /// PROCESSING.
    #[instrument(skip(self, documents), fields(total = documents.len()))]
    pub async fn run(&self, batch_id: &str, documents: Vec<SourceDocument>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome {
            batch_id: batch_id.to_string(),
            status: UploadStatus::Processing,
            total: documents.len(),
            processed: 0,
            failed: 0,
            subjects_saved: 0,
            errors: Vec::new(),
        };

        if let Err(e) = self.process(&mut outcome, documents).await {
            outcome.errors.push(format!("batch aborted: {}", e));
            if let Err(abort) = self.repo.abort_upload_log(batch_id, &outcome.errors).await {
                warn!(batch_id, error = %abort, "Failed to mark upload batch as failed");
            }
            return Err(e);
        }

        let level = match (outcome.processed, outcome.failed) {
            (_, 0) => NotificationLevel::Success,
            (0, _) => NotificationLevel::Error,
            _ => NotificationLevel::Warning,
        };
        let notified = self
            .repo
            .create_notification(
                &format!(
                    "Batch {} finished ({} ok, {} failed)",
                    batch_id, outcome.processed, outcome.failed
                ),
                Some(format!(
                    "Batch: {}; Total files: {}",
                    self.batch.as_deref().unwrap_or("unassigned"),
                    outcome.total
                )),
                level,
            )
            .await;
        if let Err(e) = notified {
            warn!(batch_id, error = %e, "Failed to record batch notification");
        }

        info!(
            batch_id,
            processed = outcome.processed,
            failed = outcome.failed,
            subjects = outcome.subjects_saved,
            "Upload batch finished"
        );

        Ok(outcome)
    }

    /// Save every document, then write the final progress and status
    async fn process(&self, outcome: &mut BatchOutcome, documents: Vec<SourceDocument>) -> Result<()> {
        let batch_id = outcome.batch_id.clone();

        for (index, source) in documents.into_iter().enumerate() {
            self.repo
                .update_upload_progress(
                    &batch_id,
                    &UploadProgress {
                        processed_files: outcome.processed as i32,
                        failed_files: outcome.failed as i32,
                        current_file: Some(source.source.clone()),
                        current_file_index: index as i32 + 1,
                    },
                )
                .await?;

            let started = Instant::now();
            match self.save_one(&batch_id, source.document).await {
                Ok(subjects) => {
                    record_ingestion(started.elapsed().as_secs_f64(), subjects, true);
                    debug!(source = %source.source, subjects, "Document saved");
                    outcome.processed += 1;
                    outcome.subjects_saved += subjects;
                }
                Err(e) => {
                    record_ingestion(started.elapsed().as_secs_f64(), 0, false);
                    warn!(source = %source.source, error = %e, "Document failed");
                    outcome.failed += 1;
                    outcome.errors.push(format!("{}: {}", source.source, e));

                    if self.fail_fast {
                        break;
                    }
                }
            }
        }

        self.repo
            .update_upload_progress(
                &batch_id,
                &UploadProgress {
                    processed_files: outcome.processed as i32,
                    failed_files: outcome.failed as i32,
                    current_file: None,
                    current_file_index: (outcome.processed + outcome.failed) as i32,
                },
            )
            .await?;

        outcome.status = if outcome.total > 0 && outcome.processed == 0 {
            UploadStatus::Failed
        } else {
            UploadStatus::Completed
        };
        self.repo
            .finish_upload_log(&batch_id, outcome.status, &outcome.errors)
            .await?;
        Ok(())
    }

    async fn save_one(&self, batch_id: &str, document: ExtractedStudentResult) -> Result<usize> {
        let document = StudentDocument::from_extracted(document)?;
        if document.skipped_subjects > 0 {
            warn!(
                usn = %document.usn,
                skipped = document.skipped_subjects,
                "Skipped subjects without a usable code"
            );
        }

        let summary = self
            .repo
            .save_extracted(&document, self.batch.as_deref(), Some(batch_id))
            .await?;
        Ok(summary.subjects_processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbPool;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    fn document() -> SourceDocument {
        let document = serde_json::from_value(serde_json::json!({
            "usn": "1SV22AD005",
            "student_name": "Asha",
            "semester": 5,
            "subjects": []
        }))
        .unwrap();
        SourceDocument {
            source: "asha.json".to_string(),
            document,
        }
    }

    #[test]
    fn test_store_error_mid_batch_marks_log_failed() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_errors([DbErr::Custom("connection reset".to_string())])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let repo = Repository::new(DbPool::from_connection(conn.clone()));
        let ingestor = BatchIngestor::new(repo, None).unwrap();

        let result = tokio_test::block_on(ingestor.run("batch-1", vec![document()]));
        assert!(result.is_err());

        let log = conn.into_transaction_log();
        assert_eq!(log.len(), 2);
        let abort = format!("{:?}", log[1]);
        assert!(abort.contains("FAILED"));
        assert!(abort.contains("batch aborted"));
    }
}
