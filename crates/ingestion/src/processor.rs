//! Ingestion processor
//!
//! Loads extracted result documents from a directory of `*.json` files, runs
//! them through a [`BatchIngestor`] and writes a run summary next to the
//! exports.

use crate::errors::IngestionError;
use automarks_common::db::models::UploadStatus;
use automarks_common::ingest::{BatchIngestor, BatchOutcome, ExtractedStudentResult, SourceDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// A file holds one document or an array of documents
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentFile {
    Many(Vec<ExtractedStudentResult>),
    One(Box<ExtractedStudentResult>),
}

/// Documents read from the input directory, plus files that could not be used
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<SourceDocument>,
    pub rejected_files: Vec<String>,
}

/// Summary written to `{output_dir}/ingestion_{batch_id}.json`
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub input_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rejected_files: Vec<String>,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

/// Parse one file's content into labelled documents
pub fn parse_documents(path: &Path, content: &str) -> Result<Vec<SourceDocument>, IngestionError> {
    let file: DocumentFile = serde_json::from_str(content).map_err(|source| IngestionError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let documents = match file {
        DocumentFile::One(document) => vec![SourceDocument {
            source: name,
            document: *document,
        }],
        DocumentFile::Many(documents) => documents
            .into_iter()
            .enumerate()
            .map(|(index, document)| SourceDocument {
                source: format!("{}#{}", name, index + 1),
                document,
            })
            .collect(),
    };
    Ok(documents)
}

/// Read every `*.json` file in `dir`, in file name order
pub async fn load_documents(dir: &Path) -> Result<LoadedDocuments, IngestionError> {
    let input_error = |source| IngestionError::InputDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(input_error)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(input_error)? {
        let path = entry.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut loaded = LoadedDocuments::default();
    for path in paths {
        let content = tokio::fs::read_to_string(&path).await?;
        match parse_documents(&path, &content) {
            Ok(documents) => loaded.documents.extend(documents),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable result file");
                loaded.rejected_files.push(e.to_string());
            }
        }
    }

    Ok(loaded)
}

pub struct IngestionProcessor {
    ingestor: BatchIngestor,
    output_dir: PathBuf,
}

impl IngestionProcessor {
    pub fn new(ingestor: BatchIngestor, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ingestor,
            output_dir: output_dir.into(),
        }
    }

    /// Ingest a directory and write its summary
    #[instrument(skip(self), fields(input_dir = %input_dir.display()))]
    pub async fn run(&self, input_dir: &Path) -> Result<RunSummary, IngestionError> {
        let started_at = Utc::now();
        let loaded = load_documents(input_dir).await?;
        if loaded.documents.is_empty() {
            return Err(IngestionError::NoDocuments(input_dir.to_path_buf()));
        }

        info!(
            documents = loaded.documents.len(),
            rejected_files = loaded.rejected_files.len(),
            "Documents loaded"
        );

        let outcome = self.ingestor.ingest(loaded.documents).await?;
        let summary = RunSummary {
            input_dir: input_dir.to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            rejected_files: loaded.rejected_files,
            outcome,
        };

        let path = self.write_summary(&summary).await?;
        info!(path = %path.display(), "Run summary written");

        if summary.outcome.status == UploadStatus::Failed {
            return Err(IngestionError::BatchFailed {
                batch_id: summary.outcome.batch_id,
            });
        }
        Ok(summary)
    }

    async fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf, IngestionError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("ingestion_{}.json", summary.outcome.batch_id));
        let body = serde_json::to_vec_pretty(summary)?;
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;
    use uuid::Uuid;

    const SINGLE: &str = r#"{
        "usn": "1SV22AD005",
        "student_name": "Asha",
        "semester": 5,
        "exam_month": "December",
        "exam_year": 2024,
        "subjects": [
            {"subject_code": "BCS501", "subject_name": "Software Engineering",
             "internal_marks": 40, "external_marks": 120, "total_marks": 160, "result_status": "P"}
        ]
    }"#;

    #[test]
    fn test_parse_single_document() {
        let docs = parse_documents(Path::new("/tmp/sem5/asha.json"), SINGLE).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "asha.json");
        assert_eq!(docs[0].document.usn, "1SV22AD005");
    }

    #[test]
    fn test_parse_document_array() {
        let content = format!("[{}, {}]", SINGLE, SINGLE);
        let docs = parse_documents(Path::new("batch.json"), &content).unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["batch.json#1", "batch.json#2"]);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = assert_err!(parse_documents(Path::new("broken.json"), "{\"usn\": "));
        assert!(matches!(err, IngestionError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn test_load_documents_skips_bad_files() {
        let dir = std::env::temp_dir().join(format!("automarks-ingest-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("a.json"), SINGLE).await.unwrap();
        tokio::fs::write(dir.join("b.json"), "not json").await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), "ignored").await.unwrap();

        let loaded = load_documents(&dir).await.unwrap();
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.rejected_files.len(), 1);
        assert!(loaded.rejected_files[0].contains("b.json"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_input_dir() {
        let dir = std::env::temp_dir().join(format!("automarks-missing-{}", Uuid::new_v4()));
        let err = assert_err!(load_documents(&dir).await);
        assert!(matches!(err, IngestionError::InputDir { .. }));
    }
}
