//! Upload log entity tracking bulk ingestion progress

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Upload batch status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<&str> for UploadStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PROCESSING" => UploadStatus::Processing,
            "COMPLETED" => UploadStatus::Completed,
            "FAILED" => UploadStatus::Failed,
            _ => UploadStatus::Pending,
        }
    }
}

impl From<UploadStatus> for String {
    fn from(status: UploadStatus) -> Self {
        match status {
            UploadStatus::Pending => "PENDING",
            UploadStatus::Processing => "PROCESSING",
            UploadStatus::Completed => "COMPLETED",
            UploadStatus::Failed => "FAILED",
        }
        .to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub batch_id: String,

    pub total_files: i32,

    pub processed_files: i32,

    pub failed_files: i32,

    pub current_file: Option<String>,

    pub current_file_index: i32,

    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_log: Option<String>,

    pub upload_timestamp: DateTimeWithTimeZone,

    pub completed_timestamp: Option<DateTimeWithTimeZone>,
}

impl Model {
    pub fn upload_status(&self) -> UploadStatus {
        UploadStatus::from(self.status.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.upload_status(), UploadStatus::Completed | UploadStatus::Failed)
    }

    /// Share of files handled so far, successful or not
    pub fn progress_percent(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            let done = (self.processed_files + self.failed_files) as f64;
            (done / self.total_files as f64 * 100.0).min(100.0)
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.error_log
            .as_deref()
            .map(|log| log.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
