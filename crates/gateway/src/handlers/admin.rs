//! Administrative purge handlers
//!
//! Every purge needs an explicit confirmation word and leaves a notification
//! behind.

use super::require_confirmation;
use crate::AppState;
use automarks_common::db::models::NotificationLevel;
use automarks_common::db::{PurgeReport, PurgeTarget, Repository};
use automarks_common::errors::{AppError, Result};
use automarks_common::scope::{normalize_batch, validate_semester, EXAM_YEAR_RANGE};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

const DELETE_CONFIRMATION: &str = "DELETE";
const DELETE_ALL_CONFIRMATION: &str = "DELETE_ALL";

fn default_cleanup() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CandidatePurgeQuery {
    pub confirm: Option<String>,
    pub batch: Option<String>,
    #[serde(default = "default_cleanup")]
    pub cleanup_orphans: bool,
}

#[derive(Debug, Deserialize)]
pub struct SemesterPurgeQuery {
    pub confirm: Option<String>,
    pub batch: Option<String>,
    pub exam_month: Option<String>,
    pub exam_year: Option<i32>,
    #[serde(default = "default_cleanup")]
    pub cleanup_orphans: bool,
}

#[derive(Debug, Deserialize)]
pub struct PurgeAllQuery {
    pub confirm: Option<String>,
    pub batch: Option<String>,
}

#[derive(Serialize)]
pub struct PurgeResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_year: Option<i32>,
    #[serde(flatten)]
    pub report: PurgeReport,
}

impl PurgeResponse {
    fn new(message: impl Into<String>, report: PurgeReport) -> Self {
        Self {
            message: message.into(),
            usn: None,
            semester_number: None,
            exam_month: None,
            exam_year: None,
            report,
        }
    }
}

/// A failed notification never fails the purge that already committed
async fn notify(repo: &Repository, title: String, detail: String, level: NotificationLevel) {
    if let Err(e) = repo.create_notification(&title, Some(detail), level).await {
        tracing::warn!(error = %e, title = %title, "Failed to record purge notification");
    }
}

fn purge_all_title(batch: Option<&str>) -> String {
    match batch {
        Some(batch) => format!("Admin purge: Batch {} deleted", batch),
        None => "Admin purge: ALL records deleted".to_string(),
    }
}

fn purge_all_detail(report: &PurgeReport) -> String {
    format!(
        "Results: {}, Students: {}, Subjects: {}, Semesters: {}",
        report.results_deleted,
        report.orphans.students_deleted,
        report.orphans.subjects_deleted,
        report.orphans.semesters_deleted
    )
}

/// Delete a candidate and all of their results
pub async fn purge_candidate(
    State(state): State<AppState>,
    Path(usn): Path<String>,
    Query(query): Query<CandidatePurgeQuery>,
) -> Result<Json<PurgeResponse>> {
    require_confirmation(query.confirm.as_deref(), DELETE_CONFIRMATION)?;

    let usn = usn.trim().to_ascii_uppercase();
    if usn.is_empty() {
        return Err(AppError::invalid_scope("usn must not be empty"));
    }
    let target = PurgeTarget::Candidate {
        usn: usn.clone(),
        batch: normalize_batch(query.batch.as_deref())?,
    };

    let report = state.repo.purge(&target, query.cleanup_orphans).await?;
    notify(
        &state.repo,
        format!("Admin purge: candidate {}", usn),
        format!("Results deleted: {}", report.results_deleted),
        NotificationLevel::Warning,
    )
    .await;

    Ok(Json(PurgeResponse {
        usn: Some(usn),
        ..PurgeResponse::new("Candidate records deleted", report)
    }))
}

/// Delete a semester's results, optionally narrowed to a batch and exam term
pub async fn purge_semester(
    State(state): State<AppState>,
    Path(semester): Path<i32>,
    Query(query): Query<SemesterPurgeQuery>,
) -> Result<Json<PurgeResponse>> {
    require_confirmation(query.confirm.as_deref(), DELETE_CONFIRMATION)?;
    validate_semester(semester)?;

    if let Some(year) = query.exam_year {
        if !EXAM_YEAR_RANGE.contains(&year) {
            return Err(AppError::invalid_scope(format!(
                "exam_year {} outside {}..={}",
                year,
                EXAM_YEAR_RANGE.start(),
                EXAM_YEAR_RANGE.end()
            )));
        }
    }

    let exam_month = query
        .exam_month
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let target = PurgeTarget::Semester {
        number: semester,
        batch: normalize_batch(query.batch.as_deref())?,
        exam_month: exam_month.clone(),
        exam_year: query.exam_year,
    };

    let report = state.repo.purge(&target, query.cleanup_orphans).await?;
    notify(
        &state.repo,
        format!("Admin purge: semester {}", semester),
        format!("Results deleted: {}", report.results_deleted),
        NotificationLevel::Warning,
    )
    .await;

    Ok(Json(PurgeResponse {
        semester_number: Some(semester),
        exam_month,
        exam_year: query.exam_year,
        ..PurgeResponse::new("Semester records deleted", report)
    }))
}

/// Delete every record, or every record of one batch
pub async fn purge_all(
    State(state): State<AppState>,
    Query(query): Query<PurgeAllQuery>,
) -> Result<Json<PurgeResponse>> {
    require_confirmation(query.confirm.as_deref(), DELETE_ALL_CONFIRMATION)?;

    let batch = normalize_batch(query.batch.as_deref())?;
    let target = PurgeTarget::All {
        batch: batch.clone(),
    };

    let report = state.repo.purge(&target, true).await?;
    notify(
        &state.repo,
        purge_all_title(batch.as_deref()),
        purge_all_detail(&report),
        NotificationLevel::Error,
    )
    .await;

    let message = format!("Records deleted (Batch: {})", batch.as_deref().unwrap_or("All"));
    Ok(Json(PurgeResponse::new(message, report)))
}
