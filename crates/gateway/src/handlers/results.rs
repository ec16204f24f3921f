//! Result listing handlers

use super::{page, MessageResponse};
use crate::AppState;
use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use automarks_common::errors::{AppError, Result};
use automarks_common::ResultScope;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    pub usn: Option<String>,
    pub semester: Option<i32>,
    pub batch: Option<String>,
    pub branch: Option<String>,
    pub status: Option<String>,
    pub exam_year: Option<i32>,
    pub exam_month: Option<String>,
    pub subject_code: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl ResultsQuery {
    fn scope(&self) -> ResultScope {
        ResultScope {
            semester: self.semester,
            batch: self.batch.clone(),
            branch: self.branch.clone(),
            subject_code: self.subject_code.clone(),
            exam_year: self.exam_year,
            exam_month: self.exam_month.clone(),
            usn: self.usn.clone(),
        }
    }

    /// Blank status means no status filter
    fn status(&self) -> Option<ResultStatus> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ResultStatus::parse)
    }
}

#[derive(Serialize)]
pub struct ResultResponse {
    pub id: i32,
    pub usn: String,
    pub student_name: String,
    pub subject_code: String,
    pub subject_name: String,
    pub semester: i32,
    pub internal_marks: Option<i32>,
    pub external_marks: Option<i32>,
    pub total_marks: Option<i32>,
    pub result_status: Option<&'static str>,
    pub announced_date: Option<NaiveDate>,
}

impl From<ResultRow> for ResultResponse {
    fn from(row: ResultRow) -> Self {
        Self {
            id: row.result_id,
            result_status: row.status.code(),
            usn: row.usn,
            student_name: row.student_name,
            subject_code: row.subject_code,
            subject_name: row.subject_name,
            semester: row.semester,
            internal_marks: row.internal_marks,
            external_marks: row.external_marks,
            total_marks: row.total_marks,
            announced_date: row.announced_date,
        }
    }
}

/// Filtered, paged result rows
pub async fn list_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<Vec<ResultResponse>>> {
    let (skip, limit) = page(query.skip, query.limit, DEFAULT_LIMIT, MAX_LIMIT)?;
    let scope = query.scope().normalized()?;

    let rows = state
        .repo
        .list_results(&scope, query.status(), skip, limit)
        .await?;
    Ok(Json(rows.into_iter().map(ResultResponse::from).collect()))
}

pub async fn delete_result(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>> {
    if !state.repo.delete_result(id).await? {
        return Err(AppError::not_found("result", id));
    }

    tracing::info!(result_id = id, "Result deleted");
    Ok(Json(MessageResponse::new("Result deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_parsing() {
        let query = ResultsQuery {
            status: Some("pass".into()),
            ..Default::default()
        };
        assert_eq!(query.status(), Some(ResultStatus::Pass));

        let blank = ResultsQuery {
            status: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(blank.status(), None);
    }

    #[test]
    fn test_scope_carries_every_filter() {
        let query = ResultsQuery {
            usn: Some("1sv22ad005".into()),
            semester: Some(5),
            subject_code: Some("bcs501".into()),
            ..Default::default()
        };
        let scope = query.scope().normalized().unwrap();
        assert_eq!(scope.usn.as_deref(), Some("1SV22AD005"));
        assert_eq!(scope.subject_code.as_deref(), Some("BCS501"));
        assert_eq!(scope.semester, Some(5));
    }
}
