//! Analytics handlers
//!
//! Thin adapters over [`Analyzer`](automarks_analytics::Analyzer): path and
//! query parameters become a scope, the engine validates it.

use super::ScopeQuery;
use crate::AppState;
use automarks_analytics::{
    FailureAnalysis, OverallStatistics, RankBy, SemesterGpa, SemesterOverview, SemesterSummary,
    StudentSgpa, SubjectStatistics, TopPerformer,
};
use automarks_common::errors::Result;
use automarks_common::ResultScope;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

const DEFAULT_PERFORMER_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct TopPerformersQuery {
    pub subject_code: Option<String>,
    pub batch: Option<String>,
    pub branch: Option<String>,
    pub exam_year: Option<i32>,
    pub exam_month: Option<String>,
    pub rank_by: Option<String>,
    pub limit: Option<usize>,
}

impl TopPerformersQuery {
    fn scope(&self) -> ResultScope {
        ScopeQuery {
            batch: self.batch.clone(),
            branch: self.branch.clone(),
            exam_year: self.exam_year,
            exam_month: self.exam_month.clone(),
        }
        .into()
    }

    fn rank_by(&self) -> Result<RankBy> {
        self.rank_by.as_deref().unwrap_or_default().parse()
    }
}

#[derive(Serialize)]
pub struct StudentGpaResponse {
    pub usn: String,
    pub gpa: Vec<SemesterGpa>,
}

pub async fn subject_stats(
    State(state): State<AppState>,
    Path(semester): Path<i32>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<Vec<SubjectStatistics>>> {
    let stats = state.analyzer.subject_stats(semester, query.into()).await?;
    Ok(Json(stats))
}

pub async fn student_summary(
    State(state): State<AppState>,
    Path(usn): Path<String>,
) -> Result<Json<Vec<SemesterSummary>>> {
    let summary = state.analyzer.semester_summary(&usn).await?;
    Ok(Json(summary))
}

/// SGPA per semester with the running CGPA
pub async fn student_gpa(
    State(state): State<AppState>,
    Path(usn): Path<String>,
) -> Result<Json<StudentGpaResponse>> {
    let gpa = state.analyzer.student_gpa(&usn).await?;
    Ok(Json(StudentGpaResponse {
        usn: usn.trim().to_ascii_uppercase(),
        gpa,
    }))
}

/// Every student's SGPA for one semester
pub async fn semester_sgpa(
    State(state): State<AppState>,
    Path(semester): Path<i32>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<Vec<StudentSgpa>>> {
    let sgpa = state.analyzer.semester_sgpa(semester, query.into()).await?;
    Ok(Json(sgpa))
}

pub async fn top_performers(
    State(state): State<AppState>,
    Path(semester): Path<i32>,
    Query(query): Query<TopPerformersQuery>,
) -> Result<Json<Vec<TopPerformer>>> {
    let rank_by = query.rank_by()?;
    let limit = query.limit.unwrap_or(DEFAULT_PERFORMER_LIMIT);

    let ranked = state
        .analyzer
        .top_performers(semester, query.subject_code.clone(), limit, rank_by, query.scope())
        .await?;
    Ok(Json(ranked))
}

pub async fn failure_analysis(
    State(state): State<AppState>,
    Path(semester): Path<i32>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<FailureAnalysis>> {
    let analysis = state.analyzer.failure_analysis(semester, query.into()).await?;
    Ok(Json(analysis))
}

/// Dashboard aggregates per semester
pub async fn semester_overview(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<Vec<SemesterOverview>>> {
    let overview = state.analyzer.semester_overview(query.into()).await?;
    Ok(Json(overview))
}

pub async fn overall_statistics(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<OverallStatistics>> {
    let stats = state.analyzer.overall_statistics(query.into()).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use automarks_common::errors::AppError;

    #[test]
    fn test_rank_by_defaults_to_marks() {
        let query = TopPerformersQuery::default();
        assert_eq!(query.rank_by().unwrap(), RankBy::Marks);

        let sgpa = TopPerformersQuery {
            rank_by: Some("SGPA".into()),
            ..Default::default()
        };
        assert_eq!(sgpa.rank_by().unwrap(), RankBy::Sgpa);
    }

    #[test]
    fn test_unknown_rank_by_rejected() {
        let query = TopPerformersQuery {
            rank_by: Some("attendance".into()),
            ..Default::default()
        };
        assert!(matches!(query.rank_by(), Err(AppError::InvalidScope { .. })));
    }

    #[test]
    fn test_performer_scope_leaves_subject_to_the_ranking() {
        let query = TopPerformersQuery {
            subject_code: Some("BCS501".into()),
            branch: Some("ad".into()),
            ..Default::default()
        };
        let scope = query.scope();
        assert!(scope.subject_code.is_none());
        assert_eq!(scope.branch.as_deref(), Some("ad"));
    }
}
