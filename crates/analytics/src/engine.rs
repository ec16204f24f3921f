//! Aggregation engine
//!
//! Every entry point validates its scope, fetches the matching rows in one
//! query and hands them to the pure aggregation functions.

use crate::export::{ExportTable, StudentView};
use crate::failures::{failure_analysis, FailureAnalysis};
use crate::gpa::{gpa_progression, semester_sgpa, SemesterGpa, StudentSgpa};
use crate::grading::GradingPolicy;
use crate::overview::{overall_statistics, semester_overview, OverallStatistics, SemesterOverview};
use crate::performers::{top_performers, RankBy, TopPerformer};
use crate::store::ResultSource;
use crate::subjects::{subject_statistics, SubjectStatistics};
use crate::summary::{semester_summaries, SemesterSummary};
use automarks_common::db::ResultRow;
use automarks_common::errors::{AppError, Result};
use automarks_common::metrics::{record_analytics, record_inconsistencies};
use automarks_common::scope::{validate_semester, ResultScope};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::time::Instant;
use tracing::{debug, instrument, warn};

pub const PERFORMER_LIMIT_RANGE: RangeInclusive<usize> = 1..=100;

/// Rows fetched for one operation, with the time the fetch started
struct Loaded {
    rows: Vec<ResultRow>,
    started: Instant,
}

impl Loaded {
    fn finish<T>(self, operation: &'static str, value: T) -> T {
        record_analytics(operation, self.started.elapsed().as_secs_f64(), self.rows.len());
        debug!(operation, rows = self.rows.len(), "Aggregation complete");
        value
    }
}

#[derive(Clone)]
pub struct Analyzer<S> {
    source: S,
    policy: GradingPolicy,
}

impl<S: ResultSource> Analyzer<S> {
    pub fn new(source: S, policy: GradingPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    async fn load(&self, operation: &'static str, scope: &ResultScope) -> Result<Loaded> {
        let started = Instant::now();
        let rows = self.source.fetch_results(scope).await?;

        let inconsistent = rows.iter().filter(|r| !r.marks_consistent()).count();
        if inconsistent > 0 {
            warn!(
                operation,
                inconsistent,
                "Rows whose total differs from internal + external"
            );
            record_inconsistencies(inconsistent);
        }

        Ok(Loaded { rows, started })
    }

    /// Rows for SGPA grading. An exam term filter picks the students who sat
    /// that term; each of them keeps every attempt in the remaining scope, so a
    /// cleared subject stays capped and matches `student_gpa`.
    async fn load_graded(&self, operation: &'static str, scope: &ResultScope) -> Result<Loaded> {
        if !scope.has_term() {
            return self.load(operation, scope).await;
        }

        let mut loaded = self.load(operation, &scope.clone().without_term()).await?;
        let sat: HashSet<String> = loaded
            .rows
            .iter()
            .filter(|r| scope.matches(r))
            .map(|r| r.usn.clone())
            .collect();
        loaded.rows.retain(|r| sat.contains(&r.usn));
        Ok(loaded)
    }

    /// Normalised single-student scope; unknown USNs are `StudentNotFound`
    async fn student_scope(&self, usn: &str) -> Result<ResultScope> {
        let scope = ResultScope::for_student(usn).normalized()?;
        let usn = scope.usn.as_deref().unwrap_or_default();
        if !self.source.student_exists(usn).await? {
            return Err(AppError::StudentNotFound {
                usn: usn.to_string(),
            });
        }
        Ok(scope)
    }

    fn semester_scope(semester: i32, scope: ResultScope) -> Result<ResultScope> {
        validate_semester(semester)?;
        scope.with_semester(semester).normalized()
    }

    #[instrument(skip(self))]
    pub async fn semester_summary(&self, usn: &str) -> Result<Vec<SemesterSummary>> {
        let scope = self.student_scope(usn).await?;
        let loaded = self.load("semester_summary", &scope).await?;
        let usn = scope.usn.as_deref().unwrap_or_default();
        let summaries = semester_summaries(usn, &loaded.rows);
        Ok(loaded.finish("semester_summary", summaries))
    }

    #[instrument(skip(self))]
    pub async fn subject_stats(&self, semester: i32, scope: ResultScope) -> Result<Vec<SubjectStatistics>> {
        let scope = Self::semester_scope(semester, scope)?;
        let loaded = self.load("subject_stats", &scope).await?;
        let stats = subject_statistics(&loaded.rows);
        Ok(loaded.finish("subject_stats", stats))
    }

    #[instrument(skip(self))]
    pub async fn failure_analysis(&self, semester: i32, scope: ResultScope) -> Result<FailureAnalysis> {
        let scope = Self::semester_scope(semester, scope)?;
        let loaded = self.load("failure_analysis", &scope).await?;
        let analysis = failure_analysis(&loaded.rows);
        Ok(loaded.finish("failure_analysis", analysis))
    }

    #[instrument(skip(self))]
    pub async fn top_performers(
        &self,
        semester: i32,
        subject_code: Option<String>,
        limit: usize,
        rank_by: RankBy,
        scope: ResultScope,
    ) -> Result<Vec<TopPerformer>> {
        if !PERFORMER_LIMIT_RANGE.contains(&limit) {
            return Err(AppError::invalid_scope(format!(
                "limit {} outside {}..={}",
                limit,
                PERFORMER_LIMIT_RANGE.start(),
                PERFORMER_LIMIT_RANGE.end()
            )));
        }

        // The subject filter is applied by the ranking so the whole semester is loaded
        let scope = Self::semester_scope(semester, scope.with_subject(None))?;
        let subject = ResultScope::default()
            .with_subject(subject_code)
            .normalized()?
            .subject_code;

        let loaded = if subject.is_none() && rank_by == RankBy::Sgpa {
            self.load_graded("top_performers", &scope).await?
        } else {
            self.load("top_performers", &scope).await?
        };
        let ranked = top_performers(
            &self.policy,
            semester,
            subject.as_deref(),
            limit,
            rank_by,
            &loaded.rows,
        );
        Ok(loaded.finish("top_performers", ranked))
    }

    #[instrument(skip(self))]
    pub async fn semester_sgpa(&self, semester: i32, scope: ResultScope) -> Result<Vec<StudentSgpa>> {
        let scope = Self::semester_scope(semester, scope)?;
        let loaded = self.load_graded("semester_sgpa", &scope).await?;
        let sgpa = semester_sgpa(&self.policy, semester, &loaded.rows);
        Ok(loaded.finish("semester_sgpa", sgpa))
    }

    #[instrument(skip(self))]
    pub async fn student_gpa(&self, usn: &str) -> Result<Vec<SemesterGpa>> {
        let scope = self.student_scope(usn).await?;
        let loaded = self.load("student_gpa", &scope).await?;
        let refs: Vec<&ResultRow> = loaded.rows.iter().collect();
        let progression = gpa_progression(&self.policy, &refs);
        Ok(loaded.finish("student_gpa", progression))
    }

    #[instrument(skip(self))]
    pub async fn overall_statistics(&self, scope: ResultScope) -> Result<OverallStatistics> {
        let scope = scope.normalized()?;
        let loaded = self.load("overall_statistics", &scope).await?;
        let stats = overall_statistics(&self.policy, &loaded.rows);
        Ok(loaded.finish("overall_statistics", stats))
    }

    #[instrument(skip(self))]
    pub async fn semester_overview(&self, scope: ResultScope) -> Result<Vec<SemesterOverview>> {
        let scope = scope.normalized()?;
        let loaded = self.load("semester_overview", &scope).await?;
        let overview = semester_overview(&loaded.rows);
        Ok(loaded.finish("semester_overview", overview))
    }

    /// Reject scopes above `max_rows` before any row is loaded
    async fn check_export_size(&self, scope: &ResultScope, max_rows: usize) -> Result<()> {
        let rows = self.source.count_results(scope).await?;
        if rows > max_rows as u64 {
            return Err(AppError::Validation {
                message: format!(
                    "export of {} rows exceeds the limit of {}; narrow the semester, batch or branch",
                    rows, max_rows
                ),
                field: None,
            });
        }
        Ok(())
    }

    /// Flat export table in store order, at most `max_rows` rows
    #[instrument(skip(self))]
    pub async fn export_rows(&self, scope: ResultScope, max_rows: usize) -> Result<ExportTable> {
        let scope = scope.normalized()?;
        self.check_export_size(&scope, max_rows).await?;
        let loaded = self.load("export_rows", &scope).await?;
        let table = ExportTable::from_rows(&loaded.rows);
        Ok(loaded.finish("export_rows", table))
    }

    /// Everything a workbook needs from one fetch: the flat table, the student
    /// pivot and, when a semester is in scope, its subject statistics
    #[instrument(skip(self))]
    pub async fn export_workbook(
        &self,
        scope: ResultScope,
        max_rows: usize,
    ) -> Result<(ExportTable, StudentView, Option<Vec<SubjectStatistics>>)> {
        let scope = scope.normalized()?;
        self.check_export_size(&scope, max_rows).await?;
        let loaded = self.load("export_workbook", &scope).await?;

        let table = ExportTable::from_rows(&loaded.rows);
        let view = StudentView::from_rows(&self.policy, &loaded.rows);
        let stats = scope.semester.map(|_| subject_statistics(&loaded.rows));

        Ok(loaded.finish("export_workbook", (table, view, stats)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, in_term, pass, with_credits};
    use crate::store::MemoryStore;

    fn analyzer(rows: Vec<ResultRow>) -> Analyzer<MemoryStore> {
        Analyzer::new(MemoryStore::new(rows), GradingPolicy::default())
    }

    fn cohort() -> Vec<ResultRow> {
        let mut rows = Vec::new();
        for i in 0..10 {
            let usn = format!("1SV22AD{:03}", i);
            rows.push(pass(&usn, 5, "BCS501", 100 + i * 10));
            if i < 3 {
                rows.push(fail(&usn, 5, "BCS502", 40));
            } else {
                rows.push(pass(&usn, 5, "BCS502", 120));
            }
        }
        rows.push(with_credits(pass("1SV22AD005", 5, "BCS503", 90), Some(3)));
        rows
    }

    #[tokio::test]
    async fn test_failure_rate_for_cohort() {
        let analysis = analyzer(cohort())
            .failure_analysis(5, ResultScope::default())
            .await
            .unwrap();
        assert_eq!(analysis.total_failures, 3);
        assert_eq!(analysis.failure_rate, 30.0);
    }

    #[tokio::test]
    async fn test_sgpa_example() {
        let engine = analyzer(vec![
            pass("1SV22AD005", 5, "A", 160),
            with_credits(pass("1SV22AD005", 5, "B", 90), Some(3)),
        ]);

        let progression = engine.student_gpa("1sv22ad005").await.unwrap();
        assert_eq!(progression.len(), 1);
        assert_eq!(progression[0].sgpa, 7.29);
        assert_eq!(progression[0].cgpa, 7.29);
    }

    #[tokio::test]
    async fn test_unknown_student() {
        let result = analyzer(cohort()).semester_summary("1SV22AD999").await;
        assert!(matches!(result, Err(AppError::StudentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_invalid_scopes_rejected() {
        let engine = analyzer(cohort());

        let bad_semester = engine.subject_stats(9, ResultScope::default()).await;
        assert!(matches!(bad_semester, Err(AppError::InvalidScope { .. })));

        let bad_limit = engine
            .top_performers(5, None, 0, RankBy::Marks, ResultScope::default())
            .await;
        assert!(matches!(bad_limit, Err(AppError::InvalidScope { .. })));

        let bad_batch = engine
            .overall_statistics(ResultScope {
                batch: Some("2022-23".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(bad_batch, Err(AppError::InvalidScope { .. })));
    }

    #[tokio::test]
    async fn test_top_performers_with_subject() {
        let top = analyzer(cohort())
            .top_performers(5, Some("bcs501".into()), 3, RankBy::Marks, ResultScope::default())
            .await
            .unwrap();
        let usns: Vec<&str> = top.iter().map(|t| t.usn.as_str()).collect();
        assert_eq!(usns, vec!["1SV22AD009", "1SV22AD008", "1SV22AD007"]);
        assert_eq!(top[0].percentage, 100.0);
    }

    #[tokio::test]
    async fn test_empty_scope_exports_nothing() {
        let table = analyzer(Vec::new())
            .export_rows(ResultScope::for_semester(3), 100)
            .await
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers().len(), 10);
    }

    #[tokio::test]
    async fn test_workbook_statistics_only_with_semester() {
        let engine = analyzer(cohort());

        let (_, _, stats) = engine
            .export_workbook(ResultScope::default(), 100)
            .await
            .unwrap();
        assert!(stats.is_none());

        let (table, view, stats) = engine
            .export_workbook(ResultScope::for_semester(5), 100)
            .await
            .unwrap();
        assert_eq!(table.len(), 21);
        assert_eq!(view.records.len(), 10);
        assert_eq!(stats.map(|s| s.len()), Some(3));
    }

    #[tokio::test]
    async fn test_export_above_limit_rejected() {
        let engine = analyzer(cohort());

        let table = engine
            .export_rows(ResultScope::for_semester(5), 21)
            .await
            .unwrap();
        assert_eq!(table.len(), 21);

        let csv = engine.export_rows(ResultScope::for_semester(5), 20).await;
        assert!(matches!(csv, Err(AppError::Validation { .. })));

        let workbook = engine.export_workbook(ResultScope::default(), 20).await;
        assert!(matches!(workbook, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_subject_stats_bounds() {
        let stats = analyzer(cohort())
            .subject_stats(5, ResultScope::default())
            .await
            .unwrap();
        for stat in &stats {
            assert!((0.0..=100.0).contains(&stat.pass_percentage));
            assert!(stat.pass_count + stat.fail_count <= stat.total_students);
        }
        assert_eq!(stats[0].subject_code, "BCS501");
    }

    #[tokio::test]
    async fn test_term_filter_keeps_carryover_cap() {
        let engine = analyzer(vec![
            in_term(fail("1SV22AD005", 3, "BCS301", 60), "December", 2023),
            in_term(pass("1SV22AD005", 3, "BCS301", 190), "June", 2024),
            in_term(pass("1SV22AD006", 3, "BCS301", 150), "December", 2023),
        ]);
        let term = ResultScope {
            exam_year: Some(2024),
            ..Default::default()
        };

        let progression = engine.student_gpa("1SV22AD005").await.unwrap();
        assert_eq!(progression[0].sgpa, 2.0);

        let sgpa = engine.semester_sgpa(3, term.clone()).await.unwrap();
        assert_eq!(sgpa.len(), 1);
        assert_eq!(sgpa[0].usn, "1SV22AD005");
        assert_eq!(sgpa[0].sgpa, progression[0].sgpa);

        let top = engine
            .top_performers(3, None, 10, RankBy::Sgpa, term)
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].sgpa, Some(progression[0].sgpa));
    }
}
