//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::ingest::StudentDocument;
use crate::scope::ResultScope;
use chrono::{NaiveDate, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QueryResult, QuerySelect, Set, Statement,
    TransactionTrait, Value,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One result joined with its student, semester and subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub result_id: i32,
    pub usn: String,
    pub student_name: String,
    pub batch: Option<String>,
    pub branch: Option<String>,
    pub semester: i32,
    pub exam_month: Option<String>,
    pub exam_year: Option<i32>,
    pub subject_code: String,
    pub subject_name: String,
    pub credits: Option<i32>,
    pub internal_marks: Option<i32>,
    pub external_marks: Option<i32>,
    pub total_marks: Option<i32>,
    pub status: ResultStatus,
    pub announced_date: Option<NaiveDate>,
}

impl ResultRow {
    /// False when internal and external are both known and do not add up to the total
    pub fn marks_consistent(&self) -> bool {
        match (self.internal_marks, self.external_marks, self.total_marks) {
            (Some(internal), Some(external), Some(total)) => internal + external == total,
            _ => true,
        }
    }

    fn from_query_result(row: &QueryResult) -> std::result::Result<Self, sea_orm::DbErr> {
        let status: Option<String> = row.try_get("", "result_status")?;
        Ok(Self {
            result_id: row.try_get("", "result_id")?,
            usn: row.try_get("", "usn")?,
            student_name: row.try_get("", "student_name")?,
            batch: row.try_get("", "batch")?,
            branch: row.try_get("", "branch")?,
            semester: row.try_get("", "semester_number")?,
            exam_month: row.try_get("", "exam_month")?,
            exam_year: row.try_get("", "exam_year")?,
            subject_code: row.try_get("", "subject_code")?,
            subject_name: row.try_get("", "subject_name")?,
            credits: row.try_get("", "credits")?,
            internal_marks: row.try_get("", "internal_marks")?,
            external_marks: row.try_get("", "external_marks")?,
            total_marks: row.try_get("", "total_marks")?,
            status: ResultStatus::from_column(status.as_deref()),
            announced_date: row.try_get("", "announced_date")?,
        })
    }
}

/// Outcome of persisting one extracted document
#[derive(Debug, Clone, Serialize)]
pub struct SaveSummary {
    pub student_id: i32,
    pub semester_id: i32,
    pub subjects_processed: usize,
}

/// Rows removed by orphan cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrphanCounts {
    pub students_deleted: u64,
    pub subjects_deleted: u64,
    pub semesters_deleted: u64,
}

/// What an admin purge removes
#[derive(Debug, Clone)]
pub enum PurgeTarget {
    /// One candidate, optionally only within a batch
    Candidate { usn: String, batch: Option<String> },
    /// Results of a semester number, optionally narrowed to a batch and exam term
    Semester {
        number: i32,
        batch: Option<String>,
        exam_month: Option<String>,
        exam_year: Option<i32>,
    },
    /// Every record, or every record of a batch
    All { batch: Option<String> },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PurgeReport {
    pub results_deleted: u64,
    pub upload_logs_deleted: u64,
    #[serde(flatten)]
    pub orphans: OrphanCounts,
}

/// Requested credit change for one subject
#[derive(Debug, Clone, Deserialize)]
pub struct CreditUpdate {
    pub code: String,
    pub credits: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreditUpdateReport {
    pub updated: usize,
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
}

/// Progress snapshot written while an upload batch runs
#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub processed_files: i32,
    pub failed_files: i32,
    pub current_file: Option<String>,
    pub current_file_index: i32,
}

const MAX_SUBJECT_CREDITS: i32 = 50;

const RESULT_SELECT: &str = r#"
    SELECT
        r.id AS result_id,
        st.usn,
        st.student_name,
        st.batch,
        st.branch,
        se.semester_number,
        se.exam_month,
        se.exam_year,
        su.subject_code,
        su.subject_name,
        su.credits,
        r.internal_marks,
        r.external_marks,
        r.total_marks,
        r.result_status,
        r.announced_date
"#;

const RESULT_FROM: &str = r#"
    FROM results r
    JOIN students st ON r.student_id = st.id
    JOIN semesters se ON r.semester_id = se.id
    JOIN subjects su ON r.subject_id = su.id
"#;

const RESULT_ORDER: &str =
    "ORDER BY st.usn ASC, se.semester_number ASC, se.exam_year ASC NULLS FIRST, su.subject_code ASC, r.id ASC";

// Inserts that race with concurrent batches resolve on the unique keys.
// A bare ON CONFLICT also covers the expression index on semester terms.

const STUDENT_INSERT: &str = r#"
    INSERT INTO students (usn, student_name, batch, branch, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (usn) DO NOTHING
"#;

const SEMESTER_INSERT: &str = r#"
    INSERT INTO semesters (semester_number, exam_month, exam_year, created_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT DO NOTHING
"#;

const SUBJECT_INSERT: &str = r#"
    INSERT INTO subjects (subject_code, subject_name, credits, created_at)
    VALUES ($1, $2, NULL, $3)
    ON CONFLICT (subject_code) DO NOTHING
"#;

const RESULT_UPSERT: &str = r#"
    INSERT INTO results (
        student_id, semester_id, subject_id, internal_marks, external_marks, total_marks,
        result_status, announced_date, upload_batch_id, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (student_id, semester_id, subject_id) DO UPDATE SET
        internal_marks = EXCLUDED.internal_marks,
        external_marks = EXCLUDED.external_marks,
        total_marks = EXCLUDED.total_marks,
        result_status = EXCLUDED.result_status,
        announced_date = COALESCE(EXCLUDED.announced_date, results.announced_date),
        upload_batch_id = COALESCE(EXCLUDED.upload_batch_id, results.upload_batch_id),
        updated_at = EXCLUDED.updated_at
"#;

/// Row expected after an insert-or-ignore
fn missing_row(resource: &str, key: impl std::fmt::Display) -> AppError {
    AppError::Internal {
        message: format!("{} {} missing after insert", resource, key),
    }
}

/// Incrementally built WHERE clause with positional parameters
#[derive(Default)]
struct SqlFilter {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl SqlFilter {
    fn push(&mut self, template: &str, value: impl Into<Value>) {
        self.values.push(value.into());
        self.clauses
            .push(template.replace("{}", &format!("${}", self.values.len())));
    }

    fn push_any(&mut self, column: &str, values: &[&str]) {
        if values.is_empty() {
            self.clauses.push(format!("{} IS NULL", column));
            return;
        }
        let mut placeholders = Vec::with_capacity(values.len());
        for value in values {
            self.values.push((*value).into());
            placeholders.push(format!("${}", self.values.len()));
        }
        self.clauses
            .push(format!("UPPER({}) IN ({})", column, placeholders.join(", ")));
    }

    fn from_scope(scope: &ResultScope) -> Self {
        let mut filter = Self::default();
        if let Some(semester) = scope.semester {
            filter.push("se.semester_number = {}", semester);
        }
        if let Some(ref usn) = scope.usn {
            filter.push("st.usn = {}", usn.clone());
        }
        if let Some(ref batch) = scope.batch {
            filter.push("st.batch = {}", batch.clone());
        }
        if let Some(ref branch) = scope.branch {
            filter.push("st.branch = {}", branch.clone());
        }
        if let Some(ref code) = scope.subject_code {
            filter.push("su.subject_code = {}", code.clone());
        }
        if let Some(year) = scope.exam_year {
            filter.push("se.exam_year = {}", year);
        }
        if let Some(ref month) = scope.exam_month {
            filter.push("LOWER(se.exam_month) = LOWER({})", month.clone());
        }
        filter
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Result queries
    // ========================================================================

    /// Every result row in scope, ordered by student, semester, subject
    pub async fn fetch_results(&self, scope: &ResultScope) -> Result<Vec<ResultRow>> {
        let filter = SqlFilter::from_scope(scope);
        let sql = format!(
            "{} {} {} {}",
            RESULT_SELECT,
            RESULT_FROM,
            filter.where_sql(),
            RESULT_ORDER
        );
        self.query_rows(sql, filter.values).await
    }

    /// Number of result rows in scope
    pub async fn count_results(&self, scope: &ResultScope) -> Result<u64> {
        let filter = SqlFilter::from_scope(scope);
        let sql = format!(
            "SELECT COUNT(*) AS row_count {} {}",
            RESULT_FROM,
            filter.where_sql()
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, filter.values);
        let count: i64 = match self.read_conn().query_one(stmt).await? {
            Some(row) => row.try_get("", "row_count")?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    /// Paged listing with an optional status filter
    pub async fn list_results(
        &self,
        scope: &ResultScope,
        status: Option<ResultStatus>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ResultRow>> {
        let mut filter = SqlFilter::from_scope(scope);
        if let Some(status) = status {
            filter.push_any("r.result_status", status.stored_variants());
        }
        filter.values.push((limit as i64).into());
        let limit_idx = filter.values.len();
        filter.values.push((offset as i64).into());
        let offset_idx = filter.values.len();

        let sql = format!(
            "{} {} {} {} LIMIT ${} OFFSET ${}",
            RESULT_SELECT,
            RESULT_FROM,
            filter.where_sql(),
            RESULT_ORDER,
            limit_idx,
            offset_idx
        );
        self.query_rows(sql, filter.values).await
    }

    async fn query_rows(&self, sql: String, values: Vec<Value>) -> Result<Vec<ResultRow>> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let rows = self.read_conn().query_all(stmt).await?;

        debug!(row_count = rows.len(), "Result rows fetched");

        rows.iter()
            .map(|row| ResultRow::from_query_result(row).map_err(AppError::from))
            .collect()
    }

    pub async fn delete_result(&self, id: i32) -> Result<bool> {
        let result = ResultEntity::delete_by_id(id).exec(self.write_conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Students
    // ========================================================================

    pub async fn find_student(&self, usn: &str) -> Result<Option<Student>> {
        StudentEntity::find()
            .filter(StudentColumn::Usn.eq(usn))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn student_exists(&self, usn: &str) -> Result<bool> {
        let count = StudentEntity::find()
            .filter(StudentColumn::Usn.eq(usn))
            .count(self.read_conn())
            .await?;
        Ok(count > 0)
    }

    pub async fn list_students(&self, offset: u64, limit: u64) -> Result<Vec<Student>> {
        StudentEntity::find()
            .order_by_asc(StudentColumn::Usn)
            .offset(offset)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete a student; results go with it
    pub async fn delete_student(&self, usn: &str) -> Result<bool> {
        let txn = self.write_conn().begin().await?;

        let Some(student) = StudentEntity::find()
            .filter(StudentColumn::Usn.eq(usn))
            .one(&txn)
            .await?
        else {
            return Ok(false);
        };

        ResultEntity::delete_many()
            .filter(ResultColumn::StudentId.eq(student.id))
            .exec(&txn)
            .await?;
        StudentEntity::delete_by_id(student.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(true)
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Persist one normalised document in a single transaction.
    ///
    /// Students, semesters and subjects are created on first sight. An existing
    /// student gets its name refreshed; batch and branch are only back-filled.
    pub async fn save_extracted(
        &self,
        doc: &StudentDocument,
        batch: Option<&str>,
        upload_batch_id: Option<&str>,
    ) -> Result<SaveSummary> {
        let txn = self.write_conn().begin().await?;
        let now = Utc::now();

        let student_inserted = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                STUDENT_INSERT,
                vec![
                    doc.usn.clone().into(),
                    doc.student_name.clone().into(),
                    batch.map(str::to_string).into(),
                    doc.branch.clone().into(),
                    now.into(),
                    now.into(),
                ],
            ))
            .await?
            .rows_affected()
            > 0;

        let student = StudentEntity::find()
            .filter(StudentColumn::Usn.eq(doc.usn.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| missing_row("student", &doc.usn))?;

        let student = if student_inserted {
            student
        } else {
            let refresh_name = student.student_name != doc.student_name;
            let fill_batch = student.batch.is_none() && batch.is_some();
            let fill_branch = student.branch.is_none() && doc.branch.is_some();

            if refresh_name || fill_batch || fill_branch {
                let mut active: StudentActiveModel = student.into();
                if refresh_name {
                    active.student_name = Set(doc.student_name.clone());
                }
                if fill_batch {
                    active.batch = Set(batch.map(str::to_string));
                }
                if fill_branch {
                    active.branch = Set(doc.branch.clone());
                }
                active.updated_at = Set(now.into());
                active.update(&txn).await?
            } else {
                student
            }
        };

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            SEMESTER_INSERT,
            vec![
                doc.semester.into(),
                doc.exam_month.clone().into(),
                doc.exam_year.into(),
                now.into(),
            ],
        ))
        .await?;

        let mut semester_query =
            SemesterEntity::find().filter(SemesterColumn::SemesterNumber.eq(doc.semester));
        semester_query = match doc.exam_month {
            Some(ref month) => semester_query.filter(SemesterColumn::ExamMonth.eq(month.as_str())),
            None => semester_query.filter(SemesterColumn::ExamMonth.is_null()),
        };
        semester_query = match doc.exam_year {
            Some(year) => semester_query.filter(SemesterColumn::ExamYear.eq(year)),
            None => semester_query.filter(SemesterColumn::ExamYear.is_null()),
        };
        let semester = semester_query
            .one(&txn)
            .await?
            .ok_or_else(|| missing_row("semester", doc.semester))?;

        for entry in &doc.subjects {
            txn.execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                SUBJECT_INSERT,
                vec![
                    entry.subject_code.clone().into(),
                    entry.subject_name.clone().into(),
                    now.into(),
                ],
            ))
            .await?;

            let subject = SubjectEntity::find()
                .filter(SubjectColumn::SubjectCode.eq(entry.subject_code.as_str()))
                .one(&txn)
                .await?
                .ok_or_else(|| missing_row("subject", &entry.subject_code))?;

            txn.execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                RESULT_UPSERT,
                vec![
                    student.id.into(),
                    semester.id.into(),
                    subject.id.into(),
                    entry.internal_marks.into(),
                    entry.external_marks.into(),
                    entry.total_marks.into(),
                    entry
                        .status
                        .and_then(|s| s.code())
                        .map(str::to_string)
                        .into(),
                    entry.announced_date.into(),
                    upload_batch_id.map(str::to_string).into(),
                    now.into(),
                    now.into(),
                ],
            ))
            .await?;
        }

        txn.commit().await?;

        Ok(SaveSummary {
            student_id: student.id,
            semester_id: semester.id,
            subjects_processed: doc.subjects.len(),
        })
    }

    // ========================================================================
    // Admin purge
    // ========================================================================

    pub async fn purge(&self, target: &PurgeTarget, cleanup_orphans: bool) -> Result<PurgeReport> {
        let txn = self.write_conn().begin().await?;
        let mut report = PurgeReport::default();

        match target {
            PurgeTarget::Candidate { usn, batch } => {
                let mut query = StudentEntity::find().filter(StudentColumn::Usn.eq(usn.as_str()));
                if let Some(batch) = batch {
                    query = query.filter(StudentColumn::Batch.eq(batch.as_str()));
                }
                let student = query.one(&txn).await?.ok_or_else(|| AppError::StudentNotFound {
                    usn: match batch {
                        Some(b) => format!("{} in batch {}", usn, b),
                        None => usn.clone(),
                    },
                })?;

                report.results_deleted = ResultEntity::delete_many()
                    .filter(ResultColumn::StudentId.eq(student.id))
                    .exec(&txn)
                    .await?
                    .rows_affected;
                StudentEntity::delete_by_id(student.id).exec(&txn).await?;
                report.orphans.students_deleted = 1;
            }
            PurgeTarget::Semester {
                number,
                batch,
                exam_month,
                exam_year,
            } => {
                let mut filter = SqlFilter::default();
                filter.push("se.semester_number = {}", *number);
                if let Some(month) = exam_month {
                    filter.push("se.exam_month = {}", month.clone());
                }
                if let Some(year) = exam_year {
                    filter.push("se.exam_year = {}", *year);
                }
                if let Some(batch) = batch {
                    filter.push("st.batch = {}", batch.clone());
                }
                let sql = format!(
                    "DELETE FROM results r USING semesters se, students st \
                     WHERE r.semester_id = se.id AND r.student_id = st.id AND {}",
                    filter.clauses.join(" AND ")
                );
                report.results_deleted = txn
                    .execute(Statement::from_sql_and_values(DbBackend::Postgres, &sql, filter.values))
                    .await?
                    .rows_affected();
            }
            PurgeTarget::All { batch: Some(batch) } => {
                let students = StudentEntity::find()
                    .select_only()
                    .column(StudentColumn::Id)
                    .filter(StudentColumn::Batch.eq(batch.as_str()))
                    .into_tuple::<i32>()
                    .all(&txn)
                    .await?;

                if !students.is_empty() {
                    report.results_deleted = ResultEntity::delete_many()
                        .filter(ResultColumn::StudentId.is_in(students.clone()))
                        .exec(&txn)
                        .await?
                        .rows_affected;
                    report.orphans.students_deleted = StudentEntity::delete_many()
                        .filter(StudentColumn::Id.is_in(students))
                        .exec(&txn)
                        .await?
                        .rows_affected;
                }
            }
            PurgeTarget::All { batch: None } => {
                report.results_deleted = ResultEntity::delete_many().exec(&txn).await?.rows_affected;
                report.upload_logs_deleted =
                    UploadLogEntity::delete_many().exec(&txn).await?.rows_affected;
                report.orphans.subjects_deleted =
                    SubjectEntity::delete_many().exec(&txn).await?.rows_affected;
                report.orphans.semesters_deleted =
                    SemesterEntity::delete_many().exec(&txn).await?.rows_affected;
                report.orphans.students_deleted =
                    StudentEntity::delete_many().exec(&txn).await?.rows_affected;
            }
        }

        // A batch-wide purge always cleans up, the full purge has nothing left
        let sweep = match target {
            PurgeTarget::All { batch: Some(_) } => true,
            PurgeTarget::All { batch: None } => false,
            _ => cleanup_orphans,
        };
        if sweep {
            let swept = delete_orphans(&txn).await?;
            report.orphans.students_deleted += swept.students_deleted;
            report.orphans.subjects_deleted += swept.subjects_deleted;
            report.orphans.semesters_deleted += swept.semesters_deleted;
        }

        txn.commit().await?;

        info!(
            purge = ?target,
            results_deleted = report.results_deleted,
            "Purge completed"
        );

        Ok(report)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub async fn list_branches(&self, batch: Option<&str>) -> Result<Vec<String>> {
        let mut query = StudentEntity::find()
            .select_only()
            .column(StudentColumn::Branch)
            .distinct()
            .filter(StudentColumn::Branch.is_not_null())
            .filter(StudentColumn::Branch.ne(""));
        if let Some(batch) = batch {
            query = query.filter(StudentColumn::Batch.eq(batch));
        }

        let branches = query
            .order_by_asc(StudentColumn::Branch)
            .into_tuple::<Option<String>>()
            .all(self.read_conn())
            .await?;

        Ok(branches.into_iter().flatten().collect())
    }

    /// Raw distinct batch values; callers normalise them
    pub async fn list_batches(&self) -> Result<Vec<String>> {
        let batches = StudentEntity::find()
            .select_only()
            .column(StudentColumn::Batch)
            .distinct()
            .filter(StudentColumn::Batch.is_not_null())
            .filter(StudentColumn::Batch.ne(""))
            .order_by_asc(StudentColumn::Batch)
            .into_tuple::<Option<String>>()
            .all(self.read_conn())
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
        SubjectEntity::find()
            .order_by_asc(SubjectColumn::SubjectCode)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Bulk credit update. `0` excludes a subject from GPA, `None` resets to the default.
    pub async fn update_subject_credits(&self, items: &[CreditUpdate]) -> Result<CreditUpdateReport> {
        let txn = self.write_conn().begin().await?;
        let mut report = CreditUpdateReport::default();

        for item in items {
            let code = item.code.trim();
            if code.is_empty() {
                continue;
            }
            if item
                .credits
                .is_some_and(|c| !(0..=MAX_SUBJECT_CREDITS).contains(&c))
            {
                report.invalid.push(code.to_string());
                continue;
            }

            let Some(subject) = SubjectEntity::find()
                .filter(SubjectColumn::SubjectCode.eq(code))
                .one(&txn)
                .await?
            else {
                report.missing.push(code.to_string());
                continue;
            };

            let mut active: SubjectActiveModel = subject.into();
            active.credits = Set(item.credits);
            active.update(&txn).await?;
            report.updated += 1;
        }

        txn.commit().await?;
        Ok(report)
    }

    // ========================================================================
    // Upload logs
    // ========================================================================

    pub async fn create_upload_log(&self, batch_id: &str, total_files: i32) -> Result<UploadLog> {
        UploadLogActiveModel {
            batch_id: Set(batch_id.to_string()),
            total_files: Set(total_files),
            processed_files: Set(0),
            failed_files: Set(0),
            current_file: Set(None),
            current_file_index: Set(0),
            status: Set(UploadStatus::Processing.into()),
            error_log: Set(None),
            upload_timestamp: Set(Utc::now().into()),
            completed_timestamp: Set(None),
            ..Default::default()
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    pub async fn find_upload_log(&self, batch_id: &str) -> Result<Option<UploadLog>> {
        UploadLogEntity::find()
            .filter(UploadLogColumn::BatchId.eq(batch_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_upload_progress(&self, batch_id: &str, progress: &UploadProgress) -> Result<()> {
        UploadLogEntity::update_many()
            .col_expr(UploadLogColumn::ProcessedFiles, Expr::value(progress.processed_files))
            .col_expr(UploadLogColumn::FailedFiles, Expr::value(progress.failed_files))
            .col_expr(UploadLogColumn::CurrentFile, Expr::value(progress.current_file.clone()))
            .col_expr(UploadLogColumn::CurrentFileIndex, Expr::value(progress.current_file_index))
            .filter(UploadLogColumn::BatchId.eq(batch_id))
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    pub async fn finish_upload_log(
        &self,
        batch_id: &str,
        status: UploadStatus,
        errors: &[String],
    ) -> Result<UploadLog> {
        let log = UploadLogEntity::find()
            .filter(UploadLogColumn::BatchId.eq(batch_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("upload batch", batch_id))?;

        let mut active: UploadLogActiveModel = log.into();
        active.status = Set(status.into());
        active.current_file = Set(None);
        active.error_log = Set(if errors.is_empty() {
            None
        } else {
            Some(errors.join("\n"))
        });
        active.completed_timestamp = Set(Some(Utc::now().into()));

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Mark a batch FAILED in a single statement, for runs that stopped early
    pub async fn abort_upload_log(&self, batch_id: &str, errors: &[String]) -> Result<()> {
        let completed: DateTimeWithTimeZone = Utc::now().into();
        UploadLogEntity::update_many()
            .col_expr(UploadLogColumn::Status, Expr::value(String::from(UploadStatus::Failed)))
            .col_expr(UploadLogColumn::CurrentFile, Expr::value(Option::<String>::None))
            .col_expr(UploadLogColumn::ErrorLog, Expr::value(errors.join("\n")))
            .col_expr(UploadLogColumn::CompletedTimestamp, Expr::value(completed))
            .filter(UploadLogColumn::BatchId.eq(batch_id))
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    /// Remove the results last written by an upload batch, then the log itself
    pub async fn delete_upload_batch(&self, batch_id: &str) -> Result<PurgeReport> {
        let txn = self.write_conn().begin().await?;

        let log = UploadLogEntity::find()
            .filter(UploadLogColumn::BatchId.eq(batch_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("upload batch", batch_id))?;

        let results_deleted = ResultEntity::delete_many()
            .filter(ResultColumn::UploadBatchId.eq(batch_id))
            .exec(&txn)
            .await?
            .rows_affected;
        UploadLogEntity::delete_by_id(log.id).exec(&txn).await?;
        let orphans = delete_orphans(&txn).await?;

        txn.commit().await?;

        Ok(PurgeReport {
            results_deleted,
            upload_logs_deleted: 1,
            orphans,
        })
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub async fn create_notification(
        &self,
        title: &str,
        detail: Option<String>,
        level: NotificationLevel,
    ) -> Result<Notification> {
        NotificationActiveModel {
            title: Set(title.to_string()),
            detail: Set(detail),
            level: Set(level.as_str().to_string()),
            cleared: Set(false),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Uncleared notifications, newest first
    pub async fn list_notifications(&self, limit: u64) -> Result<Vec<Notification>> {
        NotificationEntity::find()
            .filter(NotificationColumn::Cleared.eq(false))
            .order_by_desc(NotificationColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// `Ok(None)` when the notification does not exist, `Ok(Some(false))` when already cleared
    pub async fn clear_notification(&self, id: i32) -> Result<Option<bool>> {
        let Some(notification) = NotificationEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
        else {
            return Ok(None);
        };

        if notification.cleared {
            return Ok(Some(false));
        }

        let mut active: NotificationActiveModel = notification.into();
        active.cleared = Set(true);
        active.update(self.write_conn()).await?;
        Ok(Some(true))
    }

    pub async fn clear_all_notifications(&self) -> Result<u64> {
        let result = NotificationEntity::update_many()
            .col_expr(NotificationColumn::Cleared, Expr::value(true))
            .filter(NotificationColumn::Cleared.eq(false))
            .exec(self.write_conn())
            .await?;
        Ok(result.rows_affected)
    }
}

/// Delete students, subjects and semesters that no longer have results
async fn delete_orphans<C: ConnectionTrait>(conn: &C) -> Result<OrphanCounts> {
    let mut counts = OrphanCounts::default();

    for (table, column, slot) in [
        ("subjects", "subject_id", &mut counts.subjects_deleted),
        ("semesters", "semester_id", &mut counts.semesters_deleted),
        ("students", "student_id", &mut counts.students_deleted),
    ] {
        let sql = format!(
            "DELETE FROM {table} WHERE NOT EXISTS (SELECT 1 FROM results r WHERE r.{column} = {table}.id)"
        );
        *slot = conn.execute_unprepared(&sql).await?.rows_affected();
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(internal: Option<i32>, external: Option<i32>, total: Option<i32>) -> ResultRow {
        ResultRow {
            result_id: 1,
            usn: "1SV22AD005".into(),
            student_name: "Asha".into(),
            batch: None,
            branch: Some("AD".into()),
            semester: 5,
            exam_month: None,
            exam_year: None,
            subject_code: "BCS501".into(),
            subject_name: "Software Engineering".into(),
            credits: Some(4),
            internal_marks: internal,
            external_marks: external,
            total_marks: total,
            status: ResultStatus::Pass,
            announced_date: None,
        }
    }

    #[test]
    fn test_marks_consistency() {
        assert!(row(Some(40), Some(80), Some(120)).marks_consistent());
        assert!(!row(Some(40), Some(80), Some(100)).marks_consistent());
        assert!(row(None, Some(80), Some(100)).marks_consistent());
    }

    #[test]
    fn test_filter_placeholders_are_sequential() {
        let scope = ResultScope {
            semester: Some(5),
            batch: Some("2022-2026".into()),
            exam_month: Some("December".into()),
            ..Default::default()
        };
        let filter = SqlFilter::from_scope(&scope);

        assert_eq!(
            filter.where_sql(),
            "WHERE se.semester_number = $1 AND st.batch = $2 AND LOWER(se.exam_month) = LOWER($3)"
        );
        assert_eq!(filter.values.len(), 3);
    }

    #[test]
    fn test_exam_month_is_not_a_pattern() {
        let scope = ResultScope {
            exam_month: Some("%".into()),
            ..Default::default()
        };
        let filter = SqlFilter::from_scope(&scope);

        assert!(!filter.where_sql().contains("LIKE"));
        assert_eq!(filter.values, vec![Value::from("%")]);
    }

    #[test]
    fn test_ingest_inserts_resolve_conflicts() {
        for sql in [STUDENT_INSERT, SEMESTER_INSERT, SUBJECT_INSERT] {
            assert!(sql.contains("DO NOTHING"));
        }
        // Untargeted so the NULL-safe semester index applies
        assert!(SEMESTER_INSERT.contains("ON CONFLICT DO NOTHING"));
        assert!(RESULT_UPSERT.contains("ON CONFLICT (student_id, semester_id, subject_id) DO UPDATE"));
        assert!(RESULT_UPSERT.contains("COALESCE(EXCLUDED.announced_date, results.announced_date)"));
        assert_eq!(RESULT_UPSERT.matches('$').count(), 11);
    }

    #[test]
    fn test_status_filter_expands_variants() {
        let mut filter = SqlFilter::default();
        filter.push_any("r.result_status", ResultStatus::Fail.stored_variants());
        assert_eq!(filter.where_sql(), "WHERE UPPER(r.result_status) IN ($1, $2)");

        let mut other = SqlFilter::default();
        other.push_any("r.result_status", ResultStatus::Other.stored_variants());
        assert_eq!(other.where_sql(), "WHERE r.result_status IS NULL");
    }

    #[test]
    fn test_empty_scope_has_no_where() {
        let filter = SqlFilter::from_scope(&ResultScope::default());
        assert_eq!(filter.where_sql(), "");
    }
}
