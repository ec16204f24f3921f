//! PostgreSQL schema for the result store

use crate::errors::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::info;

/// Idempotent DDL; every statement is `IF NOT EXISTS`
pub const SCHEMA_SQL: &str = r#"
-- Students: one row per USN
CREATE TABLE IF NOT EXISTS students (
    id SERIAL PRIMARY KEY,
    usn VARCHAR(20) NOT NULL UNIQUE,
    student_name VARCHAR(255) NOT NULL,
    batch VARCHAR(9),
    branch VARCHAR(3),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Semesters: exam terms
CREATE TABLE IF NOT EXISTS semesters (
    id SERIAL PRIMARY KEY,
    semester_number INTEGER NOT NULL CHECK (semester_number BETWEEN 1 AND 8),
    exam_month VARCHAR(20),
    exam_year INTEGER CHECK (exam_year BETWEEN 2000 AND 2100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- One row per term; unknown month or year still collide
CREATE UNIQUE INDEX IF NOT EXISTS uq_semesters_term
    ON semesters (semester_number, COALESCE(exam_month, ''), COALESCE(exam_year, 0));

-- Subjects: credits NULL means the default, 0 a non-credit course
CREATE TABLE IF NOT EXISTS subjects (
    id SERIAL PRIMARY KEY,
    subject_code VARCHAR(20) NOT NULL UNIQUE,
    subject_name VARCHAR(255) NOT NULL,
    credits INTEGER CHECK (credits BETWEEN 0 AND 50),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Results: one row per (student, semester, subject)
CREATE TABLE IF NOT EXISTS results (
    id SERIAL PRIMARY KEY,
    student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    semester_id INTEGER NOT NULL REFERENCES semesters(id) ON DELETE CASCADE,
    subject_id INTEGER NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
    internal_marks INTEGER CHECK (internal_marks BETWEEN 0 AND 50),
    external_marks INTEGER CHECK (external_marks BETWEEN 0 AND 100),
    total_marks INTEGER CHECK (total_marks BETWEEN 0 AND 200),
    upload_batch_id VARCHAR(36),
    result_status VARCHAR(10),
    announced_date DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (student_id, semester_id, subject_id)
);

-- Upload logs: progress of ingestion batches
CREATE TABLE IF NOT EXISTS upload_logs (
    id SERIAL PRIMARY KEY,
    batch_id VARCHAR(36) NOT NULL UNIQUE,
    total_files INTEGER NOT NULL DEFAULT 0,
    processed_files INTEGER NOT NULL DEFAULT 0,
    failed_files INTEGER NOT NULL DEFAULT 0,
    current_file VARCHAR(255),
    current_file_index INTEGER NOT NULL DEFAULT 0,
    status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
    error_log TEXT,
    upload_timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    completed_timestamp TIMESTAMPTZ
);

-- Notifications: dashboard event feed
CREATE TABLE IF NOT EXISTS notifications (
    id SERIAL PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    detail TEXT,
    level VARCHAR(20) NOT NULL DEFAULT 'info',
    cleared BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes for scoped queries
CREATE INDEX IF NOT EXISTS idx_students_batch ON students(batch);
CREATE INDEX IF NOT EXISTS idx_students_branch ON students(branch);
CREATE INDEX IF NOT EXISTS idx_results_student ON results(student_id);
CREATE INDEX IF NOT EXISTS idx_results_semester ON results(semester_id);
CREATE INDEX IF NOT EXISTS idx_results_upload_batch ON results(upload_batch_id);
CREATE INDEX IF NOT EXISTS idx_notifications_open ON notifications(cleared, created_at DESC);
"#;

/// Create any missing tables and indexes
pub async fn apply_schema(conn: &DatabaseConnection) -> Result<()> {
    conn.execute_unprepared(SCHEMA_SQL).await?;
    info!("Database schema verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_covers_every_table() {
        for table in [
            "students",
            "semesters",
            "subjects",
            "results",
            "upload_logs",
            "notifications",
        ] {
            assert!(
                SCHEMA_SQL.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "missing table {}",
                table
            );
        }
    }

    #[test]
    fn test_semester_term_key_is_null_safe() {
        assert!(SCHEMA_SQL.contains(
            "ON semesters (semester_number, COALESCE(exam_month, ''), COALESCE(exam_year, 0))"
        ));
        assert!(!SCHEMA_SQL.contains("UNIQUE (semester_number, exam_month, exam_year)"));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let creates = SCHEMA_SQL.matches("CREATE ").count();
        let guarded = SCHEMA_SQL.matches(" IF NOT EXISTS ").count();
        assert_eq!(creates, guarded);
    }
}
