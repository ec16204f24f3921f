//! Result row builders shared by the unit tests

use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use std::sync::atomic::{AtomicI32, Ordering};

static NEXT_ID: AtomicI32 = AtomicI32::new(1);

/// A 4-credit row with internal/external derived from the total
pub fn row(usn: &str, semester: i32, subject: &str, total: Option<i32>, status: ResultStatus) -> ResultRow {
    let internal = total.map(|t| (t / 4).min(50));
    ResultRow {
        result_id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        usn: usn.to_string(),
        student_name: format!("Student {}", usn),
        batch: Some("2022-2026".to_string()),
        branch: Some("AD".to_string()),
        semester,
        exam_month: None,
        exam_year: None,
        subject_code: subject.to_string(),
        subject_name: format!("Subject {}", subject),
        credits: Some(4),
        internal_marks: internal,
        external_marks: total.zip(internal).map(|(t, i)| t - i),
        total_marks: total,
        status,
        announced_date: None,
    }
}

pub fn pass(usn: &str, semester: i32, subject: &str, total: i32) -> ResultRow {
    row(usn, semester, subject, Some(total), ResultStatus::Pass)
}

pub fn fail(usn: &str, semester: i32, subject: &str, total: i32) -> ResultRow {
    row(usn, semester, subject, Some(total), ResultStatus::Fail)
}

pub fn with_credits(mut row: ResultRow, credits: Option<i32>) -> ResultRow {
    row.credits = credits;
    row
}

pub fn in_term(mut row: ResultRow, month: &str, year: i32) -> ResultRow {
    row.exam_month = Some(month.to_string());
    row.exam_year = Some(year);
    row
}
