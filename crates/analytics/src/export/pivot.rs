//! Student-wise pivot: one record per (student, semester), subjects as columns

use crate::grading::GradingPolicy;
use crate::stats::MarkStats;
use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubjectCells {
    pub internal: Option<i32>,
    pub external: Option<i32>,
    pub total: Option<i32>,
    pub status: Option<ResultStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub usn: String,
    pub student_name: String,
    pub batch: Option<String>,
    pub branch: Option<String>,
    pub semester: i32,
    pub exam_month: Option<String>,
    pub exam_year: Option<i32>,
    pub subjects: HashMap<String, SubjectCells>,
    pub total_marks: i64,
    pub average_marks: Option<f64>,
    pub subjects_passed: usize,
    pub subjects_failed: usize,
    pub total_subjects: usize,
    pub sgpa: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentView {
    /// Subject codes in order of first appearance
    pub subject_codes: Vec<String>,
    pub records: Vec<StudentRecord>,
}

const LEADING_COLUMNS: [&str; 7] = [
    "USN",
    "Student Name",
    "Batch",
    "Branch",
    "Semester",
    "Exam Month",
    "Exam Year",
];

const TRAILING_COLUMNS: [&str; 6] = [
    "Total_Marks",
    "Average_Marks",
    "Subjects_Passed",
    "Subjects_Failed",
    "Total_Subjects",
    "SGPA",
];

impl StudentView {
    /// Rows must be in store order so each (student, semester) is contiguous
    pub fn from_rows(policy: &GradingPolicy, rows: &[ResultRow]) -> Self {
        let mut view = StudentView::default();
        let mut seen_codes: HashSet<&str> = HashSet::new();

        for row in rows {
            if seen_codes.insert(row.subject_code.as_str()) {
                view.subject_codes.push(row.subject_code.clone());
            }
        }

        let groups = rows.chunk_by(|a, b| a.usn == b.usn && a.semester == b.semester);
        for group in groups {
            view.records.push(StudentRecord::from_group(policy, group));
        }

        view
    }

    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = LEADING_COLUMNS.iter().map(|h| h.to_string()).collect();
        for code in &self.subject_codes {
            for suffix in ["Internal", "External", "Total", "Result"] {
                headers.push(format!("{}_{}", code, suffix));
            }
        }
        headers.extend(TRAILING_COLUMNS.iter().map(|h| h.to_string()));
        headers
    }
}

impl StudentRecord {
    fn from_group(policy: &GradingPolicy, group: &[ResultRow]) -> Self {
        let first = &group[0];
        let marks = MarkStats::collect(group.iter().map(|r| r.total_marks));
        let refs: Vec<&ResultRow> = group.iter().collect();
        let sgpa = policy
            .semester_credits(&refs)
            .get(&first.semester)
            .and_then(|tally| tally.average());

        Self {
            usn: first.usn.clone(),
            student_name: first.student_name.clone(),
            batch: first.batch.clone(),
            branch: first.branch.clone(),
            semester: first.semester,
            exam_month: group.iter().find_map(|r| r.exam_month.clone()),
            exam_year: group.iter().find_map(|r| r.exam_year),
            subjects: group
                .iter()
                .map(|r| {
                    (
                        r.subject_code.clone(),
                        SubjectCells {
                            internal: r.internal_marks,
                            external: r.external_marks,
                            total: r.total_marks,
                            status: r.status.code().map(|_| r.status),
                        },
                    )
                })
                .collect(),
            total_marks: marks.sum(),
            average_marks: marks.average(),
            subjects_passed: group.iter().filter(|r| r.status == ResultStatus::Pass).count(),
            subjects_failed: group.iter().filter(|r| r.status == ResultStatus::Fail).count(),
            total_subjects: group.len(),
            sgpa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, pass};

    #[test]
    fn test_pivot_groups_student_semesters() {
        let rows = vec![
            pass("1SV22AD001", 5, "BCS501", 160),
            fail("1SV22AD001", 5, "BCS502", 60),
            pass("1SV22AD001", 6, "BCS601", 150),
            pass("1SV22AD002", 5, "BCS501", 120),
        ];

        let view = StudentView::from_rows(&GradingPolicy::default(), &rows);
        assert_eq!(view.subject_codes, vec!["BCS501", "BCS502", "BCS601"]);
        assert_eq!(view.records.len(), 3);

        let first = &view.records[0];
        assert_eq!(first.total_subjects, 2);
        assert_eq!(first.subjects_failed, 1);
        assert_eq!(first.total_marks, 220);
        assert_eq!(first.sgpa, Some(4.5));
        assert_eq!(first.subjects["BCS502"].status, Some(ResultStatus::Fail));

        let headers = view.headers();
        assert_eq!(headers.len(), 7 + 3 * 4 + 6);
        assert_eq!(headers[7], "BCS501_Internal");
        assert_eq!(headers.last().map(String::as_str), Some("SGPA"));
    }

    #[test]
    fn test_empty_view() {
        let view = StudentView::from_rows(&GradingPolicy::default(), &[]);
        assert!(view.records.is_empty());
        assert_eq!(view.headers().len(), 13);
    }
}
