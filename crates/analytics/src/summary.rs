//! Per-semester summary of one student's results

use crate::stats::MarkStats;
use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterSummary {
    pub usn: String,
    pub student_name: String,
    pub semester_number: i32,
    pub exam_month: Option<String>,
    pub exam_year: Option<i32>,
    pub total_subjects: usize,
    pub subjects_passed: usize,
    pub subjects_failed: usize,
    pub average_marks: Option<f64>,
    pub highest_marks: Option<i32>,
    pub lowest_marks: Option<i32>,
}

/// One summary per semester the student has rows for, ascending
pub fn semester_summaries(usn: &str, rows: &[ResultRow]) -> Vec<SemesterSummary> {
    let mut by_semester: BTreeMap<i32, Vec<&ResultRow>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.usn == usn) {
        by_semester.entry(row.semester).or_default().push(row);
    }

    by_semester
        .into_iter()
        .map(|(semester, rows)| {
            let marks = MarkStats::collect(rows.iter().map(|r| r.total_marks));
            SemesterSummary {
                usn: usn.to_string(),
                student_name: rows[0].student_name.clone(),
                semester_number: semester,
                exam_month: rows.iter().find_map(|r| r.exam_month.clone()),
                exam_year: rows.iter().find_map(|r| r.exam_year),
                total_subjects: rows.len(),
                subjects_passed: count_status(&rows, ResultStatus::Pass),
                subjects_failed: count_status(&rows, ResultStatus::Fail),
                average_marks: marks.average(),
                highest_marks: marks.max(),
                lowest_marks: marks.min(),
            }
        })
        .collect()
}

pub(crate) fn count_status(rows: &[&ResultRow], status: ResultStatus) -> usize {
    rows.iter().filter(|r| r.status == status).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, pass, row};

    #[test]
    fn test_summary_per_semester() {
        let rows = vec![
            pass("1SV22AD005", 3, "BCS301", 150),
            fail("1SV22AD005", 3, "BCS302", 60),
            row("1SV22AD005", 3, "BCS303", None, ResultStatus::Absent),
            pass("1SV22AD005", 1, "BMATS101", 121),
            pass("1SV22AD006", 1, "BMATS101", 190),
        ];

        let summaries = semester_summaries("1SV22AD005", &rows);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].semester_number, 1);
        assert_eq!(summaries[0].highest_marks, Some(121));

        let third = &summaries[1];
        assert_eq!(third.total_subjects, 3);
        assert_eq!(third.subjects_passed, 1);
        assert_eq!(third.subjects_failed, 1);
        assert_eq!(third.average_marks, Some(105.0));
        assert_eq!(third.lowest_marks, Some(60));
    }

    #[test]
    fn test_no_rows_no_summaries() {
        assert!(semester_summaries("1SV22AD005", &[]).is_empty());
    }
}
