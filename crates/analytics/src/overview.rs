//! Cohort-wide statistics

use crate::gpa::{final_cgpa, rows_by_student};
use crate::grading::{round2, GradingPolicy};
use crate::stats::{percentage, MarkStats};
use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallStatistics {
    pub pass_rate: f64,
    pub total_students: usize,
    pub total_records: usize,
    pub average_cgpa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterOverview {
    pub semester: i32,
    pub total_records: usize,
    pub total_students: usize,
    pub avg_total_marks: f64,
    pub pass_rate: f64,
}

/// Pass rate, head counts and the mean of each student's final CGPA
pub fn overall_statistics(policy: &GradingPolicy, rows: &[ResultRow]) -> OverallStatistics {
    let students = rows_by_student(rows);
    let passed = rows.iter().filter(|r| r.status == ResultStatus::Pass).count();

    let cgpas: Vec<f64> = students
        .values()
        .filter_map(|student_rows| final_cgpa(policy, student_rows))
        .collect();
    let average_cgpa = if cgpas.is_empty() {
        0.0
    } else {
        round2(cgpas.iter().sum::<f64>() / cgpas.len() as f64)
    };

    OverallStatistics {
        pass_rate: percentage(passed, rows.len()),
        total_students: students.len(),
        total_records: rows.len(),
        average_cgpa,
    }
}

/// Per-semester record counts, head counts, average total and pass rate
pub fn semester_overview(rows: &[ResultRow]) -> Vec<SemesterOverview> {
    #[derive(Default)]
    struct Acc<'a> {
        records: usize,
        passed: usize,
        students: HashSet<&'a str>,
        totals: MarkStats,
    }

    let mut semesters: BTreeMap<i32, Acc> = BTreeMap::new();
    for row in rows {
        let acc = semesters.entry(row.semester).or_default();
        acc.records += 1;
        acc.students.insert(row.usn.as_str());
        if row.status == ResultStatus::Pass {
            acc.passed += 1;
        }
        if let Some(total) = row.total_marks {
            acc.totals.push(total);
        }
    }

    semesters
        .into_iter()
        .map(|(semester, acc)| SemesterOverview {
            semester,
            total_records: acc.records,
            total_students: acc.students.len(),
            avg_total_marks: acc.totals.average().unwrap_or(0.0),
            pass_rate: percentage(acc.passed, acc.records),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, pass, row};

    #[test]
    fn test_overall_statistics() {
        let rows = vec![
            pass("1SV22AD001", 1, "BMATS101", 180),
            pass("1SV22AD001", 2, "BMATS201", 140),
            pass("1SV22AD002", 1, "BMATS101", 120),
            fail("1SV22AD002", 1, "BPHY102", 50),
        ];

        let stats = overall_statistics(&GradingPolicy::default(), &rows);
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.pass_rate, 75.0);
        // AD001: (10 + 8) / 2 = 9.0, AD002: (7 + 0) / 2 = 3.5
        assert_eq!(stats.average_cgpa, 6.25);
    }

    #[test]
    fn test_empty_scope_is_zero() {
        assert_eq!(
            overall_statistics(&GradingPolicy::default(), &[]),
            OverallStatistics::default()
        );
        assert!(semester_overview(&[]).is_empty());
    }

    #[test]
    fn test_semester_overview() {
        let rows = vec![
            pass("1SV22AD001", 3, "BCS301", 150),
            fail("1SV22AD001", 3, "BCS302", 60),
            pass("1SV22AD002", 3, "BCS301", 120),
            row("1SV22AD001", 1, "BMATS101", None, ResultStatus::Absent),
        ];

        let overview = semester_overview(&rows);
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].semester, 1);
        assert_eq!(overview[0].avg_total_marks, 0.0);
        assert_eq!(overview[0].pass_rate, 0.0);

        assert_eq!(overview[1].total_records, 3);
        assert_eq!(overview[1].total_students, 2);
        assert_eq!(overview[1].avg_total_marks, 110.0);
        assert_eq!(overview[1].pass_rate, 66.67);
    }
}
