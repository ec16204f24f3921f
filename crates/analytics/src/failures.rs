//! Failure analysis for a semester

use crate::stats::percentage;
use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    /// Result rows in scope
    pub total_results: usize,
    /// Rows with a Fail status
    pub failed_results: usize,
    /// Distinct students with at least one Fail
    pub total_failures: usize,
    /// `total_failures` over distinct students, as a percentage
    pub failure_rate: f64,
    pub subject_wise_failures: BTreeMap<String, usize>,
    pub students_with_failures: Vec<String>,
}

pub fn failure_analysis(rows: &[ResultRow]) -> FailureAnalysis {
    let students: HashSet<&str> = rows.iter().map(|r| r.usn.as_str()).collect();
    let mut failed_students: BTreeSet<&str> = BTreeSet::new();
    let mut subject_wise_failures: BTreeMap<String, usize> = BTreeMap::new();
    let mut failed_results = 0;

    for row in rows.iter().filter(|r| r.status == ResultStatus::Fail) {
        failed_results += 1;
        failed_students.insert(row.usn.as_str());
        *subject_wise_failures
            .entry(row.subject_code.clone())
            .or_default() += 1;
    }

    FailureAnalysis {
        total_results: rows.len(),
        failed_results,
        total_failures: failed_students.len(),
        failure_rate: percentage(failed_students.len(), students.len()),
        subject_wise_failures,
        students_with_failures: failed_students.into_iter().map(str::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, pass};

    #[test]
    fn test_failure_rate_over_students() {
        let mut rows = Vec::new();
        for i in 0..10 {
            let usn = format!("1SV22AD{:03}", i);
            rows.push(pass(&usn, 5, "BCS501", 150));
            if i < 3 {
                rows.push(fail(&usn, 5, "BCS502", 55));
                rows.push(fail(&usn, 5, "BCS503", 30));
            }
        }

        let analysis = failure_analysis(&rows);
        assert_eq!(analysis.total_results, 16);
        assert_eq!(analysis.failed_results, 6);
        assert_eq!(analysis.total_failures, 3);
        assert_eq!(analysis.failure_rate, 30.0);
        assert_eq!(analysis.subject_wise_failures["BCS502"], 3);
        assert_eq!(
            analysis.students_with_failures,
            vec!["1SV22AD000", "1SV22AD001", "1SV22AD002"]
        );
    }

    #[test]
    fn test_empty_scope() {
        let analysis = failure_analysis(&[]);
        assert_eq!(analysis, FailureAnalysis::default());
    }
}
