//! Subject-wise statistics for a semester

use crate::stats::{percentage, MarkStats};
use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectStatistics {
    pub subject_code: String,
    pub subject_name: String,
    pub total_students: usize,
    pub avg_internal: Option<f64>,
    pub avg_external: Option<f64>,
    pub avg_total: Option<f64>,
    pub max_marks: Option<i32>,
    pub min_marks: Option<i32>,
    pub pass_count: usize,
    pub fail_count: usize,
    pub pass_percentage: f64,
}

#[derive(Default)]
struct SubjectAccumulator<'a> {
    name: &'a str,
    count: usize,
    internal: MarkStats,
    external: MarkStats,
    total: MarkStats,
    passed: usize,
    failed: usize,
}

/// Statistics per subject code, in order of first appearance
pub fn subject_statistics(rows: &[ResultRow]) -> Vec<SubjectStatistics> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, SubjectAccumulator> = HashMap::new();

    for row in rows {
        let acc = groups.entry(row.subject_code.as_str()).or_insert_with(|| {
            order.push(row.subject_code.as_str());
            SubjectAccumulator {
                name: row.subject_name.as_str(),
                ..Default::default()
            }
        });

        acc.count += 1;
        if let Some(value) = row.internal_marks {
            acc.internal.push(value);
        }
        if let Some(value) = row.external_marks {
            acc.external.push(value);
        }
        if let Some(value) = row.total_marks {
            acc.total.push(value);
        }
        match row.status {
            ResultStatus::Pass => acc.passed += 1,
            ResultStatus::Fail => acc.failed += 1,
            _ => {}
        }
    }

    order
        .into_iter()
        .filter_map(|code| {
            let acc = groups.remove(code)?;
            Some(SubjectStatistics {
                subject_code: code.to_string(),
                subject_name: acc.name.to_string(),
                total_students: acc.count,
                avg_internal: acc.internal.average(),
                avg_external: acc.external.average(),
                avg_total: acc.total.average(),
                max_marks: acc.total.max(),
                min_marks: acc.total.min(),
                pass_count: acc.passed,
                fail_count: acc.failed,
                pass_percentage: percentage(acc.passed, acc.count),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, pass, row};

    #[test]
    fn test_statistics_in_store_order() {
        let rows = vec![
            pass("1SV22AD001", 5, "BCS502", 140),
            pass("1SV22AD001", 5, "BCS501", 120),
            fail("1SV22AD002", 5, "BCS502", 50),
            row("1SV22AD003", 5, "BCS502", None, ResultStatus::Absent),
        ];

        let stats = subject_statistics(&rows);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].subject_code, "BCS502");
        assert_eq!(stats[1].subject_code, "BCS501");

        let first = &stats[0];
        assert_eq!(first.total_students, 3);
        assert_eq!(first.avg_total, Some(95.0));
        assert_eq!(first.max_marks, Some(140));
        assert_eq!(first.min_marks, Some(50));
        assert_eq!(first.pass_count, 1);
        assert_eq!(first.fail_count, 1);
        assert_eq!(first.pass_percentage, 33.33);
    }

    #[test]
    fn test_pass_percentage_bounded() {
        let rows: Vec<_> = (0..7)
            .map(|i| {
                let usn = format!("1SV22AD{:03}", i);
                if i % 3 == 0 {
                    fail(&usn, 4, "BCS401", 40)
                } else {
                    pass(&usn, 4, "BCS401", 100 + i)
                }
            })
            .collect();

        for stat in subject_statistics(&rows) {
            assert!((0.0..=100.0).contains(&stat.pass_percentage));
            assert!(stat.pass_count + stat.fail_count <= stat.total_students);
        }
    }

    #[test]
    fn test_all_missing_marks() {
        let rows = vec![row("1SV22AD001", 2, "BPHY201", None, ResultStatus::Withheld)];
        let stats = subject_statistics(&rows);
        assert_eq!(stats[0].avg_internal, None);
        assert_eq!(stats[0].max_marks, None);
        assert_eq!(stats[0].pass_percentage, 0.0);
    }
}
