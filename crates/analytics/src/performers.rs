//! Ranked performer lists

use crate::gpa::{rows_by_student, semester_sgpa};
use crate::grading::{round2, GradingPolicy};
use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use automarks_common::errors::AppError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Ranking criterion for semester-wide performer lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    #[default]
    Marks,
    Sgpa,
}

impl FromStr for RankBy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "marks" => Ok(RankBy::Marks),
            "sgpa" => Ok(RankBy::Sgpa),
            other => Err(AppError::invalid_scope(format!(
                "unknown rank_by '{}', expected 'marks' or 'sgpa'",
                other
            ))),
        }
    }
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankBy::Marks => f.write_str("marks"),
            RankBy::Sgpa => f.write_str("sgpa"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPerformer {
    pub rank: usize,
    pub usn: String,
    pub student_name: String,
    /// Subject code, or `ALL` for semester-wide rankings
    pub subject_code: String,
    pub subject_name: String,
    pub total_marks: Option<i64>,
    pub result_status: Option<ResultStatus>,
    pub sgpa: Option<f64>,
    pub total_credits: Option<i64>,
    /// Ranked value: marks or SGPA
    pub value: f64,
    /// `value` relative to the best value in the ranked set
    pub percentage: f64,
}

/// Rank performers in `semester`. With a subject code each row in that subject
/// is ranked by its total; otherwise students are ranked by `rank_by`.
pub fn top_performers(
    policy: &GradingPolicy,
    semester: i32,
    subject_code: Option<&str>,
    limit: usize,
    rank_by: RankBy,
    rows: &[ResultRow],
) -> Vec<TopPerformer> {
    let candidates = match (subject_code, rank_by) {
        (Some(code), _) => by_subject(rows, code),
        (None, RankBy::Marks) => by_aggregate_marks(semester, rows),
        (None, RankBy::Sgpa) => by_sgpa(policy, semester, rows),
    };
    rank(candidates, limit)
}

fn by_subject(rows: &[ResultRow], code: &str) -> Vec<TopPerformer> {
    rows.iter()
        .filter(|r| r.subject_code == code)
        .filter_map(|r| {
            let total = r.total_marks?;
            Some(TopPerformer {
                rank: 0,
                usn: r.usn.clone(),
                student_name: r.student_name.clone(),
                subject_code: r.subject_code.clone(),
                subject_name: r.subject_name.clone(),
                total_marks: Some(i64::from(total)),
                result_status: Some(r.status),
                sgpa: None,
                total_credits: None,
                value: f64::from(total),
                percentage: 0.0,
            })
        })
        .collect()
}

fn by_aggregate_marks(semester: i32, rows: &[ResultRow]) -> Vec<TopPerformer> {
    rows_by_student(rows)
        .into_iter()
        .map(|(usn, student_rows)| {
            let total: i64 = student_rows
                .iter()
                .filter_map(|r| r.total_marks)
                .map(i64::from)
                .sum();
            let all_passed = student_rows.iter().all(|r| r.status == ResultStatus::Pass);

            TopPerformer {
                rank: 0,
                usn: usn.to_string(),
                student_name: student_rows[0].student_name.clone(),
                subject_code: "ALL".to_string(),
                subject_name: format!("Semester {} Aggregate", semester),
                total_marks: Some(total),
                result_status: Some(if all_passed {
                    ResultStatus::Pass
                } else {
                    ResultStatus::Fail
                }),
                sgpa: None,
                total_credits: None,
                value: total as f64,
                percentage: 0.0,
            }
        })
        .collect()
}

fn by_sgpa(policy: &GradingPolicy, semester: i32, rows: &[ResultRow]) -> Vec<TopPerformer> {
    semester_sgpa(policy, semester, rows)
        .into_iter()
        .map(|student| TopPerformer {
            rank: 0,
            usn: student.usn,
            student_name: student.student_name,
            subject_code: "ALL".to_string(),
            subject_name: format!("Semester {} SGPA", semester),
            total_marks: None,
            result_status: None,
            sgpa: Some(student.sgpa),
            total_credits: Some(student.total_credits),
            value: student.sgpa,
            percentage: 0.0,
        })
        .collect()
}

/// Sort descending by value, ties by USN ascending, then truncate
fn rank(mut candidates: Vec<TopPerformer>, limit: usize) -> Vec<TopPerformer> {
    candidates.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.usn.cmp(&b.usn))
    });

    let best = candidates.first().map_or(0.0, |c| c.value);
    let scale = if best > 0.0 { best } else { 1.0 };

    candidates.truncate(limit);
    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = index + 1;
        candidate.percentage = round2(candidate.value * 100.0 / scale);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, pass, row};

    #[test]
    fn test_ties_broken_by_usn() {
        let rows = vec![
            pass("1SV22AD003", 5, "BCS501", 190),
            pass("1SV22AD003", 5, "BCS502", 200),
            pass("1SV22AD003", 5, "BCS503", 160),
            pass("1SV22AD002", 5, "BCS501", 200),
            pass("1SV22AD002", 5, "BCS502", 200),
            pass("1SV22AD002", 5, "BCS503", 150),
            pass("1SV22AD001", 5, "BCS501", 200),
            pass("1SV22AD001", 5, "BCS502", 200),
            pass("1SV22AD001", 5, "BCS503", 150),
        ];

        let top = top_performers(&GradingPolicy::default(), 5, None, 2, RankBy::Marks, &rows);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].usn, "1SV22AD001");
        assert_eq!(top[1].usn, "1SV22AD002");
        assert_eq!(top[0].total_marks, Some(550));
        assert_eq!(top[0].percentage, 100.0);
        assert_eq!(top[1].rank, 2);
    }

    #[test]
    fn test_aggregate_marks_ranking() {
        let rows = vec![
            pass("1SV22AD001", 5, "BCS501", 550),
            pass("1SV22AD002", 5, "BCS501", 700),
            pass("1SV22AD003", 5, "BCS501", 700),
        ];

        let top = top_performers(&GradingPolicy::default(), 5, None, 2, RankBy::Marks, &rows);
        let usns: Vec<&str> = top.iter().map(|t| t.usn.as_str()).collect();
        assert_eq!(usns, vec!["1SV22AD002", "1SV22AD003"]);
        assert!(top.iter().all(|t| t.percentage == 100.0));
    }

    #[test]
    fn test_aggregate_status_requires_all_passes() {
        let rows = vec![
            pass("1SV22AD001", 5, "BCS501", 150),
            fail("1SV22AD001", 5, "BCS502", 70),
            pass("1SV22AD002", 5, "BCS501", 100),
        ];

        let top = top_performers(&GradingPolicy::default(), 5, None, 10, RankBy::Marks, &rows);
        assert_eq!(top[0].usn, "1SV22AD001");
        assert_eq!(top[0].result_status, Some(ResultStatus::Fail));
        assert_eq!(top[1].result_status, Some(ResultStatus::Pass));
        assert_eq!(top[1].percentage, 45.45);
    }

    #[test]
    fn test_subject_ranking_skips_missing_totals() {
        let rows = vec![
            pass("1SV22AD001", 5, "BCS501", 120),
            row("1SV22AD002", 5, "BCS501", None, ResultStatus::Absent),
            pass("1SV22AD003", 5, "BCS501", 180),
            pass("1SV22AD003", 5, "BCS502", 200),
        ];

        let top = top_performers(&GradingPolicy::default(), 5, Some("BCS501"), 10, RankBy::Sgpa, &rows);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].usn, "1SV22AD003");
        assert_eq!(top[0].subject_code, "BCS501");
        assert_eq!(top[1].percentage, 66.67);
    }

    #[test]
    fn test_sgpa_ranking() {
        let rows = vec![
            pass("1SV22AD001", 5, "BCS501", 120),
            pass("1SV22AD002", 5, "BCS501", 190),
        ];

        let top = top_performers(&GradingPolicy::default(), 5, None, 10, RankBy::Sgpa, &rows);
        assert_eq!(top[0].usn, "1SV22AD002");
        assert_eq!(top[0].sgpa, Some(10.0));
        assert_eq!(top[1].sgpa, Some(7.0));
        assert_eq!(top[1].percentage, 70.0);
    }

    #[test]
    fn test_all_zero_values() {
        let rows = vec![fail("1SV22AD001", 5, "BCS501", 0)];
        let top = top_performers(&GradingPolicy::default(), 5, None, 10, RankBy::Marks, &rows);
        assert_eq!(top[0].percentage, 0.0);
    }

    #[test]
    fn test_rank_by_parse() {
        assert_eq!("SGPA".parse::<RankBy>().unwrap(), RankBy::Sgpa);
        assert_eq!("".parse::<RankBy>().unwrap(), RankBy::Marks);
        assert!(matches!(
            "cgpa".parse::<RankBy>(),
            Err(AppError::InvalidScope { .. })
        ));
    }
}
