//! Mark to grade point conversion and credit weighting

use automarks_common::config::{GradeBand, GradingConfig};
use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use automarks_common::errors::{AppError, Result};
use std::collections::{BTreeMap, HashMap};

/// Validated grading rules
#[derive(Debug, Clone, PartialEq)]
pub struct GradingPolicy {
    scale: Vec<GradeBand>,
    max_total_marks: f64,
    default_credits: i32,
    carryover_grade_point: Option<f64>,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        let config = GradingConfig::default();
        Self {
            scale: config.scale,
            max_total_marks: config.max_total_marks,
            default_credits: config.default_credits,
            carryover_grade_point: config.carryover_grade_point,
        }
    }
}

impl GradingPolicy {
    pub fn from_config(config: &GradingConfig) -> Result<Self> {
        if config.scale.is_empty() {
            return Err(configuration("grading.scale must not be empty"));
        }
        if !config
            .scale
            .windows(2)
            .all(|pair| pair[0].lower_bound > pair[1].lower_bound)
        {
            return Err(configuration(
                "grading.scale bounds must be strictly descending",
            ));
        }
        if config.scale.iter().any(|band| band.grade_point < 0.0) {
            return Err(configuration("grading.scale grade points must be non-negative"));
        }
        if config.max_total_marks <= 0.0 {
            return Err(configuration("grading.max_total_marks must be positive"));
        }
        if config.default_credits < 0 {
            return Err(configuration("grading.default_credits must not be negative"));
        }

        Ok(Self {
            scale: config.scale.clone(),
            max_total_marks: config.max_total_marks,
            default_credits: config.default_credits,
            carryover_grade_point: config.carryover_grade_point,
        })
    }

    pub fn max_total_marks(&self) -> f64 {
        self.max_total_marks
    }

    /// Grade point for a total, from its percentage of `max_total_marks`
    pub fn grade_point_for_marks(&self, total: i32) -> f64 {
        let percent = f64::from(total) * 100.0 / self.max_total_marks;
        self.scale
            .iter()
            .find(|band| percent >= band.lower_bound)
            .map_or(0.0, |band| band.grade_point)
    }

    /// `None` when the row has no total and cannot be graded
    pub fn grade_point(&self, row: &ResultRow) -> Option<f64> {
        let total = row.total_marks?;
        if row.status.forfeits_grade() {
            Some(0.0)
        } else {
            Some(self.grade_point_for_marks(total))
        }
    }

    /// Configured credits, falling back to the default for unset subjects
    pub fn credits(&self, row: &ResultRow) -> i32 {
        row.credits.unwrap_or(self.default_credits)
    }

    /// Credit-weighted grade points per semester number for one student's rows.
    ///
    /// Rows without a total or with zero credits do not contribute. A pass in a
    /// subject failed in an earlier term is capped at the carry-over grade point.
    pub fn semester_credits(&self, rows: &[&ResultRow]) -> BTreeMap<i32, CreditTally> {
        let fails = FailHistory::collect(rows);
        let mut tallies: BTreeMap<i32, CreditTally> = BTreeMap::new();

        for row in rows {
            let credits = self.credits(row);
            if credits <= 0 {
                continue;
            }
            let Some(mut grade_point) = self.grade_point(row) else {
                continue;
            };

            if let Some(cap) = self.carryover_grade_point {
                if row.status == ResultStatus::Pass && fails.cleared_after_fail(row) {
                    grade_point = cap;
                }
            }

            let tally = tallies.entry(row.semester).or_default();
            tally.credits += i64::from(credits);
            tally.credit_points += grade_point * f64::from(credits);
        }

        tallies
    }
}

fn configuration(message: &str) -> AppError {
    AppError::Configuration {
        message: message.to_string(),
    }
}

/// Graded credits and credit points of one semester
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CreditTally {
    pub credits: i64,
    pub credit_points: f64,
}

impl CreditTally {
    /// `None` when nothing was graded
    pub fn average(&self) -> Option<f64> {
        (self.credits > 0).then(|| round2(self.credit_points / self.credits as f64))
    }

    pub fn add(&mut self, other: &CreditTally) {
        self.credits += other.credits;
        self.credit_points += other.credit_points;
    }
}

/// Comparable exam term, `year * 100 + month`; `None` when the month is unrecognised
pub fn term_key(exam_year: Option<i32>, exam_month: Option<&str>) -> Option<i32> {
    let month = match exam_month?.trim().to_ascii_lowercase().as_str() {
        "january" | "jan" => 1,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(exam_year? * 100 + month)
}

/// Fails per (student, subject), with the earliest known fail term
struct FailHistory<'a> {
    by_subject: HashMap<(&'a str, &'a str), Option<i32>>,
}

impl<'a> FailHistory<'a> {
    fn collect(rows: &[&'a ResultRow]) -> Self {
        let mut by_subject: HashMap<(&str, &str), Option<i32>> = HashMap::new();

        for row in rows.iter().copied().filter(|r| r.status == ResultStatus::Fail) {
            let term = term_key(row.exam_year, row.exam_month.as_deref());
            by_subject
                .entry((row.usn.as_str(), row.subject_code.as_str()))
                .and_modify(|earliest| {
                    *earliest = match (*earliest, term) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (known, None) | (None, known) => known,
                    }
                })
                .or_insert(term);
        }

        Self { by_subject }
    }

    /// True when this pass follows a fail. A pass with an unknown term counts
    /// any fail in the subject; a known term needs an earlier known fail.
    fn cleared_after_fail(&self, row: &ResultRow) -> bool {
        let Some(earliest_fail) = self
            .by_subject
            .get(&(row.usn.as_str(), row.subject_code.as_str()))
        else {
            return false;
        };

        match term_key(row.exam_year, row.exam_month.as_deref()) {
            None => true,
            Some(term) => earliest_fail.is_some_and(|fail| fail < term),
        }
    }
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::row;

    #[test]
    fn test_default_scale_bands() {
        let policy = GradingPolicy::default();
        assert_eq!(policy.grade_point_for_marks(200), 10.0);
        assert_eq!(policy.grade_point_for_marks(180), 10.0);
        assert_eq!(policy.grade_point_for_marks(160), 9.0);
        assert_eq!(policy.grade_point_for_marks(140), 8.0);
        assert_eq!(policy.grade_point_for_marks(90), 5.0);
        assert_eq!(policy.grade_point_for_marks(80), 4.0);
        assert_eq!(policy.grade_point_for_marks(79), 0.0);
    }

    #[test]
    fn test_forfeited_statuses_score_zero() {
        let policy = GradingPolicy::default();
        let mut r = row("1SV22AD005", 5, "BCS501", Some(180), ResultStatus::Absent);
        assert_eq!(policy.grade_point(&r), Some(0.0));

        r.status = ResultStatus::Other;
        assert_eq!(policy.grade_point(&r), Some(10.0));

        r.total_marks = None;
        assert_eq!(policy.grade_point(&r), None);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let mut config = GradingConfig::default();
        config.scale.swap(0, 1);
        assert!(matches!(
            GradingPolicy::from_config(&config),
            Err(AppError::Configuration { .. })
        ));

        config.scale.clear();
        tokio_test::assert_err!(GradingPolicy::from_config(&config));

        let mut zero_max = GradingConfig::default();
        zero_max.max_total_marks = 0.0;
        tokio_test::assert_err!(GradingPolicy::from_config(&zero_max));

        tokio_test::assert_ok!(GradingPolicy::from_config(&GradingConfig::default()));
    }

    #[test]
    fn test_term_key() {
        assert_eq!(term_key(Some(2024), Some("December")), Some(202412));
        assert_eq!(term_key(Some(2024), Some(" jan ")), Some(202401));
        assert_eq!(term_key(Some(2024), Some("March")), None);
        assert_eq!(term_key(None, Some("June")), None);
    }

    #[test]
    fn test_carryover_caps_cleared_subject() {
        let policy = GradingPolicy::default();

        let mut failed = row("1SV22AD005", 3, "BCS301", Some(60), ResultStatus::Fail);
        failed.exam_year = Some(2023);
        failed.exam_month = Some("December".into());
        let mut cleared = row("1SV22AD005", 3, "BCS301", Some(170), ResultStatus::Pass);
        cleared.exam_year = Some(2024);
        cleared.exam_month = Some("June".into());

        let rows = vec![&failed, &cleared];
        let tallies = policy.semester_credits(&rows);
        // 0 * 4 + 4 * 4 over 8 credits
        assert_eq!(tallies[&3].credits, 8);
        assert_eq!(tallies[&3].average(), Some(2.0));

        let mut no_cap = GradingConfig::default();
        no_cap.carryover_grade_point = None;
        let uncapped = GradingPolicy::from_config(&no_cap).unwrap();
        assert_eq!(uncapped.semester_credits(&rows)[&3].average(), Some(4.5));
    }

    #[test]
    fn test_carryover_ignores_later_fail() {
        let policy = GradingPolicy::default();

        let mut passed = row("1SV22AD005", 3, "BCS301", Some(170), ResultStatus::Pass);
        passed.exam_year = Some(2023);
        passed.exam_month = Some("December".into());
        let mut failed = row("1SV22AD005", 3, "BCS302", Some(40), ResultStatus::Fail);
        failed.exam_year = Some(2024);
        failed.exam_month = Some("June".into());

        let tallies = policy.semester_credits(&[&passed, &failed]);
        assert_eq!(tallies[&3].credit_points, 36.0);
    }

    #[test]
    fn test_zero_credit_subjects_excluded() {
        let policy = GradingPolicy::default();
        let mut audit = row("1SV22AD005", 1, "BPE101", Some(190), ResultStatus::Pass);
        audit.credits = Some(0);

        assert!(policy.semester_credits(&[&audit]).is_empty());
    }
}
