//! Query scope: the filter set restricting result queries and aggregations
//!
//! Scopes are validated and normalised before any query runs, so a malformed
//! combination fails fast with `AppError::InvalidScope`.

use crate::db::ResultRow;
use crate::errors::{AppError, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::OnceLock;

pub const SEMESTER_RANGE: RangeInclusive<i32> = 1..=8;
pub const EXAM_YEAR_RANGE: RangeInclusive<i32> = 2000..=2100;

/// Length of an undergraduate batch in years
const BATCH_SPAN_YEARS: i32 = 4;

fn batch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4})-(\d{4})$").expect("static regex"))
}

/// Filters applied to the joined result rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultScope {
    pub semester: Option<i32>,
    pub batch: Option<String>,
    pub branch: Option<String>,
    pub subject_code: Option<String>,
    pub exam_year: Option<i32>,
    pub exam_month: Option<String>,
    pub usn: Option<String>,
}

impl ResultScope {
    pub fn for_semester(semester: i32) -> Self {
        Self {
            semester: Some(semester),
            ..Default::default()
        }
    }

    pub fn for_student(usn: impl Into<String>) -> Self {
        Self {
            usn: Some(usn.into()),
            ..Default::default()
        }
    }

    pub fn with_semester(mut self, semester: i32) -> Self {
        self.semester = Some(semester);
        self
    }

    pub fn with_subject(mut self, subject_code: Option<String>) -> Self {
        self.subject_code = subject_code;
        self
    }

    pub fn has_term(&self) -> bool {
        self.exam_year.is_some() || self.exam_month.is_some()
    }

    /// The same filters without exam month and year
    pub fn without_term(mut self) -> Self {
        self.exam_year = None;
        self.exam_month = None;
        self
    }

    /// Validate ranges and canonicalise string filters.
    ///
    /// Blank strings are treated as absent, branch and subject codes are
    /// upper-cased, USNs are trimmed and upper-cased.
    pub fn normalized(self) -> Result<Self> {
        if let Some(semester) = self.semester {
            validate_semester(semester)?;
        }

        if let Some(year) = self.exam_year {
            if !EXAM_YEAR_RANGE.contains(&year) {
                return Err(AppError::invalid_scope(format!(
                    "exam_year {} outside {}..={}",
                    year,
                    EXAM_YEAR_RANGE.start(),
                    EXAM_YEAR_RANGE.end()
                )));
            }
        }

        let usn = match self.usn {
            Some(raw) => {
                let trimmed = raw.trim().to_ascii_uppercase();
                if trimmed.is_empty() {
                    return Err(AppError::invalid_scope("usn must not be empty"));
                }
                Some(trimmed)
            }
            None => None,
        };

        Ok(Self {
            semester: self.semester,
            batch: normalize_batch(self.batch.as_deref())?,
            branch: non_blank(self.branch).map(|b| b.to_ascii_uppercase()),
            subject_code: non_blank(self.subject_code).map(|c| c.to_ascii_uppercase()),
            exam_year: self.exam_year,
            exam_month: non_blank(self.exam_month),
            usn,
        })
    }

    /// In-process equivalent of the store's WHERE clause
    pub fn matches(&self, row: &ResultRow) -> bool {
        self.semester.map_or(true, |s| row.semester == s)
            && self.usn.as_deref().map_or(true, |u| row.usn == u)
            && self
                .batch
                .as_deref()
                .map_or(true, |b| row.batch.as_deref() == Some(b))
            && self
                .branch
                .as_deref()
                .map_or(true, |b| row.branch.as_deref() == Some(b))
            && self
                .subject_code
                .as_deref()
                .map_or(true, |c| row.subject_code == c)
            && self.exam_year.map_or(true, |y| row.exam_year == Some(y))
            && self.exam_month.as_deref().map_or(true, |m| {
                row.exam_month
                    .as_deref()
                    .is_some_and(|rm| rm.eq_ignore_ascii_case(m))
            })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_semester(semester: i32) -> Result<i32> {
    if SEMESTER_RANGE.contains(&semester) {
        Ok(semester)
    } else {
        Err(AppError::invalid_scope(format!(
            "semester {} outside {}..={}",
            semester,
            SEMESTER_RANGE.start(),
            SEMESTER_RANGE.end()
        )))
    }
}

/// Normalise a batch filter to `YYYY-YYYY` with a four year span.
///
/// Blank input is treated as no filter.
pub fn normalize_batch(batch: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = batch.map(str::trim).filter(|b| !b.is_empty()) else {
        return Ok(None);
    };

    let captures = batch_pattern().captures(raw).ok_or_else(|| {
        AppError::invalid_scope("invalid batch format, use YYYY-YYYY (e.g. 2022-2026)")
    })?;

    let start: i32 = captures[1]
        .parse()
        .map_err(|_| AppError::invalid_scope("invalid batch start year"))?;
    let end: i32 = captures[2]
        .parse()
        .map_err(|_| AppError::invalid_scope("invalid batch end year"))?;

    if end != start + BATCH_SPAN_YEARS {
        return Err(AppError::invalid_scope(format!(
            "invalid batch range {}, expected a {}-year batch",
            raw, BATCH_SPAN_YEARS
        )));
    }

    Ok(Some(format!("{}-{}", start, end)))
}
