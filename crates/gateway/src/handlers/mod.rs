//! API handlers module

pub mod admin;
pub mod analytics;
pub mod export;
pub mod health;
pub mod meta;
pub mod notifications;
pub mod results;
pub mod students;
pub mod upload;

use automarks_common::errors::{AppError, Result};
use automarks_common::ResultScope;
use serde::{Deserialize, Serialize};

/// Cohort filters shared by the analytics endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub batch: Option<String>,
    pub branch: Option<String>,
    pub exam_year: Option<i32>,
    pub exam_month: Option<String>,
}

impl From<ScopeQuery> for ResultScope {
    fn from(query: ScopeQuery) -> Self {
        ResultScope {
            batch: query.batch,
            branch: query.branch,
            exam_year: query.exam_year,
            exam_month: query.exam_month,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Destructive operations need the caller to type the expected word
pub fn require_confirmation(confirm: Option<&str>, expected: &str) -> Result<()> {
    let given = confirm.unwrap_or_default().trim();
    if given.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(AppError::ConfirmationRequired {
            expected: expected.to_string(),
        })
    }
}

/// Validate a `skip`/`limit` pair the way the listing endpoints expect
pub fn page(skip: Option<u64>, limit: Option<u64>, default_limit: u64, max_limit: u64) -> Result<(u64, u64)> {
    let limit = limit.unwrap_or(default_limit);
    if limit == 0 || limit > max_limit {
        return Err(AppError::Validation {
            message: format!("limit must be between 1 and {}", max_limit),
            field: Some("limit".to_string()),
        });
    }
    Ok((skip.unwrap_or(0), limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_confirmation_is_case_insensitive() {
        assert_ok!(require_confirmation(Some(" delete "), "DELETE"));
        assert!(matches!(
            require_confirmation(None, "DELETE_ALL"),
            Err(AppError::ConfirmationRequired { .. })
        ));
        assert_err!(require_confirmation(Some("DELETE"), "DELETE_ALL"));
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page(None, None, 100, 1000).unwrap(), (0, 100));
        assert_eq!(page(Some(20), Some(1000), 100, 1000).unwrap(), (20, 1000));
        assert_err!(page(None, Some(0), 100, 1000));
        assert_err!(page(None, Some(1001), 100, 1000));
    }

    #[test]
    fn test_scope_query_conversion() {
        let scope: ResultScope = ScopeQuery {
            batch: Some("2022-2026".into()),
            exam_year: Some(2024),
            ..Default::default()
        }
        .into();
        assert_eq!(scope.batch.as_deref(), Some("2022-2026"));
        assert_eq!(scope.exam_year, Some(2024));
        assert!(scope.semester.is_none());
    }
}
