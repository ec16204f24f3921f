//! Dashboard metadata: branches, batches, subjects and credits

use crate::AppState;
use automarks_common::db::models::Subject;
use automarks_common::db::{CreditUpdate, CreditUpdateReport};
use automarks_common::errors::Result;
use automarks_common::scope::normalize_batch;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Default, Deserialize)]
pub struct BranchQuery {
    pub batch: Option<String>,
}

#[derive(Serialize)]
pub struct SubjectResponse {
    pub code: String,
    pub name: String,
    pub credits: Option<i32>,
}

impl From<Subject> for SubjectResponse {
    fn from(subject: Subject) -> Self {
        Self {
            code: subject.subject_code,
            name: subject.subject_name,
            credits: subject.credits,
        }
    }
}

/// One requested credit change. `credits` may be a number, a numeric string,
/// an empty string or null.
#[derive(Debug, Deserialize)]
pub struct CreditItem {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub credits: Value,
}

/// `Ok(None)` resets to the default credits, `Err(())` is an unusable value
fn parse_credits(value: &Value) -> std::result::Result<Option<i32>, ()> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse().map(Some).map_err(|_| ()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or(()),
        _ => Err(()),
    }
}

/// Split request items into store updates and codes rejected up front
fn credit_updates(items: Vec<CreditItem>) -> (Vec<CreditUpdate>, Vec<String>) {
    let mut updates = Vec::new();
    let mut invalid = Vec::new();

    for item in items {
        let code = item.code.unwrap_or_default().trim().to_string();
        if code.is_empty() {
            continue;
        }
        match parse_credits(&item.credits) {
            Ok(credits) => updates.push(CreditUpdate { code, credits }),
            Err(()) => invalid.push(code),
        }
    }

    (updates, invalid)
}

/// Distinct batches after normalisation; malformed stored values are skipped
fn normalize_batches(raw: Vec<String>) -> Vec<String> {
    let mut batches = BTreeSet::new();
    for value in raw {
        match normalize_batch(Some(&value)) {
            Ok(Some(batch)) => {
                batches.insert(batch);
            }
            Ok(None) => {}
            Err(_) => tracing::warn!(batch = %value, "Ignoring malformed stored batch"),
        }
    }
    batches.into_iter().collect()
}

pub async fn branches(
    State(state): State<AppState>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<Vec<String>>> {
    let batch = normalize_batch(query.batch.as_deref())?;
    let branches = state.repo.list_branches(batch.as_deref()).await?;
    Ok(Json(branches))
}

pub async fn batches(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let raw = state.repo.list_batches().await?;
    Ok(Json(normalize_batches(raw)))
}

pub async fn subjects(State(state): State<AppState>) -> Result<Json<Vec<SubjectResponse>>> {
    let subjects = state.repo.list_subjects().await?;
    Ok(Json(subjects.into_iter().map(SubjectResponse::from).collect()))
}

/// Bulk credit update. Credits of 0 exclude a subject from GPA.
pub async fn update_credits(
    State(state): State<AppState>,
    Json(items): Json<Vec<CreditItem>>,
) -> Result<Json<CreditUpdateReport>> {
    let (updates, invalid) = credit_updates(items);

    let mut report = state.repo.update_subject_credits(&updates).await?;
    report.invalid.extend(invalid);

    tracing::info!(
        updated = report.updated,
        missing = report.missing.len(),
        invalid = report.invalid.len(),
        "Subject credits updated"
    );
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_credits() {
        assert_eq!(parse_credits(&json!(4)), Ok(Some(4)));
        assert_eq!(parse_credits(&json!("3")), Ok(Some(3)));
        assert_eq!(parse_credits(&json!("")), Ok(None));
        assert_eq!(parse_credits(&Value::Null), Ok(None));
        assert!(parse_credits(&json!("four")).is_err());
        assert!(parse_credits(&json!(2.5)).is_err());
    }

    #[test]
    fn test_credit_updates_split() {
        let items: Vec<CreditItem> = serde_json::from_value(json!([
            {"code": "BCS501", "credits": 4},
            {"code": " ", "credits": 3},
            {"code": "BCS502", "credits": "x"},
            {"code": "BCS503"}
        ]))
        .unwrap();

        let (updates, invalid) = credit_updates(items);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].credits, None);
        assert_eq!(invalid, vec!["BCS502"]);
    }

    #[test]
    fn test_batches_deduplicated() {
        let batches = normalize_batches(vec![
            "2022-2026".into(),
            " 2022-2026".into(),
            "2021-2025".into(),
            "2022-23".into(),
        ]);
        assert_eq!(batches, vec!["2021-2025", "2022-2026"]);
    }
}
