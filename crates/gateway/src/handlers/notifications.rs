//! Notification feed handlers

use super::require_confirmation;
use crate::AppState;
use automarks_common::db::models::Notification;
use automarks_common::errors::{AppError, Result};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

const DEFAULT_LIMIT: u64 = 50;
const LIMIT_RANGE: RangeInclusive<u64> = 1..=200;
const CLEAR_ALL_CONFIRMATION: &str = "CLEAR_ALL";

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmQuery {
    pub confirm: Option<String>,
}

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: i32,
    pub title: String,
    pub detail: Option<String>,
    pub level: String,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            title: n.title,
            detail: n.detail,
            level: n.level,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub message: String,
    pub cleared: u64,
}

#[derive(Serialize)]
pub struct ClearedOneResponse {
    pub message: String,
    pub id: i32,
}

/// Uncleared notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NotificationResponse>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !LIMIT_RANGE.contains(&limit) {
        return Err(AppError::Validation {
            message: format!(
                "limit must be between {} and {}",
                LIMIT_RANGE.start(),
                LIMIT_RANGE.end()
            ),
            field: Some("limit".to_string()),
        });
    }

    let notifications = state.repo.list_notifications(limit).await?;
    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

pub async fn clear_all(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<ClearedResponse>> {
    require_confirmation(query.confirm.as_deref(), CLEAR_ALL_CONFIRMATION)?;

    let cleared = state.repo.clear_all_notifications().await?;
    tracing::info!(cleared, "Notifications cleared");

    Ok(Json(ClearedResponse {
        message: "Notifications cleared".to_string(),
        cleared,
    }))
}

pub async fn clear_one(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ClearedOneResponse>> {
    let message = match state.repo.clear_notification(id).await? {
        Some(true) => "Notification cleared",
        Some(false) => "Notification already cleared",
        None => return Err(AppError::not_found("notification", id)),
    };

    Ok(Json(ClearedOneResponse {
        message: message.to_string(),
        id,
    }))
}
