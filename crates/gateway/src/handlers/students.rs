//! Student lookup handlers

use super::{page, MessageResponse};
use crate::AppState;
use automarks_common::db::models::Student;
use automarks_common::errors::{AppError, Result};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListStudentsQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct StudentResponse {
    pub id: i32,
    pub usn: String,
    pub student_name: String,
    pub batch: Option<String>,
    pub branch: Option<String>,
    pub created_at: String,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            usn: student.usn,
            student_name: student.student_name,
            batch: student.batch,
            branch: student.branch,
            created_at: student.created_at.to_rfc3339(),
        }
    }
}

fn canonical_usn(usn: &str) -> Result<String> {
    let usn = usn.trim().to_ascii_uppercase();
    if usn.is_empty() {
        return Err(AppError::invalid_scope("usn must not be empty"));
    }
    Ok(usn)
}

/// Students ordered by USN
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<ListStudentsQuery>,
) -> Result<Json<Vec<StudentResponse>>> {
    let (skip, limit) = page(query.skip, query.limit, DEFAULT_LIMIT, MAX_LIMIT)?;
    let students = state.repo.list_students(skip, limit).await?;
    Ok(Json(students.into_iter().map(StudentResponse::from).collect()))
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(usn): Path<String>,
) -> Result<Json<StudentResponse>> {
    let usn = canonical_usn(&usn)?;
    let student = state
        .repo
        .find_student(&usn)
        .await?
        .ok_or(AppError::StudentNotFound { usn })?;
    Ok(Json(student.into()))
}

/// Delete a student together with all of their results
pub async fn delete_student(
    State(state): State<AppState>,
    Path(usn): Path<String>,
) -> Result<Json<MessageResponse>> {
    let usn = canonical_usn(&usn)?;
    if !state.repo.delete_student(&usn).await? {
        return Err(AppError::StudentNotFound { usn });
    }

    tracing::info!(usn = %usn, "Student deleted");
    Ok(Json(MessageResponse::new(
        "Student and all associated results deleted successfully",
    )))
}
