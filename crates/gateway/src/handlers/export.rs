//! Export download handlers

use crate::AppState;
use automarks_analytics::{export_filename, to_csv, to_xlsx, ExportFormat};
use automarks_common::errors::{AppError, Result};
use automarks_common::metrics::record_export;
use automarks_common::ResultScope;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::time::Instant;

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub semester: Option<i32>,
    pub batch: Option<String>,
    pub branch: Option<String>,
}

impl ExportQuery {
    fn scope(&self) -> ResultScope {
        ResultScope {
            semester: self.semester,
            batch: self.batch.clone(),
            branch: self.branch.clone(),
            ..Default::default()
        }
    }
}

/// Render on the blocking pool
async fn render<F>(render: F) -> Result<Vec<u8>>
where
    F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
{
    tokio::task::spawn_blocking(render)
        .await
        .map_err(|e| AppError::Internal {
            message: format!("export task failed: {}", e),
        })?
}

fn attachment(format: ExportFormat, semester: Option<i32>, bytes: Vec<u8>) -> Response {
    let filename = export_filename(semester, format, chrono::Local::now().naive_local());
    (
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub async fn export_csv(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let started = Instant::now();
    let table = state
        .analyzer
        .export_rows(query.scope(), state.config.export.max_rows)
        .await?;

    let rows = table.len();
    let bytes = render(move || to_csv(&table)).await?;
    record_export(ExportFormat::Csv.extension(), started.elapsed().as_secs_f64());

    tracing::info!(format = "csv", rows, bytes = bytes.len(), "Export generated");
    Ok(attachment(ExportFormat::Csv, query.semester, bytes))
}

/// Workbook with the results sheet, the student view and, for a single
/// semester, subject statistics
pub async fn export_excel(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let started = Instant::now();
    let (table, view, stats) = state
        .analyzer
        .export_workbook(query.scope(), state.config.export.max_rows)
        .await?;

    let rows = table.len();
    let bytes = render(move || to_xlsx(&table, Some(&view), stats.as_deref())).await?;
    record_export(ExportFormat::Xlsx.extension(), started.elapsed().as_secs_f64());

    tracing::info!(format = "xlsx", rows, bytes = bytes.len(), "Export generated");
    Ok(attachment(ExportFormat::Xlsx, query.semester, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_headers() {
        let response = attachment(ExportFormat::Csv, Some(5), b"USN\n".to_vec());
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(disposition.starts_with("attachment; filename=\"results_sem5_"));
        assert!(disposition.ends_with(".csv\""));
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_render_runs_closure() {
        let bytes = render(|| Ok(vec![1, 2, 3])).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
