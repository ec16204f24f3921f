//! Export formatter
//!
//! Scoped result rows become a flat [`ExportTable`] (one row per result) and,
//! for workbooks, a per-student pivot. Both serialise to bytes so the gateway
//! can stream them as downloads.

mod delimited;
mod pivot;
mod workbook;

pub use delimited::to_csv;
pub use pivot::{StudentRecord, StudentView, SubjectCells};
pub use workbook::to_xlsx;

use automarks_common::db::models::ResultStatus;
use automarks_common::db::ResultRow;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

pub const EXPORT_COLUMNS: [&str; 10] = [
    "USN",
    "Student Name",
    "Semester",
    "Subject Code",
    "Subject Name",
    "Internal",
    "External",
    "Total",
    "Status",
    "Announced Date",
];

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// `results_sem{N|all}_{YYYYMMDD_HHMMSS}.{ext}`
pub fn export_filename(semester: Option<i32>, format: ExportFormat, at: NaiveDateTime) -> String {
    let semester = semester.map_or_else(|| "all".to_string(), |s| s.to_string());
    format!(
        "results_sem{}_{}.{}",
        semester,
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub usn: String,
    pub student_name: String,
    pub semester: i32,
    pub subject_code: String,
    pub subject_name: String,
    pub internal: Option<i32>,
    pub external: Option<i32>,
    pub total: Option<i32>,
    pub status: ResultStatus,
    pub announced_date: Option<NaiveDate>,
}

impl ExportRow {
    /// Cell text in `EXPORT_COLUMNS` order; missing values are empty
    pub fn cells(&self) -> [String; 10] {
        [
            self.usn.clone(),
            self.student_name.clone(),
            self.semester.to_string(),
            self.subject_code.clone(),
            self.subject_name.clone(),
            optional(self.internal),
            optional(self.external),
            optional(self.total),
            self.status.code().unwrap_or_default().to_string(),
            self.announced_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        ]
    }

    pub fn is_fail(&self) -> bool {
        self.status == ResultStatus::Fail
    }
}

fn optional(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl From<&ResultRow> for ExportRow {
    fn from(row: &ResultRow) -> Self {
        Self {
            usn: row.usn.clone(),
            student_name: row.student_name.clone(),
            semester: row.semester,
            subject_code: row.subject_code.clone(),
            subject_name: row.subject_name.clone(),
            internal: row.internal_marks,
            external: row.external_marks,
            total: row.total_marks,
            status: row.status,
            announced_date: row.announced_date,
        }
    }
}

/// Flat result table in store order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportTable {
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    pub fn from_rows(rows: &[ResultRow]) -> Self {
        Self {
            rows: rows.iter().map(ExportRow::from).collect(),
        }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        &EXPORT_COLUMNS
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{pass, row};

    #[test]
    fn test_export_filename() {
        let at = NaiveDate::from_ymd_opt(2025, 1, 31)
            .and_then(|d| d.and_hms_opt(9, 5, 7))
            .unwrap();
        assert_eq!(
            export_filename(Some(5), ExportFormat::Csv, at),
            "results_sem5_20250131_090507.csv"
        );
        assert_eq!(
            export_filename(None, ExportFormat::Xlsx, at),
            "results_semall_20250131_090507.xlsx"
        );
    }

    #[test]
    fn test_format_labels() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::Xlsx.extension(), "xlsx");
        assert!(ExportFormat::Csv.content_type().starts_with("text/csv"));
        assert!(ExportFormat::Xlsx.content_type().contains("spreadsheetml"));
    }

    #[test]
    fn test_cells_render_missing_as_empty() {
        let mut absent = row("1SV22AD005", 5, "BCS501", None, ResultStatus::Other);
        absent.announced_date = NaiveDate::from_ymd_opt(2024, 2, 9);
        let cells = ExportRow::from(&absent).cells();
        assert_eq!(cells[5], "");
        assert_eq!(cells[7], "");
        assert_eq!(cells[8], "");
        assert_eq!(cells[9], "2024-02-09");

        let passed = ExportRow::from(&pass("1SV22AD005", 5, "BCS502", 150));
        assert_eq!(passed.cells()[7], "150");
        assert_eq!(passed.cells()[8], "P");
    }

    #[test]
    fn test_table_preserves_order() {
        let rows = vec![
            pass("1SV22AD001", 5, "BCS501", 150),
            pass("1SV22AD001", 5, "BCS502", 140),
            pass("1SV22AD002", 5, "BCS501", 130),
        ];
        let table = ExportTable::from_rows(&rows);
        let order: Vec<(&str, &str)> = table
            .rows
            .iter()
            .map(|r| (r.usn.as_str(), r.subject_code.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("1SV22AD001", "BCS501"),
                ("1SV22AD001", "BCS502"),
                ("1SV22AD002", "BCS501")
            ]
        );
    }
}
