//! XLSX rendering

use super::{ExportRow, ExportTable, StudentRecord, StudentView};
use crate::subjects::SubjectStatistics;
use automarks_common::errors::{AppError, Result};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};

const MAX_COLUMN_WIDTH: usize = 50;

const STATISTICS_COLUMNS: [&str; 11] = [
    "subject_code",
    "subject_name",
    "total_students",
    "avg_internal",
    "avg_external",
    "avg_total",
    "max_marks",
    "min_marks",
    "pass_count",
    "fail_count",
    "pass_percentage",
];

enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Cell::Empty, Cell::text)
    }

    fn number(value: impl Into<f64>) -> Self {
        Cell::Number(value.into())
    }

    fn opt_number<T: Into<f64>>(value: Option<T>) -> Self {
        value.map_or(Cell::Empty, Cell::number)
    }

    fn width(&self) -> usize {
        match self {
            Cell::Text(s) => s.chars().count(),
            Cell::Number(n) => n.to_string().len(),
            Cell::Empty => 0,
        }
    }
}

/// Writes rows while tracking the widest cell per column
struct SheetWriter<'a> {
    sheet: &'a mut Worksheet,
    widths: Vec<usize>,
    next_row: u32,
}

impl<'a> SheetWriter<'a> {
    fn new(sheet: &'a mut Worksheet, headers: &[String], header_format: &Format) -> Result<Self> {
        let mut writer = Self {
            sheet,
            widths: vec![0; headers.len()],
            next_row: 0,
        };
        let cells: Vec<Cell> = headers.iter().map(Cell::text).collect();
        writer.write_row(&cells, Some(header_format))?;
        writer.sheet.set_freeze_panes(1, 0).map_err(xlsx_error)?;
        Ok(writer)
    }

    fn write_row(&mut self, cells: &[Cell], format: Option<&Format>) -> Result<()> {
        let row = self.next_row;
        for (col, cell) in cells.iter().enumerate() {
            if col >= self.widths.len() {
                self.widths.push(0);
            }
            self.widths[col] = self.widths[col].max(cell.width());

            let col = col as u16;
            match (cell, format) {
                (Cell::Text(s), Some(f)) => self.sheet.write_string_with_format(row, col, s, f),
                (Cell::Text(s), None) => self.sheet.write_string(row, col, s),
                (Cell::Number(n), Some(f)) => self.sheet.write_number_with_format(row, col, *n, f),
                (Cell::Number(n), None) => self.sheet.write_number(row, col, *n),
                (Cell::Empty, Some(f)) => self.sheet.write_blank(row, col, f),
                (Cell::Empty, None) => continue,
            }
            .map_err(xlsx_error)?;
        }
        self.next_row += 1;
        Ok(())
    }

    /// Fit columns to content, capped at 50 characters
    fn finish(self) -> Result<()> {
        for (col, width) in self.widths.iter().enumerate() {
            let width = (width + 2).min(MAX_COLUMN_WIDTH);
            self.sheet
                .set_column_width(col as u16, width as f64)
                .map_err(xlsx_error)?;
        }
        Ok(())
    }
}

fn xlsx_error(e: XlsxError) -> AppError {
    AppError::Export {
        message: format!("XLSX write failed: {}", e),
    }
}

fn result_cells(row: &ExportRow) -> Vec<Cell> {
    vec![
        Cell::text(&row.usn),
        Cell::text(&row.student_name),
        Cell::number(row.semester),
        Cell::text(&row.subject_code),
        Cell::text(&row.subject_name),
        Cell::opt_number(row.internal),
        Cell::opt_number(row.external),
        Cell::opt_number(row.total),
        Cell::opt_text(row.status.code()),
        Cell::opt_text(
            row.announced_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .as_deref(),
        ),
    ]
}

fn student_cells(view: &StudentView, record: &StudentRecord) -> Vec<Cell> {
    let mut cells = vec![
        Cell::text(&record.usn),
        Cell::text(&record.student_name),
        Cell::opt_text(record.batch.as_deref()),
        Cell::opt_text(record.branch.as_deref()),
        Cell::number(record.semester),
        Cell::opt_text(record.exam_month.as_deref()),
        Cell::opt_number(record.exam_year),
    ];

    for code in &view.subject_codes {
        match record.subjects.get(code) {
            Some(subject) => {
                cells.push(Cell::opt_number(subject.internal));
                cells.push(Cell::opt_number(subject.external));
                cells.push(Cell::opt_number(subject.total));
                cells.push(Cell::opt_text(subject.status.and_then(|s| s.code())));
            }
            None => cells.extend([Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty]),
        }
    }

    cells.push(Cell::number(record.total_marks as f64));
    cells.push(Cell::opt_number(record.average_marks));
    cells.push(Cell::number(record.subjects_passed as f64));
    cells.push(Cell::number(record.subjects_failed as f64));
    cells.push(Cell::number(record.total_subjects as f64));
    cells.push(Cell::opt_number(record.sgpa));
    cells
}

fn statistics_cells(stat: &SubjectStatistics) -> Vec<Cell> {
    vec![
        Cell::text(&stat.subject_code),
        Cell::text(&stat.subject_name),
        Cell::number(stat.total_students as f64),
        Cell::opt_number(stat.avg_internal),
        Cell::opt_number(stat.avg_external),
        Cell::opt_number(stat.avg_total),
        Cell::opt_number(stat.max_marks),
        Cell::opt_number(stat.min_marks),
        Cell::number(stat.pass_count as f64),
        Cell::number(stat.fail_count as f64),
        Cell::number(stat.pass_percentage),
    ]
}

/// Workbook with a `Results` sheet, an optional `Student View` pivot and,
/// when given, a `Subject Statistics` sheet. Failing rows are highlighted.
pub fn to_xlsx(
    table: &ExportTable,
    student_view: Option<&StudentView>,
    statistics: Option<&[SubjectStatistics]>,
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let failed = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0xDC2626))
        .set_background_color(Color::RGB(0xFFE6E6));

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Results").map_err(xlsx_error)?;
        let headers: Vec<String> = table.headers().iter().map(|h| h.to_string()).collect();
        let mut writer = SheetWriter::new(sheet, &headers, &header)?;
        for row in &table.rows {
            let format = row.is_fail().then_some(&failed);
            writer.write_row(&result_cells(row), format)?;
        }
        writer.finish()?;
    }

    if let Some(view) = student_view {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Student View").map_err(xlsx_error)?;
        let mut writer = SheetWriter::new(sheet, &view.headers(), &header)?;
        for record in &view.records {
            let format = (record.subjects_failed > 0).then_some(&failed);
            writer.write_row(&student_cells(view, record), format)?;
        }
        writer.finish()?;
    }

    if let Some(statistics) = statistics {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Subject Statistics").map_err(xlsx_error)?;
        let headers: Vec<String> = STATISTICS_COLUMNS.iter().map(|h| h.to_string()).collect();
        let mut writer = SheetWriter::new(sheet, &headers, &header)?;
        for stat in statistics {
            writer.write_row(&statistics_cells(stat), None)?;
        }
        writer.finish()?;
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, pass};
    use crate::grading::GradingPolicy;
    use crate::subjects::subject_statistics;

    #[test]
    fn test_empty_workbook_still_renders() {
        let bytes = to_xlsx(&ExportTable::default(), None, None).unwrap();
        // XLSX is a zip archive
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_workbook_with_all_sheets() {
        let rows = vec![
            pass("1SV22AD001", 5, "BCS501", 150),
            fail("1SV22AD001", 5, "BCS502", 60),
            pass("1SV22AD002", 5, "BCS501", 120),
        ];
        let table = ExportTable::from_rows(&rows);
        let view = StudentView::from_rows(&GradingPolicy::default(), &rows);
        let stats = subject_statistics(&rows);

        let bytes = to_xlsx(&table, Some(&view), Some(&stats)).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_column_width_capped() {
        let long = Cell::text("x".repeat(80));
        assert_eq!(long.width(), 80);
        assert_eq!((long.width() + 2).min(MAX_COLUMN_WIDTH), 50);
        assert_eq!(Cell::opt_number(None::<i32>).width(), 0);
    }
}
