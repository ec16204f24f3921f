//! CSV rendering

use super::ExportTable;
use automarks_common::errors::{AppError, Result};

/// Header line followed by one record per row
pub fn to_csv(table: &ExportTable) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(table.headers()).map_err(csv_error)?;
    for row in &table.rows {
        writer.write_record(row.cells()).map_err(csv_error)?;
    }

    writer.into_inner().map_err(|e| AppError::Export {
        message: format!("Failed to finish CSV: {}", e),
    })
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Export {
        message: format!("CSV write failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::pass;

    #[test]
    fn test_empty_table_is_header_only() {
        let bytes = to_csv(&ExportTable::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "USN,Student Name,Semester,Subject Code,Subject Name,Internal,External,Total,Status,Announced Date\n"
        );
    }

    #[test]
    fn test_quotes_fields_with_commas() {
        let mut row = pass("1SV22AD005", 5, "BCS501", 150);
        row.subject_name = "Software Engineering, Project Management".to_string();

        let bytes = to_csv(&ExportTable::from_rows(&[row])).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let line = text.lines().nth(1).unwrap();
        assert!(line.starts_with("1SV22AD005,Student 1SV22AD005,5,BCS501,\"Software Engineering, Project Management\",37,113,150,P,"));
    }
}
