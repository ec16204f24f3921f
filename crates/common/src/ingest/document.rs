//! Extracted result documents and their normalised form

use crate::db::models::ResultStatus;
use crate::errors::{AppError, Result};
use chrono::NaiveDate;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::OnceLock;
use tracing::warn;
use validator::Validate;

pub const INTERNAL_MARKS_RANGE: RangeInclusive<i32> = 0..=50;
pub const EXTERNAL_MARKS_RANGE: RangeInclusive<i32> = 0..=100;
pub const TOTAL_MARKS_RANGE: RangeInclusive<i32> = 0..=200;

const ANNOUNCED_DATE_FORMAT: &str = "%Y-%m-%d";

/// Title words the extractor sometimes glues a stray capital onto
const GLUED_TITLE_WORDS: &str = "INTRODUCTION|PRINCIPLES|FUNDAMENTALS|ENGINEERING|MATHEMATICS|PHYSICS|CHEMISTRY|PROGRAMMING|COMPUTER|DIGITAL|DATA|DESIGN|ANALYSIS|NETWORKS|SYSTEMS|ELECTRONICS";

fn usn_branch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d[A-Z]{2,3}\d{2}([A-Z]{2,3})\d{3,}$").expect("static regex"))
}

fn glued_title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!("(?i)^[A-Z]({})", GLUED_TITLE_WORDS)).expect("static regex")
    })
}

/// One student's semester result as produced by the PDF extractor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtractedStudentResult {
    #[validate(length(min = 1, max = 20))]
    pub usn: String,

    #[validate(length(min = 1, max = 255))]
    pub student_name: String,

    #[validate(range(min = 1, max = 8))]
    pub semester: i32,

    #[serde(default)]
    pub exam_month: Option<String>,

    #[serde(default)]
    #[validate(range(min = 2000, max = 2100))]
    pub exam_year: Option<i32>,

    #[serde(default)]
    pub subjects: Vec<ExtractedSubjectResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSubjectResult {
    pub subject_code: String,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub internal_marks: Option<i32>,
    #[serde(default)]
    pub external_marks: Option<i32>,
    #[serde(default)]
    pub total_marks: Option<i32>,
    #[serde(default)]
    pub result_status: Option<String>,
    #[serde(default)]
    pub announced_date: Option<String>,
}

/// A validated document ready to be written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct StudentDocument {
    pub usn: String,
    pub student_name: String,
    pub branch: Option<String>,
    pub semester: i32,
    pub exam_month: Option<String>,
    pub exam_year: Option<i32>,
    pub subjects: Vec<SubjectEntry>,
    /// Subjects dropped because their code normalised to nothing
    pub skipped_subjects: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectEntry {
    pub subject_code: String,
    pub subject_name: String,
    pub internal_marks: Option<i32>,
    pub external_marks: Option<i32>,
    pub total_marks: Option<i32>,
    /// `None` when the extractor reported no status
    pub status: Option<ResultStatus>,
    pub announced_date: Option<NaiveDate>,
}

impl StudentDocument {
    pub fn from_extracted(doc: ExtractedStudentResult) -> Result<Self> {
        doc.validate()?;

        let usn = doc.usn.trim().to_ascii_uppercase();
        if usn.is_empty() {
            return Err(AppError::Validation {
                message: "usn must not be blank".to_string(),
                field: Some("usn".to_string()),
            });
        }

        let student_name = collapse_whitespace(&doc.student_name);
        let mut subjects = Vec::with_capacity(doc.subjects.len());
        let mut skipped_subjects = 0;

        for subject in doc.subjects {
            match SubjectEntry::normalize(&usn, subject) {
                Some(entry) => subjects.push(entry),
                None => skipped_subjects += 1,
            }
        }

        Ok(Self {
            branch: branch_from_usn(&usn),
            usn,
            student_name,
            semester: doc.semester,
            exam_month: doc
                .exam_month
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            exam_year: doc.exam_year,
            subjects,
            skipped_subjects,
        })
    }
}

impl SubjectEntry {
    fn normalize(usn: &str, raw: ExtractedSubjectResult) -> Option<Self> {
        let subject_code = normalize_subject_code(&raw.subject_code)?;
        let subject_name = normalize_subject_name(&raw.subject_name).unwrap_or_else(|| subject_code.clone());

        let announced_date = raw.announced_date.as_deref().and_then(|value| {
            let parsed = NaiveDate::parse_from_str(value.trim(), ANNOUNCED_DATE_FORMAT).ok();
            if parsed.is_none() {
                warn!(usn, subject = %subject_code, value, "Ignoring unparseable announced date");
            }
            parsed
        });

        Some(Self {
            internal_marks: checked_marks(usn, &subject_code, "internal", raw.internal_marks, &INTERNAL_MARKS_RANGE),
            external_marks: checked_marks(usn, &subject_code, "external", raw.external_marks, &EXTERNAL_MARKS_RANGE),
            total_marks: checked_marks(usn, &subject_code, "total", raw.total_marks, &TOTAL_MARKS_RANGE),
            status: raw
                .result_status
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(ResultStatus::parse),
            announced_date,
            subject_code,
            subject_name,
        })
    }
}

fn checked_marks(
    usn: &str,
    subject: &str,
    kind: &'static str,
    value: Option<i32>,
    range: &RangeInclusive<i32>,
) -> Option<i32> {
    let value = value?;
    if range.contains(&value) {
        Some(value)
    } else {
        warn!(usn, subject, kind, value, "Dropping out-of-range marks");
        None
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-case and keep alphanumerics only; `None` when nothing is left
pub fn normalize_subject_code(code: &str) -> Option<String> {
    let code: String = code
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!code.is_empty()).then_some(code)
}

/// Collapse whitespace and strip a stray capital glued to a common title word
pub fn normalize_subject_name(name: &str) -> Option<String> {
    let mut name = collapse_whitespace(name);
    if name.len() >= 10 && glued_title_pattern().is_match(&name) {
        name = name[1..].trim_start().to_string();
    }
    (!name.is_empty()).then_some(name)
}

/// Branch code embedded in a VTU USN, e.g. `1SV22AD005` -> `AD`
pub fn branch_from_usn(usn: &str) -> Option<String> {
    let usn = usn.trim().to_ascii_uppercase();
    usn_branch_pattern()
        .captures(&usn)
        .map(|captures| captures[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(code: &str, name: &str) -> ExtractedSubjectResult {
        ExtractedSubjectResult {
            subject_code: code.into(),
            subject_name: name.into(),
            internal_marks: Some(40),
            external_marks: Some(72),
            total_marks: Some(112),
            result_status: Some("PASS".into()),
            announced_date: Some("2024-02-09".into()),
        }
    }

    fn document(subjects: Vec<ExtractedSubjectResult>) -> ExtractedStudentResult {
        ExtractedStudentResult {
            usn: " 1sv22ad005 ".into(),
            student_name: "ASHA   K".into(),
            semester: 5,
            exam_month: Some("December".into()),
            exam_year: Some(2024),
            subjects,
        }
    }

    #[test]
    fn test_branch_from_usn() {
        assert_eq!(branch_from_usn("1SV22AD005").as_deref(), Some("AD"));
        assert_eq!(branch_from_usn("1sv24ai037").as_deref(), Some("AI"));
        assert_eq!(branch_from_usn("ABC"), None);
    }

    #[test]
    fn test_subject_code_and_name() {
        assert_eq!(normalize_subject_code(" bcs-501 ").as_deref(), Some("BCS501"));
        assert_eq!(normalize_subject_code(" - "), None);
        assert_eq!(
            normalize_subject_name("DINTRODUCTION  TO   AI").as_deref(),
            Some("INTRODUCTION TO AI")
        );
        assert_eq!(normalize_subject_name("   "), None);
    }

    #[test]
    fn test_document_normalisation() {
        let mut bad_marks = subject("BCS502", "");
        bad_marks.internal_marks = Some(75);
        bad_marks.result_status = None;
        bad_marks.announced_date = Some("09/02/2024".into());

        let doc = StudentDocument::from_extracted(document(vec![
            subject("bcs501", "Software  Engineering"),
            bad_marks,
            subject("--", "Nothing"),
        ]))
        .unwrap();

        assert_eq!(doc.usn, "1SV22AD005");
        assert_eq!(doc.branch.as_deref(), Some("AD"));
        assert_eq!(doc.student_name, "ASHA K");
        assert_eq!(doc.skipped_subjects, 1);
        assert_eq!(doc.subjects.len(), 2);

        let first = &doc.subjects[0];
        assert_eq!(first.subject_code, "BCS501");
        assert_eq!(first.subject_name, "Software Engineering");
        assert_eq!(first.status, Some(ResultStatus::Pass));
        assert_eq!(first.announced_date, NaiveDate::from_ymd_opt(2024, 2, 9));

        let second = &doc.subjects[1];
        assert_eq!(second.subject_name, "BCS502");
        assert_eq!(second.internal_marks, None);
        assert_eq!(second.total_marks, Some(112));
        assert_eq!(second.status, None);
        assert_eq!(second.announced_date, None);
    }

    #[test]
    fn test_invalid_semester_rejected() {
        let mut doc = document(vec![]);
        doc.semester = 9;
        assert!(matches!(
            StudentDocument::from_extracted(doc),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_deserialize_minimal_document() {
        let json = r#"{"usn":"1SV22AD005","student_name":"Asha","semester":3,
            "subjects":[{"subject_code":"BCS301","total_marks":120,"result_status":"P"}]}"#;
        let doc: ExtractedStudentResult = serde_json::from_str(json).unwrap();
        assert_eq!(doc.subjects[0].subject_name, "");
        assert_eq!(doc.exam_year, None);
    }
}
