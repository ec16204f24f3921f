//! Result entity: one row per (student, semester, subject)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single subject attempt.
///
/// Stored as the short codes printed on result sheets. Anything that does not
/// map to a known outcome becomes `Other`, so it is never counted as a pass or
/// a fail by accident.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStatus {
    #[serde(rename = "P")]
    Pass,
    #[serde(rename = "F")]
    Fail,
    #[serde(rename = "A")]
    Absent,
    #[serde(rename = "W")]
    Withheld,
    #[serde(rename = "NE")]
    NotEligible,
    #[serde(rename = "OTHER")]
    Other,
}

impl ResultStatus {
    /// Parse a stored code or a long-form label (`PASS`, `Not Eligible`, ...)
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "P" | "PASS" => ResultStatus::Pass,
            "F" | "FAIL" => ResultStatus::Fail,
            "A" | "AB" | "ABSENT" => ResultStatus::Absent,
            "W" | "WITHHELD" => ResultStatus::Withheld,
            "X" | "NE" | "NOT_ELIGIBLE" | "NOT_ELIGIBLE_X" | "NOT_ELIGIBLE_NE" => {
                ResultStatus::NotEligible
            }
            _ => ResultStatus::Other,
        }
    }

    /// Interpret a nullable database column
    pub fn from_column(raw: Option<&str>) -> Self {
        raw.map(ResultStatus::parse).unwrap_or(ResultStatus::Other)
    }

    /// Storage code, `None` for `Other`
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ResultStatus::Pass => Some("P"),
            ResultStatus::Fail => Some("F"),
            ResultStatus::Absent => Some("A"),
            ResultStatus::Withheld => Some("W"),
            ResultStatus::NotEligible => Some("NE"),
            ResultStatus::Other => None,
        }
    }

    /// Codes accepted in storage for this status (legacy rows may hold long forms)
    pub fn stored_variants(&self) -> &'static [&'static str] {
        match self {
            ResultStatus::Pass => &["P", "PASS"],
            ResultStatus::Fail => &["F", "FAIL"],
            ResultStatus::Absent => &["A", "AB", "ABSENT"],
            ResultStatus::Withheld => &["W", "WITHHELD"],
            ResultStatus::NotEligible => &["NE", "X"],
            ResultStatus::Other => &[],
        }
    }

    /// Outcomes that forfeit grade points regardless of marks
    pub fn forfeits_grade(&self) -> bool {
        matches!(
            self,
            ResultStatus::Fail | ResultStatus::Absent | ResultStatus::Withheld | ResultStatus::NotEligible
        )
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().unwrap_or("OTHER"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub student_id: i32,

    pub semester_id: i32,

    pub subject_id: i32,

    /// 0..=50
    pub internal_marks: Option<i32>,

    /// 0..=100
    pub external_marks: Option<i32>,

    /// 0..=200
    pub total_marks: Option<i32>,

    /// Upload batch that last wrote this row
    pub upload_batch_id: Option<String>,

    pub result_status: Option<String>,

    pub announced_date: Option<Date>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn status(&self) -> ResultStatus {
        ResultStatus::from_column(self.result_status.as_deref())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id",
        on_delete = "Cascade"
    )]
    Student,

    #[sea_orm(
        belongs_to = "super::semester::Entity",
        from = "Column::SemesterId",
        to = "super::semester::Column::Id",
        on_delete = "Cascade"
    )]
    Semester,

    #[sea_orm(
        belongs_to = "super::subject::Entity",
        from = "Column::SubjectId",
        to = "super::subject::Column::Id",
        on_delete = "Cascade"
    )]
    Subject,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::semester::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Semester.def()
    }
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
