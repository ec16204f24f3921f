//! AutoMarks Analytics
//!
//! Turns joined result rows into semester summaries, subject statistics,
//! failure analysis, SGPA/CGPA progression, ranked performer lists and
//! CSV/XLSX exports.
//!
//! All aggregations are pure functions over `&[ResultRow]`; [`Analyzer`]
//! wraps them with scope validation, a single fetch through [`ResultSource`],
//! metrics and logging.

pub mod engine;
pub mod export;
pub mod failures;
pub mod gpa;
pub mod grading;
pub mod overview;
pub mod performers;
pub mod stats;
pub mod store;
pub mod subjects;
pub mod summary;

#[cfg(test)]
mod fixtures;

pub use engine::Analyzer;
pub use export::{export_filename, to_csv, to_xlsx, ExportFormat, ExportTable, StudentView};
pub use failures::FailureAnalysis;
pub use gpa::{SemesterGpa, StudentSgpa};
pub use grading::GradingPolicy;
pub use overview::{OverallStatistics, SemesterOverview};
pub use performers::{RankBy, TopPerformer};
pub use store::{MemoryStore, ResultSource};
pub use subjects::SubjectStatistics;
pub use summary::SemesterSummary;
