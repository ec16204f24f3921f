//! Row providers for the aggregation engine

use automarks_common::db::{Repository, ResultRow};
use automarks_common::errors::Result;
use automarks_common::scope::ResultScope;
use std::cmp::Ordering;

/// Source of joined result rows
#[async_trait::async_trait]
pub trait ResultSource: Send + Sync {
    /// Rows matching `scope`, ordered by USN, semester, exam year, subject code
    async fn fetch_results(&self, scope: &ResultScope) -> Result<Vec<ResultRow>>;

    async fn count_results(&self, scope: &ResultScope) -> Result<u64>;

    async fn student_exists(&self, usn: &str) -> Result<bool>;
}

#[async_trait::async_trait]
impl ResultSource for Repository {
    async fn fetch_results(&self, scope: &ResultScope) -> Result<Vec<ResultRow>> {
        Repository::fetch_results(self, scope).await
    }

    async fn count_results(&self, scope: &ResultScope) -> Result<u64> {
        Repository::count_results(self, scope).await
    }

    async fn student_exists(&self, usn: &str) -> Result<bool> {
        Repository::student_exists(self, usn).await
    }
}

/// In-memory row provider
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<ResultRow>,
}

impl MemoryStore {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        let mut store = Self { rows };
        store.rows.sort_by(store_order);
        store
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
        self.rows.sort_by(store_order);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Same ordering as the SQL store; `None` years sort first
fn store_order(a: &ResultRow, b: &ResultRow) -> Ordering {
    a.usn
        .cmp(&b.usn)
        .then(a.semester.cmp(&b.semester))
        .then(a.exam_year.cmp(&b.exam_year))
        .then(a.subject_code.cmp(&b.subject_code))
        .then(a.result_id.cmp(&b.result_id))
}

#[async_trait::async_trait]
impl ResultSource for MemoryStore {
    async fn fetch_results(&self, scope: &ResultScope) -> Result<Vec<ResultRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| scope.matches(row))
            .cloned()
            .collect())
    }

    async fn count_results(&self, scope: &ResultScope) -> Result<u64> {
        Ok(self.rows.iter().filter(|row| scope.matches(row)).count() as u64)
    }

    async fn student_exists(&self, usn: &str) -> Result<bool> {
        Ok(self.rows.iter().any(|row| row.usn == usn))
    }
}
