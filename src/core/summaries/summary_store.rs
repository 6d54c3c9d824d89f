use super::summary_models::SummaryRecord;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unexpected table header: {0}")]
    BadHeader(String),
    #[error("A summary for '{0}' is already stored")]
    Duplicate(String),
}

/// Append-only table of generated summaries, keyed by source path.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Exact string match on `file_path`; no normalization.
    async fn contains(&self, file_path: &str) -> Result<bool, StoreError>;
    /// Appends a record and persists the whole table.
    async fn append(&self, record: SummaryRecord) -> Result<(), StoreError>;
    async fn records(&self) -> Result<Vec<SummaryRecord>, StoreError>;
}
