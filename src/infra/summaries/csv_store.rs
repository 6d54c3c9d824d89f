use crate::core::summaries::{StoreError, SummaryRecord, SummaryStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const HEADER: [&str; 2] = ["file_path", "summary"];

/// CSV-backed summary table. The whole file is loaded on open and rewritten on every append.
pub struct CsvSummaryStore {
    path: PathBuf,
    cache: RwLock<Vec<SummaryRecord>>,
}

impl CsvSummaryStore {
    /// Opens the table, creating it with only a header row if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = if path.exists() {
            read_table(&path)?
        } else {
            write_table(&path, &[])?;
            tracing::info!("Created summary table at {}", path.display());
            Vec::new()
        };

        Ok(Self {
            path,
            cache: RwLock::new(records),
        })
    }

}

fn read_table(path: &Path) -> Result<Vec<SummaryRecord>, StoreError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    let matches = headers.len() == HEADER.len()
        && headers.iter().zip(HEADER).all(|(found, expected)| found.trim() == expected);
    if !matches {
        return Err(StoreError::BadHeader(headers.iter().collect::<Vec<_>>().join(",")));
    }

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: SummaryRecord = row?;
        records.push(record);
    }
    Ok(records)
}

/// Writes to a sibling temp file and renames it over the table so a crash never
/// leaves a half-written file behind.
fn write_table(path: &Path, records: &[SummaryRecord]) -> Result<(), StoreError> {
    let tmp_path = temp_path_for(path);
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp_path)?;
        writer.write_record(HEADER)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "summaries.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl SummaryStore for CsvSummaryStore {
    async fn contains(&self, file_path: &str) -> Result<bool, StoreError> {
        let cache = self.cache.read().await;
        Ok(cache.iter().any(|r| r.file_path == file_path))
    }

    async fn append(&self, record: SummaryRecord) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        if cache.iter().any(|r| r.file_path == record.file_path) {
            return Err(StoreError::Duplicate(record.file_path));
        }
        cache.push(record);

        // The row only counts as stored once it is on disk.
        if let Err(e) = write_table(&self.path, &cache) {
            cache.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn records(&self) -> Result<Vec<SummaryRecord>, StoreError> {
        let cache = self.cache.read().await;
        Ok(cache.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(path: &str, summary: &str) -> SummaryRecord {
        SummaryRecord {
            file_path: path.to_string(),
            summary: summary.to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_header_only_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summaries.csv");

        let store = CsvSummaryStore::open(&path).unwrap();

        assert!(store.records().await.unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "file_path,summary\n");
    }

    #[tokio::test]
    async fn test_multiline_summary_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summaries.csv");
        let summary = "Graded components: Midterm, \"final\".\n\nTo get a good grade:\n*   Start early.";

        let store = CsvSummaryStore::open(&path).unwrap();
        store.append(record("/evals/a.pdf", summary)).await.unwrap();
        store.append(record("/evals/b.pdf", "short")).await.unwrap();

        let reloaded = CsvSummaryStore::open(&path).unwrap();
        let records = reloaded.records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record("/evals/a.pdf", summary));
        assert!(reloaded.contains("/evals/b.pdf").await.unwrap());
        assert!(!reloaded.contains("/evals/B.pdf").await.unwrap());
        assert!(!path.with_file_name("summaries.csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_duplicate_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = CsvSummaryStore::open(dir.path().join("s.csv")).unwrap();

        store.append(record("a.pdf", "one")).await.unwrap();
        let second = store.append(record("a.pdf", "two")).await;

        assert!(matches!(second, Err(StoreError::Duplicate(_))));
        assert_eq!(store.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reads_table_written_by_other_tools() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.csv");
        std::fs::write(
            &path,
            "file_path,summary\n/vals/x.pdf,\"\"\"line one\rline two\"\"\"\n",
        )
        .unwrap();

        let store = CsvSummaryStore::open(&path).unwrap();
        let records = store.records().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "\"line one\rline two\"");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_record_unstored() {
        let dir = TempDir::new().unwrap();
        let table_dir = dir.path().join("out");
        std::fs::create_dir(&table_dir).unwrap();
        let store = CsvSummaryStore::open(table_dir.join("s.csv")).unwrap();
        store.append(record("a.pdf", "one")).await.unwrap();

        std::fs::remove_dir_all(&table_dir).unwrap();
        assert!(store.append(record("b.pdf", "two")).await.is_err());
        assert!(!store.contains("b.pdf").await.unwrap());

        // Once the directory is back, the next append must not carry the failed row along.
        std::fs::create_dir(&table_dir).unwrap();
        store.append(record("c.pdf", "three")).await.unwrap();
        let reloaded = CsvSummaryStore::open(table_dir.join("s.csv")).unwrap();
        let paths: Vec<String> = reloaded
            .records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.file_path)
            .collect();
        assert_eq!(paths, vec!["a.pdf".to_string(), "c.pdf".to_string()]);
    }

    #[test]
    fn test_unexpected_header_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "path,text\n").unwrap();

        assert!(matches!(
            CsvSummaryStore::open(&path),
            Err(StoreError::BadHeader(_))
        ));
    }
}
