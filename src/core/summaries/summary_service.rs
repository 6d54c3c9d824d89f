use super::prompt::SummaryPrompt;
use super::summary_models::{BatchReport, DocumentPayload, SummaryFormat, SummaryRecord};
use super::summary_store::{StoreError, SummaryStore};
use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};

const PDF_SUFFIX: &str = ".pdf";

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Model request failed: {0}")]
    Provider(String),
    #[error("Model returned an empty summary")]
    EmptyResponse,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A hosted model that turns one document plus an instruction into text.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(
        &self,
        prompt: &str,
        document: &DocumentPayload,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

pub struct SummaryService<P: SummaryProvider, S: SummaryStore> {
    provider: P,
    store: S,
    prompt: SummaryPrompt,
    format: SummaryFormat,
}

impl<P: SummaryProvider, S: SummaryStore> SummaryService<P, S> {
    pub fn new(provider: P, store: S, prompt: SummaryPrompt, format: SummaryFormat) -> Self {
        Self {
            provider,
            store,
            prompt,
            format,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Summarizes every PDF in `input_dir` that has no row in the table yet.
    ///
    /// Only a failure to list the folder is returned as an error; per-document
    /// failures are logged and counted.
    pub async fn run_batch(&self, input_dir: &Path) -> Result<BatchReport, SummaryError> {
        let candidates = list_pdf_files(input_dir).await?;
        tracing::info!(
            "Found {} PDF(s) in '{}' (prompt: {})",
            candidates.len(),
            input_dir.display(),
            self.prompt.source
        );

        let mut report = BatchReport::default();
        for path in candidates {
            let file_path = path.to_string_lossy().into_owned();

            match self.store.contains(&file_path).await {
                Ok(true) => {
                    tracing::debug!("Already summarized: {}", file_path);
                    report.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Could not check table for '{}': {}", file_path, e);
                    report.failed += 1;
                    continue;
                }
            }

            tracing::info!("Processing: {}", file_path);
            match self.summarize_file(&path, file_path.clone()).await {
                Ok(()) => {
                    tracing::info!("Saved summary for {}", file_path);
                    report.summarized += 1;
                }
                Err(e) => {
                    tracing::error!("Error processing {}: {}", file_path, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Batch finished: {} summarized, {} already present, {} failed",
            report.summarized,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    async fn summarize_file(&self, path: &Path, file_path: String) -> Result<(), SummaryError> {
        let bytes = tokio::fs::read(path).await?;
        let document = DocumentPayload::pdf(bytes);

        let raw = self
            .provider
            .summarize(&self.prompt.text, &document)
            .await
            .map_err(|e| SummaryError::Provider(e.to_string()))?;

        if raw.trim().is_empty() {
            return Err(SummaryError::EmptyResponse);
        }

        let record = SummaryRecord {
            file_path,
            summary: self.format.apply(&raw),
        };
        self.store.append(record).await?;
        Ok(())
    }
}

/// Lists regular files in `dir` whose name ends with `.pdf` (case-sensitive).
pub async fn list_pdf_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(PDF_SUFFIX) {
            continue;
        }
        let path = dir.join(&name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping '{}': {}", path.display(), e),
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct InMemorySummaryStore {
        records: Mutex<Vec<SummaryRecord>>,
    }

    impl InMemorySummaryStore {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SummaryStore for InMemorySummaryStore {
        async fn contains(&self, file_path: &str) -> Result<bool, StoreError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .any(|r| r.file_path == file_path))
        }

        async fn append(&self, record: SummaryRecord) -> Result<(), StoreError> {
            let mut records = self.records.lock().unwrap();
            if records.iter().any(|r| r.file_path == record.file_path) {
                return Err(StoreError::Duplicate(record.file_path));
            }
            records.push(record);
            Ok(())
        }

        async fn records(&self) -> Result<Vec<SummaryRecord>, StoreError> {
            Ok(self.records.lock().unwrap().clone())
        }
    }

    /// Echoes the document size; fails for documents whose content starts with "FAIL".
    struct FakeModel {
        calls: AtomicUsize,
    }

    impl FakeModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SummaryProvider for FakeModel {
        async fn summarize(
            &self,
            prompt: &str,
            document: &DocumentPayload,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(prompt, "PROMPT");
            assert_eq!(document.mime_type, "application/pdf");
            if document.data.starts_with(b"FAIL") {
                return Err("quota exceeded".into());
            }
            if document.data.starts_with(b"EMPTY") {
                return Ok("   ".to_string());
            }
            Ok(format!("  Summary\nof {} bytes\n", document.data.len()))
        }
    }

    fn prompt() -> SummaryPrompt {
        SummaryPrompt {
            text: "PROMPT".to_string(),
            source: "test".to_string(),
        }
    }

    fn service() -> SummaryService<FakeModel, InMemorySummaryStore> {
        SummaryService::new(
            FakeModel::new(),
            InMemorySummaryStore::new(),
            prompt(),
            SummaryFormat::Multiline,
        )
    }

    #[tokio::test]
    async fn test_single_pdf_produces_single_row() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        let service = service();

        let report = service.run_batch(dir.path()).await.unwrap();

        assert_eq!(report.summarized, 1);
        let records = service.store().records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].file_path,
            dir.path().join("a.pdf").to_string_lossy()
        );
        assert!(records[0].file_path.ends_with("a.pdf"));
        assert_eq!(records[0].summary, "Summary\nof 4 bytes");
    }

    #[tokio::test]
    async fn test_second_run_adds_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-a").unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-b").unwrap();
        let service = service();

        service.run_batch(dir.path()).await.unwrap();
        let calls_after_first = service.provider.calls.load(Ordering::SeqCst);
        let report = service.run_batch(dir.path()).await.unwrap();

        assert_eq!(report.summarized, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(service.provider.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(service.store().records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_only_pdf_files_are_processed_once_each() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.pdf"), b"%PDF-x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignore").unwrap();
        std::fs::write(dir.path().join("upper.PDF"), b"case-sensitive").unwrap();
        std::fs::create_dir(dir.path().join("folder.pdf")).unwrap();
        let service = service();

        service.run_batch(dir.path()).await.unwrap();

        let records = service.store().records().await.unwrap();
        let paths: HashSet<_> = records.iter().map(|r| r.file_path.clone()).collect();
        assert_eq!(records.len(), paths.len());
        assert_eq!(
            paths,
            HashSet::from([dir.path().join("x.pdf").to_string_lossy().into_owned()])
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.pdf"), b"FAIL").unwrap();
        std::fs::write(dir.path().join("blank.pdf"), b"EMPTY").unwrap();
        std::fs::write(dir.path().join("good.pdf"), b"%PDF").unwrap();
        let service = service();

        let report = service.run_batch(dir.path()).await.unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.summarized, 1);
        let records = service.store().records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].file_path.ends_with("good.pdf"));
    }

    #[tokio::test]
    async fn test_failed_document_is_retried_next_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flaky.pdf");
        std::fs::write(&path, b"FAIL").unwrap();
        let service = service();

        let first = service.run_batch(dir.path()).await.unwrap();
        std::fs::write(&path, b"%PDF ok").unwrap();
        let second = service.run_batch(dir.path()).await.unwrap();

        assert_eq!(first.failed, 1);
        assert_eq!(second.summarized, 1);
    }

    #[tokio::test]
    async fn test_existing_row_skips_model_call() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("done.pdf"), b"%PDF").unwrap();
        let service = service();
        service
            .store()
            .append(SummaryRecord {
                file_path: dir.path().join("done.pdf").to_string_lossy().into_owned(),
                summary: "old".to_string(),
            })
            .await
            .unwrap();

        let report = service.run_batch(dir.path()).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(service.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_legacy_format_is_applied_before_storing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        let service = SummaryService::new(
            FakeModel::new(),
            InMemorySummaryStore::new(),
            prompt(),
            SummaryFormat::LegacyCarriageReturn,
        );

        service.run_batch(dir.path()).await.unwrap();

        let records = service.store().records().await.unwrap();
        assert_eq!(records[0].summary, "\"Summary\rof 4 bytes\"");
    }

    #[tokio::test]
    async fn test_missing_input_folder_is_an_error() {
        let dir = TempDir::new().unwrap();
        let service = service();

        let result = service.run_batch(&dir.path().join("missing")).await;
        assert!(matches!(result, Err(SummaryError::Io(_))));
    }
}
