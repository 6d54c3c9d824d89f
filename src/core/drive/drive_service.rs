use super::drive_models::{FileQuery, NewFile, RemoteFile, UploadOutcome, UploadRequest, PDF_MIME_TYPE};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while talking to the remote storage service.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl DriveError {
    /// Operator guidance for the statuses that usually mean a config mistake.
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            DriveError::Api { status: 404, .. } => Some(
                "The folder ID might be incorrect or you may not have access to it.",
            ),
            DriveError::Api { status: 403, .. } => {
                Some("Permission denied. Check the API scope and write access to the folder.")
            }
            _ => None,
        }
    }
}

/// The calls the upload flow needs from a remote storage service.
#[async_trait]
pub trait DriveClient: Send + Sync {
    /// Makes sure an authorized session is available before any other call.
    async fn ensure_session(&self) -> Result<(), DriveError>;

    /// Lists non-trashed files matching the query.
    async fn list_files(&self, query: &FileQuery) -> Result<Vec<RemoteFile>, DriveError>;

    /// Creates a new file object. Never deduplicates by name.
    async fn create_file(&self, file: &NewFile, content: Vec<u8>) -> Result<RemoteFile, DriveError>;
}

pub struct DriveService<C: DriveClient> {
    client: C,
}

impl<C: DriveClient> DriveService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Returns whether a non-trashed file named `name` sits directly in `folder_id`.
    ///
    /// Fail-closed: if the remote service cannot be asked, this answers `true`.
    /// A transient error may then skip a legitimate upload, but it never
    /// produces a duplicate.
    pub async fn file_exists(&self, name: &str, folder_id: &str) -> bool {
        let query = FileQuery::new(name, folder_id);
        match self.client.list_files(&query).await {
            Ok(files) if files.is_empty() => false,
            Ok(files) => {
                tracing::info!(
                    "Found {} existing file(s) named '{}' in folder '{}'",
                    files.len(),
                    name,
                    folder_id
                );
                for file in &files {
                    tracing::info!("  - ID: {}, Name: {}", file.id, file.name);
                }
                true
            }
            Err(e) => {
                tracing::error!(
                    "Error while checking for existing file '{}': {}. Treating it as existing.",
                    name,
                    e
                );
                true
            }
        }
    }

    /// Uploads a local PDF unless a same-named file is already in the folder.
    pub async fn upload(&self, request: &UploadRequest) -> UploadOutcome {
        let path = &request.local_path;
        let is_file = tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            let reason = format!("Local file not found at '{}'", path.display());
            tracing::error!("{}", reason);
            return UploadOutcome::Failed { reason };
        }

        let name = match request.name.clone().or_else(|| base_name(path)) {
            Some(name) => name,
            None => {
                let reason = format!("Cannot derive a file name from '{}'", path.display());
                tracing::error!("{}", reason);
                return UploadOutcome::Failed { reason };
            }
        };

        if let Err(e) = self.client.ensure_session().await {
            let reason = format!("Could not get a Drive session: {}", e);
            tracing::error!("{}. Aborting upload.", reason);
            return UploadOutcome::Failed { reason };
        }

        if request.overwrite_existing {
            tracing::info!(
                "Overwrite requested; uploading '{}' even if it already exists",
                name
            );
        } else {
            tracing::info!(
                "Checking if '{}' already exists in folder '{}'...",
                name,
                request.folder_id
            );
            if self.file_exists(&name, &request.folder_id).await {
                tracing::warn!("'{}' already exists; skipping upload", name);
                return UploadOutcome::Skipped { name };
            }
        }

        let content = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let reason = format!("Failed to read '{}': {}", path.display(), e);
                tracing::error!("{}", reason);
                return UploadOutcome::Failed { reason };
            }
        };

        let new_file = NewFile {
            name: name.clone(),
            parent_id: request.folder_id.clone(),
            mime_type: PDF_MIME_TYPE.to_string(),
        };

        tracing::info!(
            "Uploading '{}' as '{}' to folder '{}'...",
            path.display(),
            name,
            request.folder_id
        );

        match self.client.create_file(&new_file, content).await {
            Ok(file) => {
                tracing::info!(
                    "Uploaded '{}' (ID: {}, Link: {})",
                    file.name,
                    file.id,
                    file.web_view_link.as_deref().unwrap_or("n/a")
                );
                UploadOutcome::Uploaded(file)
            }
            Err(e) => {
                tracing::error!("Upload of '{}' failed: {}", name, e);
                if let Some(hint) = e.guidance() {
                    tracing::error!("{}", hint);
                }
                UploadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn base_name(path: &std::path::Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}
