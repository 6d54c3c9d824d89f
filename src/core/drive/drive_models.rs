use serde::{Deserialize, Serialize};

/// MIME type used for every file this tool uploads.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A file object owned by the remote storage service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

/// Filter for "files named X directly inside folder Y that are not trashed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileQuery {
    pub name: String,
    pub parent_id: String,
}

impl FileQuery {
    pub fn new(name: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: parent_id.into(),
        }
    }

    /// Renders the filter in the Drive query language.
    pub fn to_drive_query(&self) -> String {
        format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query_value(&self.name),
            escape_query_value(&self.parent_id)
        )
    }
}

/// Escapes a string literal for the Drive query language.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Metadata for a file about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub parent_id: String,
    pub mime_type: String,
}

/// What happened to a single upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A file with the same name is already in the folder (or the check could not rule it out).
    Skipped { name: String },
    Uploaded(RemoteFile),
    Failed { reason: String },
}

/// Parameters of one upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub local_path: std::path::PathBuf,
    pub folder_id: String,
    pub name: Option<String>,
    pub overwrite_existing: bool,
}
