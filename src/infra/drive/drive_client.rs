use crate::core::drive::{DriveClient, DriveError, FileQuery, NewFile, RemoteFile};
use crate::infra::google_auth::AccessTokenProvider;
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields requested back from a create call.
const CREATED_FIELDS: &str = "id, name, webViewLink";

/// Drive v3 REST client exposing only the calls the upload flow needs.
pub struct GoogleDriveClient {
    client: Client,
    auth: Box<dyn AccessTokenProvider>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    parents: [&'a str; 1],
    mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GoogleDriveClient {
    pub fn new(auth: Box<dyn AccessTokenProvider>, timeout: Duration) -> Result<Self, DriveError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DriveError::Transport(e.to_string()))?;
        Ok(Self { client, auth })
    }

    async fn bearer(&self) -> Result<String, DriveError> {
        self.auth
            .access_token()
            .await
            .map_err(|e| DriveError::Auth(e.to_string()))
    }

    async fn api_error(response: Response) -> DriveError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        DriveError::Api {
            status,
            message: error_message(&text),
        }
    }

    /// `files.list` over My Drive and every shared drive the user can see.
    fn list_request(&self, token: &str, q: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/files", API_BASE))
            .bearer_auth(token)
            .query(&[
                ("q", q),
                ("spaces", "drive"),
                ("corpora", "allDrives"),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
                ("fields", "files(id, name)"),
            ])
    }

    /// Starts a resumable upload session and returns its URI.
    async fn start_resumable_upload(
        &self,
        token: &str,
        file: &NewFile,
        content_length: usize,
    ) -> Result<String, DriveError> {
        let metadata = FileMetadata {
            name: &file.name,
            parents: [&file.parent_id],
            mime_type: &file.mime_type,
        };

        let response = self
            .client
            .post(format!("{}/files", UPLOAD_BASE))
            .bearer_auth(token)
            .query(&[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", CREATED_FIELDS),
            ])
            .header("X-Upload-Content-Type", file.mime_type.as_str())
            .header("X-Upload-Content-Length", content_length.to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::Transport("upload session has no Location header".to_string()))
    }
}

/// Pulls the human-readable message out of a Drive error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl DriveClient for GoogleDriveClient {
    async fn ensure_session(&self) -> Result<(), DriveError> {
        self.bearer().await.map(|_| ())
    }

    async fn list_files(&self, query: &FileQuery) -> Result<Vec<RemoteFile>, DriveError> {
        let token = self.bearer().await?;
        let q = query.to_drive_query();
        tracing::debug!("Drive files.list q={}", q);

        let response = self
            .list_request(&token, &q)
            .send()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let list: FileList = response
            .json()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;
        Ok(list.files)
    }

    async fn create_file(&self, file: &NewFile, content: Vec<u8>) -> Result<RemoteFile, DriveError> {
        let token = self.bearer().await?;
        let session_uri = self
            .start_resumable_upload(&token, file, content.len())
            .await?;

        let response = self
            .client
            .put(&session_uri)
            .bearer_auth(&token)
            .header("Content-Type", file.mime_type.as_str())
            .body(content)
            .send()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))
    }
}
