use super::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use yup_oauth2::storage::{TokenInfo, TokenStorage, TokenStorageError};
use yup_oauth2::ApplicationSecret;

/// OAuth client the token was issued to. Saved with the token so a refresh
/// works without the client-secret file.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
}

impl ClientIdentity {
    pub fn from_secret(secret: &ApplicationSecret) -> Self {
        Self {
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            token_uri: secret.token_uri.clone(),
        }
    }

    /// Enough of a client secret to refresh with. Consent needs the real file.
    pub fn to_secret(&self) -> ApplicationSecret {
        ApplicationSecret {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            token_uri: self.token_uri.clone(),
            ..Default::default()
        }
    }
}

/// On-disk form of the user token.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub client: ClientIdentity,
    #[serde(default)]
    pub scopes: Vec<String>,
}

// Tokens stay out of logs.
impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("client_id", &self.client.client_id)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl StoredToken {
    fn from_token_info(info: TokenInfo, client: ClientIdentity, scopes: &[&str]) -> Self {
        Self {
            access_token: info.access_token,
            refresh_token: info.refresh_token,
            id_token: info.id_token,
            expires_at: info
                .expires_at
                .and_then(|at| DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0)),
            client,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn to_token_info(&self) -> TokenInfo {
        TokenInfo {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self
                .expires_at
                .and_then(|at| OffsetDateTime::from_unix_timestamp(at.timestamp()).ok()),
            id_token: self.id_token.clone(),
        }
    }

    /// Tokens written without scope information are assumed to cover any scope.
    pub fn covers(&self, scopes: &[&str]) -> bool {
        self.scopes.is_empty() || scopes.iter().all(|s| self.scopes.iter().any(|own| own == s))
    }
}

/// Token storage for the OAuth flow, persisted as a JSON file only the owner
/// can read.
#[derive(Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
    client: ClientIdentity,
    token: Arc<RwLock<Option<StoredToken>>>,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>, client: ClientIdentity, token: Option<StoredToken>) -> Self {
        Self {
            path: path.into(),
            client,
            token: Arc::new(RwLock::new(token)),
        }
    }

    /// Reads a token file. Missing and unreadable files both come back as `None`.
    pub async fn read(path: &Path) -> Option<StoredToken> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Forgets the token in memory and on disk.
    pub async fn clear(&self) -> Result<(), AuthError> {
        *self.token.write().await = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(token)?;
        write_private(&self.path, json.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn set(&self, scopes: &[&str], token: TokenInfo) -> Result<(), TokenStorageError> {
        let mut current = self.token.write().await;
        let mut stored = StoredToken::from_token_info(token, self.client.clone(), scopes);
        // Refresh responses usually leave the refresh token out.
        if stored.refresh_token.is_none() {
            stored.refresh_token = current.as_ref().and_then(|t| t.refresh_token.clone());
        }

        // A token that cannot be saved is still good for this run.
        if let Err(e) = self.save(&stored).await {
            tracing::warn!("Could not save token to {}: {}", self.path.display(), e);
        }
        *current = Some(stored);
        Ok(())
    }

    async fn get(&self, scopes: &[&str]) -> Option<TokenInfo> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|t| t.covers(scopes))
            .map(StoredToken::to_token_info)
    }
}

/// Writes `contents` through a sibling temp file created with mode 0600.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "token.json".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&tmp_path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    drop(file);

    // `mode` only applies when the file is created.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    tokio::fs::rename(&tmp_path, path).await
}
