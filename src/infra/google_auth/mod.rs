// =============================================================================
// GOOGLE AUTHENTICATION
// =============================================================================
//
// Produces bearer tokens for the Drive API from an installed-app client secret
// (`{"installed": {...}}` or `{"web": {...}}`, as downloaded from the Google
// Cloud Console).
//
// The OAuth dance itself (loopback redirect, code exchange, refresh) is done by
// `yup_oauth2`. This module adds the token file: JSON, owner-only, carrying the
// client identity so an expired token can be refreshed even after the
// client-secret file is gone.

pub mod installed_app;
pub mod token;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use installed_app::InstalledAppAuth;

/// Full Drive access: listing must see files this app did not create.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Credentials file '{0}' not found. Download it from the Google Cloud Console.")]
    MissingCredentials(PathBuf),
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Consent flow failed: {0}")]
    Consent(String),
    #[error("OAuth error: {0}")]
    OAuth(#[from] yup_oauth2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Returns a bearer token that is valid right now.
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Builds the Drive authenticator.
///
/// A missing credentials file is fine as long as `token_path` holds a token
/// that is still valid or refreshable.
pub async fn load_authenticator(
    credentials_path: &Path,
    token_path: &Path,
) -> Result<Box<dyn AccessTokenProvider>, AuthError> {
    let auth = InstalledAppAuth::new(credentials_path, token_path).await?;
    Ok(Box::new(auth))
}
