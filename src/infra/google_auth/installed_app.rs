use super::token::{ClientIdentity, FileTokenStorage};
use super::{AccessTokenProvider, AuthError, DRIVE_SCOPE};
use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

/// How long the browser consent may take before the run gives up.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Prints the consent URL; the loopback redirect delivers the code.
struct ConsoleConsent;

impl InstalledFlowDelegate for ConsoleConsent {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!("Waiting for Google Drive authorization in the browser");
            println!(
                "Open this URL in your browser to authorize Google Drive access:\n\n{}\n",
                url
            );
            Ok(String::new())
        })
    }
}

/// Used when only a stored token is available: there is no client secret to
/// start a consent with.
struct ConsentUnavailable;

impl InstalledFlowDelegate for ConsentUnavailable {
    fn present_user_url<'a>(
        &'a self,
        _url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async { Err("no client-secret file to start a consent with".to_string()) })
    }
}

/// User-consent authenticator with a persisted, refreshable token.
///
/// The stored token is used while valid, refreshed once expired, and replaced
/// through browser consent when the refresh fails.
pub struct InstalledAppAuth {
    authenticator: DefaultAuthenticator,
    storage: FileTokenStorage,
    credentials_path: PathBuf,
    token_path: PathBuf,
    can_consent: bool,
}

impl InstalledAppAuth {
    pub async fn new(credentials_path: &Path, token_path: &Path) -> Result<Self, AuthError> {
        Self::with_consent(credentials_path, token_path, Box::new(ConsoleConsent)).await
    }

    async fn with_consent(
        credentials_path: &Path,
        token_path: &Path,
        consent: Box<dyn InstalledFlowDelegate>,
    ) -> Result<Self, AuthError> {
        let stored = FileTokenStorage::read(token_path).await;
        let can_consent = tokio::fs::metadata(credentials_path).await.is_ok();

        let (secret, consent): (ApplicationSecret, Box<dyn InstalledFlowDelegate>) = if can_consent {
            let secret = yup_oauth2::read_application_secret(credentials_path)
                .await
                .map_err(|e| {
                    AuthError::InvalidCredentials(format!("{}: {}", credentials_path.display(), e))
                })?;
            (secret, consent)
        } else {
            match &stored {
                Some(token) => {
                    tracing::info!(
                        "No client-secret file at {}; refreshing with the client saved in {}",
                        credentials_path.display(),
                        token_path.display()
                    );
                    (
                        token.client.to_secret(),
                        Box::new(ConsentUnavailable) as Box<dyn InstalledFlowDelegate>,
                    )
                }
                None => return Err(AuthError::MissingCredentials(credentials_path.to_path_buf())),
            }
        };

        let storage = FileTokenStorage::new(token_path, ClientIdentity::from_secret(&secret), stored);
        let authenticator =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .with_storage(Box::new(storage.clone()))
                .flow_delegate(consent)
                .build()
                .await?;

        Ok(Self {
            authenticator,
            storage,
            credentials_path: credentials_path.to_path_buf(),
            token_path: token_path.to_path_buf(),
            can_consent,
        })
    }

    async fn fetch(&self) -> Result<String, AuthError> {
        let token = tokio::time::timeout(CONSENT_TIMEOUT, self.authenticator.token(&[DRIVE_SCOPE]))
            .await
            .map_err(|_| AuthError::Consent("timed out waiting for the browser redirect".to_string()))??;

        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| AuthError::Consent("token response had no access token".to_string()))
    }

    fn missing_credentials(&self) -> AuthError {
        AuthError::MissingCredentials(self.credentials_path.clone())
    }
}

#[async_trait]
impl AccessTokenProvider for InstalledAppAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        let had_token = self.storage.has_token().await;
        let err = match self.fetch().await {
            Ok(token) => return Ok(token),
            Err(e) => e,
        };

        if !had_token {
            return Err(if self.can_consent { err } else { self.missing_credentials() });
        }

        tracing::warn!("Error refreshing token: {}. Attempting re-authentication...", err);
        self.storage.clear().await?;
        if !self.can_consent {
            return Err(self.missing_credentials());
        }
        self.fetch().await
    }

    fn describe(&self) -> String {
        format!(
            "user credentials (client secret: {}, token: {})",
            self.credentials_path.display(),
            self.token_path.display()
        )
    }
}
