//! OAuth credentials for the Drive API.
//!
//! Consent, refresh and token persistence are delegated to yup-oauth2's
//! installed-app flow: the token is read from disk on startup, refreshed and
//! rewritten when it expires, and re-acquired through a loopback redirect when
//! it is missing or revoked. [`CredentialProvider`] keeps the current access
//! token in memory and drops it when the API rejects it.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

/// Refresh the token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Assumed lifetime when the token carries no expiry.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// Full Drive access: listing, download, upload and update.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("client secrets file not found at {0}")]
    MissingClientSecrets(PathBuf),

    #[error("invalid client secrets file: {0}")]
    InvalidClientSecrets(String),

    #[error("no usable stored token and interactive consent is disabled")]
    ConsentRequired,

    #[error("OAuth error: {0}")]
    OAuth(#[from] yup_oauth2::Error),

    #[error("token response carried no access token")]
    MissingAccessToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that hands out bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> AuthResult<String>;

    /// Drops any cached token so the next call fetches a fresh one.
    async fn invalidate(&self);
}

/// A fixed token, for tests and for tokens minted elsewhere.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> AuthResult<String> {
        Ok(self.0.clone())
    }

    async fn invalidate(&self) {}
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client secrets downloaded from the cloud console.
    pub client_secrets_path: PathBuf,
    /// Where the refresh and access tokens are persisted between runs.
    pub token_path: PathBuf,
    pub scopes: Vec<String>,
    /// Run the browser consent flow when no usable token exists.
    pub interactive: bool,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let margin = chrono::Duration::from_std(TOKEN_REFRESH_MARGIN).unwrap_or_default();
        self.expires_at - margin > now
    }

    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Shows the consent URL, or refuses when interactive consent is disabled.
struct ConsentDelegate {
    interactive: bool,
    refused: Arc<AtomicBool>,
}

impl InstalledFlowDelegate for ConsentDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            if !self.interactive {
                self.refused.store(true, Ordering::SeqCst);
                return Err("interactive consent is disabled".to_string());
            }

            info!(url, "open this URL in a browser to authorize Drive access");
            if !need_code {
                return Ok(String::new());
            }

            let mut code = String::new();
            BufReader::new(tokio::io::stdin()).read_line(&mut code).await.map_err(|e| e.to_string())?;
            Ok(code.trim().to_string())
        })
    }
}

/// Loads, refreshes and caches the user's Drive token.
pub struct CredentialProvider {
    auth: DefaultAuthenticator,
    scopes: Vec<String>,
    cache: RwLock<Option<CachedToken>>,
    force_refresh: AtomicBool,
    consent_refused: Arc<AtomicBool>,
}

impl CredentialProvider {
    /// Reads the client secrets and opens the on-disk token store.
    ///
    /// No token is requested yet; the first [`TokenSource::access_token`] call
    /// refreshes or runs the consent flow as needed.
    pub async fn load(config: OAuthConfig) -> AuthResult<Self> {
        if !tokio::fs::try_exists(&config.client_secrets_path).await.unwrap_or(false) {
            return Err(AuthError::MissingClientSecrets(config.client_secrets_path));
        }
        let secret = yup_oauth2::read_application_secret(&config.client_secrets_path)
            .await
            .map_err(|e| AuthError::InvalidClientSecrets(e.to_string()))?;

        // Several crates link rustls; pick the provider explicitly.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let consent_refused = Arc::new(AtomicBool::new(false));
        let delegate = ConsentDelegate { interactive: config.interactive, refused: consent_refused.clone() };
        let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
            .persist_tokens_to_disk(config.token_path.clone())
            .flow_delegate(Box::new(delegate))
            .build()
            .await?;

        debug!(token_path = %config.token_path.display(), "credential store opened");
        Ok(Self {
            auth,
            scopes: config.scopes,
            cache: RwLock::new(None),
            force_refresh: AtomicBool::new(false),
            consent_refused,
        })
    }

    async fn fetch(&self) -> AuthResult<CachedToken> {
        let result = if self.force_refresh.swap(false, Ordering::SeqCst) {
            debug!("forcing token refresh");
            self.auth.force_refreshed_token(&self.scopes).await
        } else {
            self.auth.token(&self.scopes).await
        };

        let token = result.map_err(|e| {
            if self.consent_refused.swap(false, Ordering::SeqCst) {
                AuthError::ConsentRequired
            } else {
                AuthError::OAuth(e)
            }
        })?;

        let access_token = token.token().ok_or(AuthError::MissingAccessToken)?.to_string();
        let expires_at = token
            .expiration_time()
            .and_then(|t| DateTime::from_timestamp(t.unix_timestamp(), 0))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::from_std(TOKEN_DEFAULT_TTL).unwrap_or_default());

        Ok(CachedToken { access_token, expires_at })
    }
}

#[async_trait]
impl TokenSource for CredentialProvider {
    async fn access_token(&self) -> AuthResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.access_token.clone());
        }

        match self.fetch().await {
            Ok(token) => {
                debug!(expires_at = %token.expires_at, "access token obtained");
                let access = token.access_token.clone();
                *cache = Some(token);
                Ok(access)
            }
            Err(e) => match cache.as_ref().filter(|t| t.is_usable(Utc::now())) {
                Some(stale) => {
                    warn!(error = %e, "token refresh failed, using the current token until it expires");
                    Ok(stale.access_token.clone())
                }
                None => Err(e),
            },
        }
    }

    async fn invalidate(&self) {
        self.force_refresh.store(true, Ordering::SeqCst);
        *self.cache.write().await = None;
    }
}
