//! Request authentication.
//!
//! Two credential kinds are supported:
//!
//! - a static personal access token, sent as-is;
//! - a GitHub App, for which an RS256-signed JWT is exchanged for a
//!   short-lived installation token. The installation token is cached and
//!   minted again shortly before it expires.

use std::path::Path;
use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use runs::Timestamp;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::GitHubError;

/// JWT validity GitHub accepts at most.
const JWT_TTL: Duration = Duration::from_secs(10 * 60);
/// Backdating applied to `iat` to absorb clock drift.
const JWT_CLOCK_SKEW: Duration = Duration::from_secs(60);
/// Remaining validity below which an installation token is replaced.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// GitHub App identity used to mint installation tokens.
#[derive(Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub installation_id: String,
    pub private_key: SecretString,
}

impl AppCredentials {
    /// Loads the PEM-encoded private key from `path`.
    pub fn from_pem_file(
        app_id: impl Into<String>,
        installation_id: impl Into<String>,
        path: &Path,
    ) -> Result<Self, GitHubError> {
        let pem = std::fs::read_to_string(path).map_err(|source| GitHubError::PrivateKey {
            path: path.to_path_buf(),
            source,
        })?;

        let credentials = Self {
            app_id: app_id.into(),
            installation_id: installation_id.into(),
            private_key: SecretString::from(pem),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    fn validate(&self) -> Result<(), GitHubError> {
        if self.app_id.trim().is_empty() {
            return Err(GitHubError::InvalidConfig {
                field: "app_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.installation_id.trim().is_empty() {
            return Err(GitHubError::InvalidConfig {
                field: "installation_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.private_key.expose_secret().trim().is_empty() {
            return Err(GitHubError::InvalidConfig {
                field: "private_key",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Signs the app JWT for `now` (seconds since the Unix epoch).
    pub fn generate_jwt(&self, now: u64) -> Result<String, GitHubError> {
        #[derive(Debug, Serialize)]
        struct Claims<'a> {
            iat: u64,
            exp: u64,
            iss: &'a str,
        }

        let claims = Claims {
            iat: now.saturating_sub(JWT_CLOCK_SKEW.as_secs()),
            exp: now + JWT_TTL.as_secs(),
            iss: &self.app_id,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())?;
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &key,
        )?)
    }
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// How requests are authenticated.
#[derive(Debug, Clone)]
pub enum Credentials {
    Token(SecretString),
    App(AppCredentials),
}

#[derive(Clone)]
struct InstallationToken {
    token: SecretString,
    expires_at: Timestamp,
}

/// Supplies the bearer token for every API request.
pub(crate) struct Authenticator {
    credentials: Credentials,
    installation: Mutex<Option<InstallationToken>>,
}

impl Authenticator {
    pub(crate) fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            installation: Mutex::new(None),
        }
    }

    /// Returns a token valid for at least [`TOKEN_REFRESH_MARGIN`], minting a
    /// new installation token through `http` when needed.
    pub(crate) async fn bearer_token(
        &self,
        http: &reqwest::Client,
        api_base_url: &str,
    ) -> Result<SecretString, GitHubError> {
        let app = match &self.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::App(app) => app,
        };

        // Held across the exchange so concurrent callers mint only once.
        let mut cached = self.installation.lock().await;
        let now = Timestamp::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at.seconds_since(now) > TOKEN_REFRESH_MARGIN.as_secs_f64() {
                return Ok(token.token.clone());
            }
        }

        let token = mint_installation_token(http, api_base_url, app).await?;
        let secret = token.token.clone();
        *cached = Some(token);
        Ok(secret)
    }
}

async fn mint_installation_token(
    http: &reqwest::Client,
    api_base_url: &str,
    app: &AppCredentials,
) -> Result<InstallationToken, GitHubError> {
    #[derive(Debug, Deserialize)]
    struct InstallationTokenResponse {
        token: String,
        expires_at: chrono::DateTime<chrono::Utc>,
    }

    let now = u64::try_from(Timestamp::now().as_datetime().timestamp()).unwrap_or_default();
    let jwt = app.generate_jwt(now)?;
    let endpoint = format!(
        "{api_base_url}/app/installations/{}/access_tokens",
        app.installation_id
    );
    debug!(installation_id = %app.installation_id, "minting installation token");

    let response = http
        .post(endpoint)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .bearer_auth(jwt)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GitHubError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let payload: InstallationTokenResponse = serde_json::from_slice(&response.bytes().await?)?;
    let expires_at = Timestamp::from_utc(payload.expires_at);
    info!(
        installation_id = %app.installation_id,
        %expires_at,
        "minted installation token"
    );

    Ok(InstallationToken {
        token: SecretString::from(payload.token),
        expires_at,
    })
}
