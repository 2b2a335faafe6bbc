//! Persistent OAuth client configuration and tokens.
//!
//! Both files are JSON at fixed paths. The client configuration is Google's downloadable
//! `client_secrets.json`; the token file keeps the shape that earlier tooling wrote, so existing
//! token files keep working.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use eyre::Context;
use jiff::Timestamp;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// OAuth client configuration. Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Authorization endpoint named by the client configuration, if any.
    pub auth_uri: Option<String>,
    /// Token endpoint named by the client configuration, if any.
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsEntry>,
    web: Option<ClientSecretsEntry>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsEntry {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl Credentials {
    /// Parses a `client_secrets.json` document.
    pub fn from_json(raw: &str) -> eyre::Result<Self> {
        let file: ClientSecretsFile =
            serde_json::from_str(raw).context("parse client configuration JSON")?;
        let entry = file
            .installed
            .or(file.web)
            .ok_or_else(|| eyre::eyre!("neither an `installed` nor a `web` client is configured"))?;
        let redirect_uri = entry
            .redirect_uris
            .into_iter()
            .next()
            .ok_or_else(|| eyre::eyre!("client configuration lists no redirect URIs"))?;
        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            redirect_uri,
            auth_uri: entry.auth_uri,
            token_uri: entry.token_uri,
        })
    }
}

/// A persisted OAuth token.
///
/// Fields this program does not know about are kept and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry of `access_token`, in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Token {
    /// Converts a token endpoint response received at `issued_at`.
    pub fn from_response(response: &BasicTokenResponse, issued_at: Timestamp) -> Self {
        let expiry_date = response.expires_in().map(|expires_in| {
            issued_at.as_millisecond() + i64::try_from(expires_in.as_millis()).unwrap_or(i64::MAX)
        });
        let scope = response.scopes().map(|scopes| {
            scopes
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        });
        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            scope,
            token_type: Some(response.token_type().as_ref().to_string()),
            expiry_date,
            extra: serde_json::Map::new(),
        }
    }

    /// When the access token expires, if known.
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expiry_date
            .and_then(|ms| Timestamp::from_millisecond(ms).ok())
    }
}

/// Reads and writes the credential files.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    client_secrets_path: PathBuf,
    token_path: PathBuf,
}

impl CredentialStore {
    pub fn new(client_secrets_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secrets_path: client_secrets_path.into(),
            token_path: token_path.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.client_secrets_path, &config.token_path)
    }

    pub fn client_secrets_path(&self) -> &Path {
        &self.client_secrets_path
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Loads the client configuration.
    ///
    /// A missing file is `Ok(None)`; the caller decides how to guide the operator. A file that
    /// exists but cannot be used is a configuration error.
    pub async fn load_credentials(&self) -> Result<Option<Credentials>, PipelineError> {
        let Some(raw) = read_optional(&self.client_secrets_path)
            .await
            .map_err(PipelineError::configuration)?
        else {
            tracing::debug!(path = %self.client_secrets_path.display(), "no client configuration");
            return Ok(None);
        };
        Credentials::from_json(&raw)
            .with_context(|| format!("load {}", self.client_secrets_path.display()))
            .map(Some)
            .map_err(PipelineError::configuration)
    }

    /// Loads the persisted token, if there is one.
    pub async fn load_token(&self) -> eyre::Result<Option<Token>> {
        let Some(raw) = read_optional(&self.token_path).await? else {
            return Ok(None);
        };
        let token = serde_json::from_str(&raw)
            .with_context(|| format!("parse token file {}", self.token_path.display()))?;
        Ok(Some(token))
    }

    /// Persists `token`, replacing any previous one.
    ///
    /// The token is written to a sibling temporary file and then renamed into place, so readers
    /// see either the old or the new token, never a partial write.
    pub async fn save_token(&self, token: &Token) -> eyre::Result<()> {
        let json = serde_json::to_vec(token).context("serialize token")?;
        let tmp = tmp_sibling(&self.token_path);
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.token_path)
            .await
            .with_context(|| format!("move token into {}", self.token_path.display()))?;
        tracing::info!(path = %self.token_path.display(), "token stored");
        Ok(())
    }
}

async fn read_optional(path: &Path) -> eyre::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "token.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
