//! Turns persisted credentials into an authorized [`YouTubeClient`].
//!
//! A session walks through the [`AuthState`]s at most once. When no token has been persisted
//! yet, the operator is asked for an authorization code through an
//! [`AuthorizationCodeProvider`]; the resulting token is saved so later runs go straight through.

use crate::config::Endpoints;
use crate::credentials::{CredentialStore, Token};
use crate::error::PipelineError;
use crate::oauth::OAuthManager;
use crate::youtube_api::{TimeBoundAccessToken, YouTubeClient};
use eyre::Context;
use jiff::Timestamp;
use oauth2::url::Url;
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

/// Where a session is in the authorization flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unconfigured,
    CredentialsLoaded,
    TokenValid,
    AwaitingAuthorization,
    Authorized,
    Failed,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::Unconfigured => "unconfigured",
            AuthState::CredentialsLoaded => "credentials loaded",
            AuthState::TokenValid => "token valid",
            AuthState::AwaitingAuthorization => "awaiting authorization",
            AuthState::Authorized => "authorized",
            AuthState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Obtains an authorization code from whoever can grant access.
pub trait AuthorizationCodeProvider {
    /// Presents `url` and returns the code the operator got back from it.
    fn authorization_code(&self, url: &Url) -> impl Future<Output = eyre::Result<String>> + Send;
}

/// Prints the consent URL, tries to open it in a browser, and reads the code from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

impl AuthorizationCodeProvider for ConsolePrompt {
    async fn authorization_code(&self, url: &Url) -> eyre::Result<String> {
        eprintln!("Authorize this app by visiting this url:");
        eprintln!("{url}");
        if let Err(e) = webbrowser::open(url.as_str()) {
            tracing::debug!(error = %e, "could not open browser");
        }
        eprintln!("Enter the code from that page here:");

        let mut line = String::new();
        tokio::io::BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("read authorization code from stdin")?;
        Ok(line)
    }
}

/// Always answers with the same code.
#[derive(Debug, Clone)]
pub struct StaticCode(pub String);

impl AuthorizationCodeProvider for StaticCode {
    async fn authorization_code(&self, _url: &Url) -> eyre::Result<String> {
        Ok(self.0.clone())
    }
}

/// Drives authorization for one process run.
#[derive(Debug)]
pub struct AuthSession<P> {
    store: CredentialStore,
    endpoints: Arc<Endpoints>,
    provider: P,
    state: AuthState,
}

impl<P: AuthorizationCodeProvider> AuthSession<P> {
    pub fn new(store: CredentialStore, endpoints: Arc<Endpoints>, provider: P) -> Self {
        Self {
            store,
            endpoints,
            provider,
            state: AuthState::Unconfigured,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    fn enter(&mut self, state: AuthState) {
        tracing::debug!(from = %self.state, to = %state, "auth session transition");
        self.state = state;
    }

    fn fail(&mut self, report: eyre::Report) -> PipelineError {
        self.enter(AuthState::Failed);
        PipelineError::auth(report)
    }

    /// Runs the flow to completion and returns a client ready for API calls.
    ///
    /// A missing client configuration leaves the session [`AuthState::Unconfigured`] and returns
    /// a [`PipelineError::MissingClientConfiguration`]. Any other failure moves it to [`AuthState::Failed`].
    /// A session only runs once; a second call is an error.
    pub async fn authorize(&mut self) -> Result<YouTubeClient, PipelineError> {
        if self.state != AuthState::Unconfigured {
            return Err(PipelineError::Auth(format!(
                "session already ran (state: {})",
                self.state
            )));
        }

        let Some(credentials) = self.store.load_credentials().await? else {
            return Err(PipelineError::MissingClientConfiguration {
                path: self.store.client_secrets_path().to_path_buf(),
            });
        };
        let oauth = OAuthManager::new(&credentials, &self.endpoints)
            .map_err(PipelineError::configuration)?;
        self.enter(AuthState::CredentialsLoaded);

        let token = match self.store.load_token().await {
            Ok(token) => token,
            Err(e) => {
                return Err(self.fail(e.wrap_err(format!(
                    "remove {} to authorize again",
                    self.store.token_path().display()
                ))));
            }
        };

        let token = match token {
            Some(token) => {
                self.enter(AuthState::TokenValid);
                token
            }
            None => {
                self.enter(AuthState::AwaitingAuthorization);
                match self.authorize_interactively(&oauth).await {
                    Ok(token) => token,
                    Err(e) => return Err(self.fail(e)),
                }
            }
        };

        self.enter(AuthState::Authorized);
        Ok(YouTubeClient::new(
            TimeBoundAccessToken::new(token),
            Arc::new(oauth),
            Arc::clone(&self.endpoints),
        ))
    }

    async fn authorize_interactively(&self, oauth: &OAuthManager) -> eyre::Result<Token> {
        let pending = oauth.authorization_url()?;
        tracing::info!(url = %pending.url, "asking operator to follow OAuth flow");
        let code = self
            .provider
            .authorization_code(&pending.url)
            .await
            .context("obtain authorization code")?;
        let code = code.trim();
        if code.is_empty() {
            eyre::bail!("no authorization code was entered");
        }

        let issued_at = Timestamp::now();
        let response = oauth.exchange_code(pending, code).await?;
        let token = Token::from_response(&response, issued_at);
        self.store
            .save_token(&token)
            .await
            .context("persist new token")?;
        Ok(token)
    }
}
