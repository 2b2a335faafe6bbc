//! OAuth 2.0 operations against the authorization server.
//!
//! This module only speaks the protocol: building the consent URL, exchanging an authorization
//! code, and refreshing access tokens. Deciding *when* to do which is the job of
//! [`crate::session`].

use crate::config::Endpoints;
use crate::credentials::Credentials;
use eyre::Context;
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::url::Url;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenUrl, reqwest,
};

/// The only permission the pipeline asks for.
pub const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// A consent URL handed to the operator, plus the state needed to redeem its code.
#[derive(Debug)]
pub struct PendingAuthorization {
    pub url: Url,
    pkce_verifier: PkceCodeVerifier,
}

/// Performs OAuth flows for one client configuration.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    http: reqwest::Client,
}

impl OAuthManager {
    /// Endpoints named in `credentials` take precedence over `endpoints`.
    pub fn new(credentials: &Credentials, endpoints: &Endpoints) -> eyre::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
            auth_url: credentials
                .auth_uri
                .clone()
                .unwrap_or_else(|| endpoints.auth_url.clone()),
            token_url: credentials
                .token_uri
                .clone()
                .unwrap_or_else(|| endpoints.token_url.clone()),
            http,
        })
    }

    fn client(&self) -> eyre::Result<ConfiguredClient> {
        let auth_url = AuthUrl::new(self.auth_url.clone()).context("parse authorization URL")?;
        let token_url = TokenUrl::new(self.token_url.clone()).context("parse token URL")?;
        let redirect_url =
            RedirectUrl::new(self.redirect_uri.clone()).context("parse redirect URI")?;
        Ok(BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url))
    }

    /// Builds the URL the operator visits to grant upload access.
    ///
    /// Offline access is requested so that the resulting token carries a refresh token.
    pub fn authorization_url(&self) -> eyre::Result<PendingAuthorization> {
        let client = self.client()?;
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, _csrf_token) = client
            // The code comes back through the operator rather than a redirect, so there is no
            // state parameter to check it against.
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(UPLOAD_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();
        Ok(PendingAuthorization { url, pkce_verifier })
    }

    /// Exchanges an authorization code for a token.
    pub async fn exchange_code(
        &self,
        pending: PendingAuthorization,
        code: &str,
    ) -> eyre::Result<BasicTokenResponse> {
        let client = self.client()?;
        client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(pending.pkce_verifier)
            .request_async(&self.http)
            .await
            .context("exchange authorization code with access token")
    }

    /// Attempts to refresh an access token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_token))` - Refresh succeeded
    /// * `Ok(None)` - The refresh token was rejected as an invalid grant (revoked or expired)
    /// * `Err(_)` - Network or other error occurred during refresh attempt
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        tracing::debug!("attempting to refresh OAuth token");
        let client = self.client()?;
        match client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(sr.error(), BasicErrorResponseType::InvalidGrant) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}
