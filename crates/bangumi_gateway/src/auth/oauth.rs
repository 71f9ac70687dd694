use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::session_store::SessionStore;
use super::state_store::StateStore;
use crate::config::{OAuthConfig, CALLBACK_PATH};
use crate::error::{GatewayError, Result};
use crate::types::{BangumiProfile, BangumiUser};

/// Outcome of a completed authorization
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub session_token: String,
    pub user: BangumiUser,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Drives the Bangumi authorization-code flow and mints local sessions
///
/// Clones share the state and session stores as well as the HTTP client.
#[derive(Clone)]
pub struct BangumiOAuthClient {
    config: OAuthConfig,
    states: StateStore,
    sessions: SessionStore,
    http_client: reqwest::Client,
}

impl BangumiOAuthClient {
    pub fn new(
        config: OAuthConfig,
        states: StateStore,
        sessions: SessionStore,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            states,
            sessions,
            http_client,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    /// Issue a state and build the upstream consent URL
    ///
    /// `base_url` is the public origin of this gateway; the redirect URI is
    /// the callback path resolved against it. Nothing is sent upstream.
    pub fn begin_authorize(&self, base_url: &str) -> Result<Url> {
        let redirect_uri = callback_uri(base_url)?;
        let mut url = self.config.authorize_url()?;

        let state = self.states.issue(redirect_uri.as_str());

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("state", &state);

        debug!("Authorization started, redirect_uri={}", redirect_uri);
        Ok(url)
    }

    /// Finish the flow: consume `state`, exchange `code`, fetch the profile and open a session
    pub async fn complete_callback(&self, code: &str, state: &str) -> Result<CompletedLogin> {
        let pending = self.states.consume(state).ok_or(GatewayError::InvalidState)?;

        let access_token = self.exchange_code(code, &pending.redirect_uri).await?;
        let user = self.fetch_user(&access_token).await?;

        let session_token = self.sessions.issue(user.clone());
        Ok(CompletedLogin { session_token, user })
    }

    /// Exchange an authorization code for an upstream access token
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String> {
        let token_url = self.config.token_url()?;

        let form_params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http_client
            .post(token_url)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("[WARN] Bangumi token exchange failed: {} - {}", status, body);
            return Err(GatewayError::UpstreamExchange(status.as_u16().to_string()));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamExchange(format!("unreadable token response: {}", e)))?;

        token_response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::UpstreamExchange("token response has no access_token".to_string()))
    }

    /// Fetch and normalize the identity behind an access token
    async fn fetch_user(&self, access_token: &str) -> Result<BangumiUser> {
        let profile_url = self.config.profile_url()?;

        let response = self
            .http_client
            .get(profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamProfile(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("[WARN] Bangumi profile fetch failed: {}", status);
            return Err(GatewayError::UpstreamProfile(status.as_u16().to_string()));
        }

        let profile: BangumiProfile = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamProfile(format!("unreadable profile: {}", e)))?;

        Ok(BangumiUser::from(profile))
    }
}

/// Resolve the callback path against a public base URL
pub fn callback_uri(base_url: &str) -> Result<Url> {
    let base = Url::parse(base_url)
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid base URL {}: {}", base_url, e)))?;
    if base.cannot_be_a_base() {
        return Err(GatewayError::InvalidRequest(format!("invalid base URL {}", base_url)));
    }
    base.join(CALLBACK_PATH)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}
