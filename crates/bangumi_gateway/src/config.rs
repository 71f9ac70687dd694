//! Gateway configuration
//!
//! Everything is read from the environment; nothing here panics on a missing
//! variable. Client credentials default to empty strings so the authorize
//! endpoint still answers on an unconfigured deployment.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::error::{GatewayError, Result};

pub const DEFAULT_OAUTH_BASE_URL: &str = "https://bgm.tv";
pub const DEFAULT_API_BASE_URL: &str = "https://api.bgm.tv";
pub const DEFAULT_USER_AGENT: &str = "Bangmio/1.0 (https://github.com/bangmio/bangmio)";

/// Path the upstream provider redirects back to, relative to the public base URL.
pub const CALLBACK_PATH: &str = "/api/auth/bangumi/callback";

/// Bangumi OAuth application and upstream endpoint settings
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Host serving `/oauth/authorize` and `/oauth/access_token`
    pub oauth_base_url: Url,
    /// Host serving `/v0/me`
    pub api_base_url: Url,
}

impl OAuthConfig {
    pub fn authorize_url(&self) -> Result<Url> {
        join(&self.oauth_base_url, "/oauth/authorize")
    }

    pub fn token_url(&self) -> Result<Url> {
        join(&self.oauth_base_url, "/oauth/access_token")
    }

    pub fn profile_url(&self) -> Result<Url> {
        join(&self.api_base_url, "/v0/me")
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub oauth: OAuthConfig,
    /// Catalog API host for search and subject lookups
    pub api_base_url: Url,
    pub user_agent: String,
    /// Overrides the request-derived base URL for OAuth redirects
    pub public_base_url: Option<Url>,
    pub upstream_timeout: Duration,
    pub sweep_interval: Duration,
    pub session_ttl: chrono::Duration,
    pub state_ttl: chrono::Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let oauth_base_url = Url::parse(DEFAULT_OAUTH_BASE_URL).expect("static URL");
        let api_base_url = Url::parse(DEFAULT_API_BASE_URL).expect("static URL");

        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            oauth: OAuthConfig {
                client_id: String::new(),
                client_secret: String::new(),
                oauth_base_url,
                api_base_url: api_base_url.clone(),
            },
            api_base_url,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            public_base_url: None,
            upstream_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(300),
            session_ttl: chrono::Duration::days(7),
            state_ttl: chrono::Duration::minutes(10),
        }
    }
}

impl GatewayConfig {
    /// Build configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        match get("BANGUMI_CLIENT_ID") {
            Some(id) => config.oauth.client_id = id,
            None => warn!("[WARN] BANGUMI_CLIENT_ID not set, authorize URLs will carry an empty client_id"),
        }
        match get("BANGUMI_CLIENT_SECRET") {
            Some(secret) => config.oauth.client_secret = secret,
            None => warn!("[WARN] BANGUMI_CLIENT_SECRET not set, token exchange will fail upstream"),
        }

        if let Some(raw) = get("BANGUMI_OAUTH_BASE_URL") {
            config.oauth.oauth_base_url = parse_url("BANGUMI_OAUTH_BASE_URL", &raw)?;
        }
        if let Some(raw) = get("BANGUMI_API_BASE_URL") {
            let url = parse_url("BANGUMI_API_BASE_URL", &raw)?;
            config.oauth.api_base_url = url.clone();
            config.api_base_url = url;
        }
        if let Some(raw) = get("GATEWAY_PUBLIC_BASE_URL") {
            config.public_base_url = Some(parse_url("GATEWAY_PUBLIC_BASE_URL", &raw)?);
        }
        if let Some(agent) = get("BANGUMI_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(host) = get("GATEWAY_HOST") {
            config.host = host;
        }
        if let Some(raw) = get("GATEWAY_PORT") {
            config.port = parse_number("GATEWAY_PORT", &raw)?;
        }
        if let Some(raw) = get("GATEWAY_UPSTREAM_TIMEOUT_SECS") {
            config.upstream_timeout =
                Duration::from_secs(parse_number("GATEWAY_UPSTREAM_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = get("GATEWAY_SWEEP_INTERVAL_SECS") {
            let secs: u64 = parse_number("GATEWAY_SWEEP_INTERVAL_SECS", &raw)?;
            if secs == 0 {
                return Err(GatewayError::Config(
                    "GATEWAY_SWEEP_INTERVAL_SECS must be greater than zero".to_string(),
                ));
            }
            config.sweep_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Point every upstream endpoint at a single base URL (used against mock servers)
    pub fn with_upstream(mut self, base: Url) -> Self {
        self.oauth.oauth_base_url = base.clone();
        self.oauth.api_base_url = base.clone();
        self.api_base_url = base;
        self
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| GatewayError::Config(format!("cannot join {} onto {}: {}", path, base, e)))
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    Url::parse(raw.trim()).map_err(|e| GatewayError::Config(format!("{} is not a valid URL: {}", key, e)))
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| GatewayError::Config(format!("{} is not a valid number: {}", key, raw)))
}
