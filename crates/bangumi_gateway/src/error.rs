use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Token exchange failed: {0}")]
    UpstreamExchange(String),

    #[error("Failed to get user info: {0}")]
    UpstreamProfile(String),

    #[error("{}", upstream_message(.status, .message))]
    Upstream { status: Option<u16>, message: String },

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Upstream answered with a non-success status.
    pub fn upstream_status(status: reqwest::StatusCode) -> Self {
        GatewayError::Upstream {
            status: Some(status.as_u16()),
            message: format!("Bangumi API error: {}", status.as_u16()),
        }
    }

    /// Upstream could not be reached or returned an unreadable body.
    pub fn upstream_transport(err: reqwest::Error) -> Self {
        GatewayError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

fn upstream_message(status: &Option<u16>, message: &str) -> String {
    match *status {
        Some(code) if !message.contains(&code.to_string()) => format!("{} ({})", message, code),
        _ => message.to_string(),
    }
}
