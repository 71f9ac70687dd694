//! Bangumi Gateway Service
//!
//! Session layer and thin proxy in front of the Bangumi media-catalog API.
//!
//! # Features
//! - Bangumi OAuth authorization-code login with one-time `state` values
//! - In-memory bearer sessions with lazy and periodic expiry
//! - Catalog search and subject detail proxying with response reshaping
//! - HTTP server with permissive CORS for the browser client

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod server;
pub mod types;

pub use auth::{BangumiOAuthClient, PendingAuthState, SessionRecord, SessionStore, StateStore};
pub use catalog::CatalogClient;
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use server::{build_router, start_server, AppState};
pub use types::BangumiUser;
