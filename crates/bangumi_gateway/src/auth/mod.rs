//! Bangumi OAuth flow and the in-memory session/state stores behind it.

pub mod oauth;
pub mod session_store;
pub mod state_store;
pub mod token;

pub use oauth::{callback_uri, BangumiOAuthClient, CompletedLogin};
pub use session_store::{SessionRecord, SessionStore};
pub use state_store::{PendingAuthState, StateStore};
pub use token::{generate_token, SESSION_TOKEN_LEN, STATE_TOKEN_LEN};
