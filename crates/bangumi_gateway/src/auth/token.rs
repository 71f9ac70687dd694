use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of session tokens handed to clients
pub const SESSION_TOKEN_LEN: usize = 32;

/// Length of OAuth `state` values
pub const STATE_TOKEN_LEN: usize = 16;

/// Generate an opaque token of exactly `len` characters from `[A-Za-z0-9]`
///
/// Draws from the thread-local CSPRNG; `Alphanumeric` samples the 62 symbols
/// without modulo bias.
pub fn generate_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Short, log-safe prefix of a token
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}...", prefix)
}
