use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::token::{generate_token, STATE_TOKEN_LEN};

/// An authorization attempt waiting for its callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthState {
    pub created_at: DateTime<Utc>,
    pub redirect_uri: String,
}

/// One-time OAuth `state` values
///
/// `consume` removes the entry in the same call that reads it, so two
/// callbacks replaying one state cannot both succeed.
#[derive(Clone)]
pub struct StateStore {
    states: Arc<DashMap<String, PendingAuthState>>,
    ttl: Duration,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Duration::minutes(10))
    }
}

impl StateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Record a pending authorization and return its fresh state value
    pub fn issue(&self, redirect_uri: &str) -> String {
        self.issue_at(redirect_uri, Utc::now())
    }

    pub(crate) fn issue_at(&self, redirect_uri: &str, now: DateTime<Utc>) -> String {
        loop {
            let state = generate_token(STATE_TOKEN_LEN);
            if let Entry::Vacant(slot) = self.states.entry(state.clone()) {
                slot.insert(PendingAuthState {
                    created_at: now,
                    redirect_uri: redirect_uri.to_string(),
                });
                return state;
            }
        }
    }

    /// Take a pending state out of the store; expired states are dropped and reported absent
    pub fn consume(&self, state: &str) -> Option<PendingAuthState> {
        self.consume_at(state, Utc::now())
    }

    pub(crate) fn consume_at(&self, state: &str, now: DateTime<Utc>) -> Option<PendingAuthState> {
        let (_, pending) = self.states.remove(state)?;
        if self.is_expired(&pending, now) {
            debug!("OAuth state expired before callback");
            return None;
        }
        Some(pending)
    }

    /// Remove abandoned authorization attempts
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.states.len();
        self.states.retain(|_, pending| !self.is_expired(pending, now));
        let removed = before.saturating_sub(self.states.len());
        if removed > 0 {
            debug!("Swept {} abandoned OAuth states", removed);
        }
        removed
    }

    fn is_expired(&self, pending: &PendingAuthState, now: DateTime<Utc>) -> bool {
        pending.created_at + self.ttl < now
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
