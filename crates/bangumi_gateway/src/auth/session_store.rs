use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::token::{generate_token, redact, SESSION_TOKEN_LEN};
use crate::types::BangumiUser;

/// A signed-in user, keyed by its session token
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user: BangumiUser,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// In-memory session store
///
/// Cloning is cheap; clones share the same map. Each operation runs under
/// the DashMap shard lock for its key, so an expired record can never be
/// handed out by a concurrent `verify`.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionRecord>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::days(7))
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Mint a session for `user` and return its token
    pub fn issue(&self, user: BangumiUser) -> String {
        self.issue_at(user, Utc::now())
    }

    pub(crate) fn issue_at(&self, user: BangumiUser, now: DateTime<Utc>) -> String {
        let record = SessionRecord {
            user,
            created_at: now,
            expires_at: now + self.ttl,
        };

        loop {
            let token = generate_token(SESSION_TOKEN_LEN);
            if let Entry::Vacant(slot) = self.sessions.entry(token.clone()) {
                info!(
                    "[OK] Session {} issued for user {} (expires {})",
                    redact(&token),
                    record.user.id,
                    record.expires_at.to_rfc3339()
                );
                slot.insert(record);
                return token;
            }
        }
    }

    /// Look up a live session; an expired one is removed and reported absent
    pub fn verify(&self, token: &str) -> Option<SessionRecord> {
        self.verify_at(token, Utc::now())
    }

    pub(crate) fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<SessionRecord> {
        match self.sessions.entry(token.to_string()) {
            Entry::Occupied(entry) if entry.get().is_expired_at(now) => {
                debug!("Session {} expired, removing", redact(token));
                entry.remove();
                None
            }
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(_) => None,
        }
    }

    /// Drop a session; unknown tokens are ignored
    pub fn revoke(&self, token: &str) {
        if self.sessions.remove(token).is_some() {
            info!("[OK] Session {} revoked", redact(token));
        }
    }

    /// Remove every expired session, returning how many were dropped
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, record| !record.is_expired_at(now));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!("Swept {} expired sessions", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
