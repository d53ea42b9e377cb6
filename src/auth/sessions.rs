//! In-memory session store
//!
//! Maps access tokens to the login that produced them. Request handlers read
//! and insert concurrently while a background task periodically reclaims
//! sessions whose validity window has elapsed. Both paths decide liveness
//! through [`ValidityPolicy::is_live`] and nothing else.

use crate::auth::clock::{Clock, SystemClock};
use crate::auth::tokens::{RandomTokens, TokenSource};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long a session stays valid after login
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// How often expired sessions are reclaimed
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// Fresh draws attempted before giving up on finding an unused token
const MAX_ISSUE_ATTEMPTS: usize = 16;

/// A user as known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub name: String,
}

impl Identity {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One active login
#[derive(Debug, Clone)]
pub struct Session {
    /// Log-safe identifier (the token itself is never logged)
    pub id: Uuid,
    /// Bearer credential and map key
    pub token: String,
    pub user_id: i64,
    pub user_name: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not draw an unused access token after {0} attempts")]
    TokenSpaceExhausted(usize),
}

/// Decides whether a session is still inside its validity window
#[derive(Debug, Clone, Copy)]
pub struct ValidityPolicy {
    ttl: TimeDelta,
}

impl ValidityPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Live while the session's age is strictly below the TTL.
    pub fn is_live(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(session.issued_at) < self.ttl
    }
}

impl Default for ValidityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

/// Token → session map shared by every request handler and the reclaimer
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    policy: ValidityPolicy,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_parts(ttl, Arc::new(SystemClock), Arc::new(RandomTokens))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(ttl, clock, Arc::new(RandomTokens))
    }

    pub fn with_parts(ttl: Duration, clock: Arc<dyn Clock>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy: ValidityPolicy::new(ttl),
            clock,
            tokens,
        }
    }

    pub fn policy(&self) -> ValidityPolicy {
        self.policy
    }

    /// Start a new session for `identity` and return it.
    ///
    /// This is the only place the plaintext token is handed out. Earlier
    /// sessions for the same user are left untouched.
    pub fn issue(&self, identity: &Identity) -> Result<Session, SessionError> {
        for _ in 0..MAX_ISSUE_ATTEMPTS {
            // Draw outside the lock
            let token = self.tokens.generate();
            let issued_at = self.clock.now();

            let mut sessions = self.sessions.write();
            if sessions.contains_key(&token) {
                drop(sessions);
                warn!(user_id = identity.id, "Access token collision, drawing again");
                continue;
            }

            let session = Session {
                id: Uuid::new_v4(),
                token: token.clone(),
                user_id: identity.id,
                user_name: identity.name.clone(),
                issued_at,
            };
            sessions.insert(token, session.clone());
            drop(sessions);

            debug!(session_id = %session.id, user_id = session.user_id, "Issued session");
            return Ok(session);
        }

        Err(SessionError::TokenSpaceExhausted(MAX_ISSUE_ATTEMPTS))
    }

    /// Run `f` against the live session for `token`, if any.
    fn with_live<R>(&self, token: &str, f: impl FnOnce(&Session) -> R) -> Option<R> {
        let now = self.clock.now();
        let sessions = self.sessions.read();
        sessions
            .get(token)
            .filter(|session| self.policy.is_live(session, now))
            .map(f)
    }

    /// Whether `token` names a session inside its validity window
    pub fn is_valid(&self, token: &str) -> bool {
        self.with_live(token, |_| ()).is_some()
    }

    /// Whether `token` names a live session belonging to `user_id`
    pub fn owns_user(&self, token: &str, user_id: i64) -> bool {
        self.with_live(token, |session| session.user_id == user_id)
            .unwrap_or(false)
    }

    /// The live session for `token`
    pub fn lookup(&self, token: &str) -> Option<Session> {
        self.with_live(token, Session::clone)
    }

    /// Remove every session whose validity window has elapsed.
    ///
    /// Returns the number of sessions removed.
    pub fn reclaim(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| self.policy.is_live(session, now));
        let removed = before - sessions.len();
        let remaining = sessions.len();
        drop(sessions);

        debug!(removed, remaining, "Reclaimed expired sessions");
        removed
    }

    /// Number of sessions held, expired ones included until the next sweep
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Spawn the background sweep.
    ///
    /// The first sweep runs one `every` after spawning. The task exits once
    /// `shutdown` carries `true` or its sender is dropped.
    pub fn spawn_reclaimer(
        self: &Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let every = every.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() fires immediately on the first tick
            ticker.tick().await;

            info!(interval_secs = every.as_secs(), "Session reclaimer started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.reclaim();
                        if removed > 0 {
                            info!(removed, remaining = store.len(), "Expired sessions reclaimed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Session reclaimer stopped");
        })
    }
}
