// ============================
// crates/panel-lib/src/auth/lockout.rs
// ============================
//! Per-username lockout after repeated failed logins.

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::metrics::LOGIN_LOCKOUT;
use crate::sweeper::Sweep;

/// Failed login bookkeeping for one username
#[derive(Debug, Clone)]
struct AttemptRecord {
    /// Number of failed attempts
    failed_attempts: u32,
    /// When the lockout expires; in the past while the account is open
    locked_until: Instant,
}

/// Result of recording a failed login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Still open, with this many attempts left before a lockout
    Failed { remaining: u32 },
    /// This failure reached the threshold and started a lockout
    LockedOut,
}

/// Tracks failed logins per username and enforces a temporary lockout
#[derive(Debug, Clone)]
pub struct LoginLockout {
    /// Map of usernames to attempt records
    attempts: Arc<DashMap<String, AttemptRecord>>,
    /// Failed attempts that trigger a lockout
    max_attempts: u32,
    /// Duration of lockout period
    lockout_duration: Duration,
}

impl LoginLockout {
    /// Create a new lockout limiter
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    /// Check whether `username` is currently locked out
    pub fn is_locked_out(&self, username: &str) -> bool {
        let Some(mut entry) = self.attempts.get_mut(username) else {
            return false;
        };
        let now = Instant::now();
        if now < entry.locked_until {
            return true;
        }

        // A served lockout starts counting again from zero
        if entry.failed_attempts >= self.max_attempts {
            entry.failed_attempts = 0;
        }
        false
    }

    /// Record a failed login for `username`.
    ///
    /// Returns [`AttemptOutcome::LockedOut`] exactly once per lockout, on the
    /// attempt that reaches the threshold. Later failures keep counting
    /// without signalling again.
    pub fn record_failed_attempt(&self, username: &str) -> AttemptOutcome {
        let now = Instant::now();

        // Check if entry exists, if not create it
        let mut entry = self
            .attempts
            .entry(username.to_string())
            .or_insert_with(|| AttemptRecord {
                failed_attempts: 0,
                locked_until: now,
            });

        // Reset if a previous lockout has run out
        if entry.failed_attempts >= self.max_attempts && now >= entry.locked_until {
            entry.failed_attempts = 0;
        }

        entry.failed_attempts = entry.failed_attempts.saturating_add(1);

        if entry.failed_attempts == self.max_attempts {
            entry.locked_until = now + self.lockout_duration;
            counter!(LOGIN_LOCKOUT).increment(1);
            warn!(
                username,
                minutes = self.lockout_duration.as_secs() / 60,
                "account locked out after repeated failed logins"
            );
            return AttemptOutcome::LockedOut;
        }

        AttemptOutcome::Failed {
            remaining: self.max_attempts.saturating_sub(entry.failed_attempts),
        }
    }

    /// Forget every failure for `username` after a successful login
    pub fn reset_attempts(&self, username: &str) {
        self.attempts.remove(username);
    }

    /// Failures currently counted against `username`
    pub fn failed_attempts(&self, username: &str) -> u32 {
        self.attempts
            .get(username)
            .map_or(0, |entry| entry.failed_attempts)
    }

    /// Remove records whose lockout has passed and whose count is back at zero.
    ///
    /// Records that still carry failures are kept until the next login
    /// attempt for that username touches them.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.attempts.len();
        self.attempts
            .retain(|_, entry| !(now >= entry.locked_until && entry.failed_attempts == 0));
        before.saturating_sub(self.attempts.len())
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

#[async_trait]
impl Sweep for LoginLockout {
    fn name(&self) -> &'static str {
        "lockout"
    }

    async fn sweep(&self) -> usize {
        self.remove_expired()
    }
}
