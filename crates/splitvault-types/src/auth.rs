//! PIN lockout state, per user.
//!
//! The state machine itself lives here; the gate that orchestrates it
//! (credential storage, hash verification) is in `splitvault-gate`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user lockout bookkeeping.
///
/// Invariant: once `failed_attempts` reaches the configured threshold,
/// `locked_until` is set and every check fails fast until that time passes;
/// the next successful check after expiry resets attempts to 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthLockState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl AuthLockState {
    /// Whether the lockout window is still in force at `now`.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Lazily clear an expired lockout. Returns `true` if a reset happened.
    pub fn clear_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.locked_until.is_some_and(|until| now >= until) {
            self.failed_attempts = 0;
            self.locked_until = None;
            return true;
        }
        false
    }

    /// Record a failed attempt. Locks once `max_attempts` is reached.
    /// Returns the new lockout expiry if this failure triggered the lock.
    pub fn record_failure(
        &mut self,
        max_attempts: u32,
        lockout_window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.failed_attempts += 1;
        if self.failed_attempts >= max_attempts {
            let until = now + lockout_window;
            self.locked_until = Some(until);
            return Some(until);
        }
        None
    }

    /// Record a successful attempt: counter and lock reset.
    pub fn record_success(&mut self) {
        self.failed_attempts = 0;
        self.locked_until = None;
    }
}

/// Outcome of one PIN check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCheck {
    pub success: bool,
    /// Attempts left before lockout. `None` on success or while locked.
    pub attempts_remaining: Option<u32>,
    /// Set when the account is (or just became) locked.
    pub locked_until: Option<DateTime<Utc>>,
}

impl PinCheck {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            attempts_remaining: None,
            locked_until: None,
        }
    }

    #[must_use]
    pub fn failed(attempts_remaining: u32) -> Self {
        Self {
            success: false,
            attempts_remaining: Some(attempts_remaining),
            locked_until: None,
        }
    }

    #[must_use]
    pub fn locked(until: DateTime<Utc>) -> Self {
        Self {
            success: false,
            attempts_remaining: None,
            locked_until: Some(until),
        }
    }
}
