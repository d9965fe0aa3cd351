//! Authentication gate — PIN lockout state machine.
//!
//! ## Design Principles
//!
//! - **Fail-closed**: a locked account fails every check immediately
//! - **No amplification**: checks while locked never touch the stored hash
//!   and never consume an attempt
//! - **Lazy unlock**: an expired lockout clears on the next check, with the
//!   attempt counter reset to zero

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use splitvault_types::{AuthLockState, PinCheck, PinPolicy, Result, UserId, VaultError};

use crate::pin;

/// Stored PIN credential: per-user random salt plus derived hash.
/// The PIN itself never exists server-side.
#[derive(Debug, Clone)]
struct PinCredential {
    salt: String,
    hash: String,
}

/// Guards every money-moving operation that requires step-up
/// authentication.
pub struct AuthGate {
    policy: PinPolicy,
    credentials: RwLock<HashMap<UserId, PinCredential>>,
    locks: RwLock<HashMap<UserId, AuthLockState>>,
}

fn poisoned() -> VaultError {
    VaultError::ConcurrencyConflict {
        reason: "auth gate lock poisoned".to_string(),
    }
}

impl AuthGate {
    /// Create a gate with the given lockout policy.
    #[must_use]
    pub fn new(policy: PinPolicy) -> Self {
        Self {
            policy,
            credentials: RwLock::new(HashMap::new()),
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Set up (or replace) a user's PIN. Generates a fresh random salt and
    /// stores only the derived hash.
    ///
    /// # Errors
    /// Returns [`VaultError::Validation`] for an empty PIN.
    pub fn setup_pin(&self, user_id: UserId, pin: &str) -> Result<()> {
        let salt = pin::generate_salt();
        let hash = pin::derive_pin_hash(pin, &salt)?;
        let mut creds = self.credentials.write().map_err(|_| poisoned())?;
        creds.insert(user_id, PinCredential { salt, hash });
        Ok(())
    }

    /// Whether a PIN has been set up for this user.
    pub fn has_pin(&self, user_id: UserId) -> bool {
        self.credentials
            .read()
            .map(|creds| creds.contains_key(&user_id))
            .unwrap_or(false)
    }

    /// Check a supplied PIN at the current time.
    ///
    /// # Errors
    /// Returns [`VaultError::PinNotSet`] if the user has no credential.
    pub fn check(&self, user_id: UserId, supplied_pin: &str) -> Result<PinCheck> {
        self.check_at(user_id, supplied_pin, Utc::now())
    }

    /// Check a supplied PIN at an explicit time (test seam).
    ///
    /// While locked this returns `PinCheck::locked(..)` without verifying
    /// the PIN or consuming an attempt.
    ///
    /// # Errors
    /// Returns [`VaultError::PinNotSet`] if the user has no credential.
    pub fn check_at(
        &self,
        user_id: UserId,
        supplied_pin: &str,
        now: DateTime<Utc>,
    ) -> Result<PinCheck> {
        let mut locks = self.locks.write().map_err(|_| poisoned())?;
        let state = locks.entry(user_id).or_default();

        if state.is_locked(now) {
            // Fail fast: the stored hash is never read, no KDF work runs,
            // and no attempt is consumed.
            return Ok(PinCheck::locked(state.locked_until.unwrap_or(now)));
        }
        state.clear_if_expired(now);

        let credential = {
            let creds = self.credentials.read().map_err(|_| poisoned())?;
            creds.get(&user_id).cloned().ok_or(VaultError::PinNotSet)?
        };

        if pin::verify_pin(supplied_pin, &credential.salt, &credential.hash)? {
            state.record_success();
            return Ok(PinCheck::ok());
        }

        match state.record_failure(self.policy.max_attempts, self.policy.lockout_window(), now) {
            Some(locked_until) => {
                tracing::warn!(user = %user_id, %locked_until, "PIN lockout triggered");
                Ok(PinCheck::locked(locked_until))
            }
            None => Ok(PinCheck::failed(
                self.policy.max_attempts - state.failed_attempts,
            )),
        }
    }

    /// Check and convert failure into an error — for services that must
    /// abort on a bad PIN.
    ///
    /// # Errors
    /// [`VaultError::AuthLocked`] / [`VaultError::AuthFailed`] /
    /// [`VaultError::PinNotSet`].
    pub fn require(&self, user_id: UserId, supplied_pin: &str, now: DateTime<Utc>) -> Result<()> {
        let check = self.check_at(user_id, supplied_pin, now)?;
        if check.success {
            return Ok(());
        }
        match check.locked_until {
            Some(locked_until) => Err(VaultError::AuthLocked { locked_until }),
            None => Err(VaultError::AuthFailed {
                attempts_remaining: check.attempts_remaining.unwrap_or(0),
            }),
        }
    }

    /// Current lockout state snapshot (for status endpoints).
    pub fn lock_state(&self, user_id: UserId) -> Result<AuthLockState> {
        let locks = self.locks.read().map_err(|_| poisoned())?;
        Ok(locks.get(&user_id).cloned().unwrap_or_default())
    }
}
