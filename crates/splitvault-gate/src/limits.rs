//! Transaction limit checker — hard gate for outflow amounts.
//!
//! Enforces, in order: the anti-dust floor, the per-transaction ceiling,
//! and the rolling daily ceiling (UTC calendar day). Limits vary by the
//! user's verification tier, which is read through the [`TierLookup`] seam
//! (an external configuration store in production).
//!
//! The check is advisory-then-enforced: it runs before the ledger mutation
//! and the whole operation aborts on failure with no partial effect.

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;
use splitvault_types::{LimitKind, LimitsConfig, Result, TierLimits, UserId, VaultError, VerificationTier};

/// Read-only tier source. Production backs this with the feature-flag /
/// verification store; tests use [`InMemoryTiers`].
pub trait TierLookup: Send + Sync {
    fn tier_for(&self, user_id: UserId) -> VerificationTier;
}

/// In-memory tier registry. Unknown users fall back to the default tier.
#[derive(Default)]
pub struct InMemoryTiers {
    tiers: RwLock<HashMap<UserId, VerificationTier>>,
}

impl InMemoryTiers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: UserId, tier: VerificationTier) {
        if let Ok(mut tiers) = self.tiers.write() {
            tiers.insert(user_id, tier);
        }
    }
}

impl TierLookup for InMemoryTiers {
    fn tier_for(&self, user_id: UserId) -> VerificationTier {
        self.tiers
            .read()
            .ok()
            .and_then(|tiers| tiers.get(&user_id).copied())
            .unwrap_or_default()
    }
}

/// Validates candidate amounts against the tier's configured ceilings.
pub struct LimitChecker {
    limits: LimitsConfig,
}

impl LimitChecker {
    /// Create a checker over the given limit rows.
    #[must_use]
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// The limit row applied to the given tier.
    #[must_use]
    pub fn limits_for(&self, tier: VerificationTier) -> &TierLimits {
        self.limits.for_tier(tier)
    }

    /// Validate a candidate amount.
    ///
    /// `spent_today` is the user's cumulative same-day outflow (including
    /// in-flight operations) as reported by the journal.
    ///
    /// # Errors
    /// Returns [`VaultError::LimitExceeded`] naming the violated limit.
    pub fn check(
        &self,
        amount: Decimal,
        spent_today: Decimal,
        tier: VerificationTier,
    ) -> Result<()> {
        let limits = self.limits.for_tier(tier);

        if amount < limits.min_transaction {
            return Err(VaultError::LimitExceeded {
                kind: LimitKind::Minimum,
                attempted: amount,
                limit: limits.min_transaction,
            });
        }
        if amount > limits.per_transaction_limit {
            return Err(VaultError::LimitExceeded {
                kind: LimitKind::PerTransaction,
                attempted: amount,
                limit: limits.per_transaction_limit,
            });
        }
        if spent_today + amount > limits.daily_limit {
            return Err(VaultError::LimitExceeded {
                kind: LimitKind::Daily,
                attempted: spent_today + amount,
                limit: limits.daily_limit,
            });
        }
        Ok(())
    }
}

impl Default for LimitChecker {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}
