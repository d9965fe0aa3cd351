//! Configuration types for the SplitVault engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;

/// A user's verification tier. Determines which limit row applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationTier {
    /// Unverified user — tighter ceilings.
    #[default]
    Default,
    /// Identity-verified user — raised ceilings.
    Verified,
}

/// Transfer ceilings for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Rolling daily ceiling (UTC calendar day).
    pub daily_limit: Decimal,
    /// Single-operation ceiling.
    pub per_transaction_limit: Decimal,
    /// Anti-dust floor.
    pub min_transaction: Decimal,
}

impl TierLimits {
    /// Limit row for the default tier.
    #[must_use]
    pub fn default_tier() -> Self {
        Self {
            daily_limit: Decimal::new(constants::DEFAULT_DAILY_LIMIT, 0),
            per_transaction_limit: Decimal::new(constants::DEFAULT_PER_TRANSACTION_LIMIT, 0),
            min_transaction: Decimal::new(constants::MIN_TRANSACTION, 0),
        }
    }

    /// Limit row for the verified tier.
    #[must_use]
    pub fn verified_tier() -> Self {
        Self {
            daily_limit: Decimal::new(constants::VERIFIED_DAILY_LIMIT, 0),
            per_transaction_limit: Decimal::new(constants::VERIFIED_PER_TRANSACTION_LIMIT, 0),
            min_transaction: Decimal::new(constants::MIN_TRANSACTION, 0),
        }
    }
}

/// Limit rows per tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub default: TierLimits,
    pub verified: TierLimits,
}

impl LimitsConfig {
    /// The limit row for the given tier.
    #[must_use]
    pub fn for_tier(&self, tier: VerificationTier) -> &TierLimits {
        match tier {
            VerificationTier::Default => &self.default,
            VerificationTier::Verified => &self.verified,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default: TierLimits::default_tier(),
            verified: TierLimits::verified_tier(),
        }
    }
}

/// PIN lockout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinPolicy {
    /// Consecutive failures before lockout.
    pub max_attempts: u32,
    /// Lockout window in seconds.
    pub lockout_window_secs: i64,
}

impl PinPolicy {
    /// The lockout window as a `chrono::Duration`.
    #[must_use]
    pub fn lockout_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lockout_window_secs)
    }
}

impl Default for PinPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_PIN_ATTEMPTS,
            lockout_window_secs: constants::DEFAULT_LOCKOUT_WINDOW_SECS,
        }
    }
}

/// Recurring-deduction sweep policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerPolicy {
    /// Auto-pause a plan after this many consecutive insufficient-funds
    /// cycles. `None` retries indefinitely on every tick.
    pub max_consecutive_failures: Option<u32>,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub pin: PinPolicy,
    pub limits: LimitsConfig,
    pub scheduler: SchedulerPolicy,
}
