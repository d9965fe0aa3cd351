//! Wallet types for the SplitVault ledger.
//!
//! Every user has an `available` balance (spendable) and a `pending`
//! balance (earmarked mid-operation, e.g. while a room contribution is
//! being settled). Both are always non-negative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user's wallet. Created once at signup, never deleted — only
/// deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    /// The owning user.
    pub user_id: UserId,
    /// Spendable balance.
    pub available: Decimal,
    /// Earmarked but not yet spendable (mid-operation holds).
    pub pending: Decimal,
    /// Fixed at account creation (e.g., "NGN").
    pub currency: String,
    /// Opaque external routing info for inbound bank transfers.
    pub virtual_account_number: Option<String>,
    /// Bank backing the virtual account number.
    pub virtual_account_bank: Option<String>,
    /// Deactivated wallets reject all mutations.
    pub active: bool,
}

impl Wallet {
    /// Create a zero-balance active wallet.
    #[must_use]
    pub fn new(user_id: UserId, currency: impl Into<String>) -> Self {
        Self {
            user_id,
            available: Decimal::ZERO,
            pending: Decimal::ZERO,
            currency: currency.into(),
            virtual_account_number: None,
            virtual_account_bank: None,
            active: true,
        }
    }

    /// Total balance (available + pending).
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.pending
    }

    /// Whether this wallet holds no funds at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.pending.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_wallet_is_zero_and_active() {
        let w = Wallet::new(UserId::new(), "NGN");
        assert_eq!(w.available, Decimal::ZERO);
        assert_eq!(w.pending, Decimal::ZERO);
        assert!(w.is_zero());
        assert!(w.active);
        assert_eq!(w.currency, "NGN");
    }

    #[test]
    fn wallet_total() {
        let mut w = Wallet::new(UserId::new(), "NGN");
        w.available = Decimal::new(100, 0);
        w.pending = Decimal::new(50, 0);
        assert_eq!(w.total(), Decimal::new(150, 0));
        assert!(!w.is_zero());
    }

    #[test]
    fn wallet_serde_roundtrip() {
        let mut w = Wallet::new(UserId::new(), "NGN");
        w.available = Decimal::new(12345, 2); // 123.45
        w.virtual_account_number = Some("9012345678".to_string());
        let json = serde_json::to_string(&w).unwrap();
        let back: Wallet = serde_json::from_str(&json).unwrap();
        assert_eq!(w, back);
    }
}
