//! # LedgerEntry — the immutable record of one balance-affecting event
//!
//! Every mutation of any wallet produces exactly one `LedgerEntry`. Entries
//! are append-only: once written, the only permitted change is the single
//! status transition out of `Pending`.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  commit    ┌───────────┐
//!   │ PENDING ├───────────▶│ COMPLETED │
//!   └────┬────┘            └───────────┘
//!        │ abort
//!        ▼
//!   ┌────────┐
//!   │ FAILED │
//!   └────────┘
//! ```
//!
//! Both terminal states are irreversible. An entry never stays `Pending`
//! past the operation that created it — the same call either completes or
//! fails it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EntryId, Reference, Result, UserId, VaultError};

/// What kind of money movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// External funds credited to a wallet (pre-validated by the payment
    /// collaborator).
    Topup,
    /// Peer-to-peer transfer between two wallets.
    Transfer,
    /// Wallet → room pool.
    RoomContribution,
    /// Room pool → creator wallet on release.
    RoomUnlock,
    /// Room pool → contributor wallet on archive.
    RoomRefund,
    /// Wallet → plan sub-ledger (and the reverse on cancel).
    RecurringDeduction,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Topup => write!(f, "topup"),
            Self::Transfer => write!(f, "transfer"),
            Self::RoomContribution => write!(f, "room_contribution"),
            Self::RoomUnlock => write!(f, "room_unlock"),
            Self::RoomRefund => write!(f, "room_refund"),
            Self::RecurringDeduction => write!(f, "recurring_deduction"),
        }
    }
}

/// The lifecycle state of a ledger entry.
///
/// Transitions are **monotonic** (never go backwards):
/// - `Pending → Completed` (the mutation committed)
/// - `Pending → Failed` (the mutation aborted; balances unchanged)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// The entry has been journaled but the balance mutation has not
    /// committed yet.
    Pending,
    /// The mutation committed. **Irreversible.**
    Completed,
    /// The mutation aborted with no balance change. **Irreversible.**
    Failed,
}

impl EntryStatus {
    /// Can this entry transition to the given target status?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Completed | Self::Failed)
        )
    }

    /// Whether this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// One immutable balance-affecting event.
///
/// `amount` is an unsigned magnitude; direction is carried by the
/// `from_account` / `to_account` pair. `None` on either side means an
/// external source (top-up) or an engine-held pool (room, plan sub-ledger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Globally unique entry identifier.
    pub id: EntryId,
    /// What kind of movement this records.
    pub entry_type: EntryType,
    /// Unsigned magnitude of the movement.
    pub amount: Decimal,
    /// Debited wallet, if any.
    pub from_account: Option<UserId>,
    /// Credited wallet, if any.
    pub to_account: Option<UserId>,
    /// Current lifecycle status.
    pub status: EntryStatus,
    /// Idempotency key. Unique among pending/completed entries.
    pub reference: Reference,
    /// Free-text description shown to users.
    pub description: Option<String>,
    /// The acting wallet's available balance immediately after commit
    /// (debited side for transfers, credited side for top-ups). Stored so
    /// an idempotent retry can return the original receipt.
    pub balance_after: Option<Decimal>,
    /// When the entry was journaled.
    pub created_at: DateTime<Utc>,
    /// When the entry completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the entry failed.
    pub failed_at: Option<DateTime<Utc>>,
    /// Why the entry failed.
    pub failure_reason: Option<String>,
}

impl LedgerEntry {
    /// Create a new `Pending` entry.
    #[must_use]
    pub fn new(
        entry_type: EntryType,
        amount: Decimal,
        from_account: Option<UserId>,
        to_account: Option<UserId>,
        reference: Reference,
    ) -> Self {
        Self {
            id: EntryId::new(),
            entry_type,
            amount,
            from_account,
            to_account,
            status: EntryStatus::Pending,
            reference,
            description: None,
            balance_after: None,
            created_at: Utc::now(),
            completed_at: None,
            failed_at: None,
            failure_reason: None,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Override the auto-generated id (used for deterministic per-cycle
    /// entries).
    #[must_use]
    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = id;
        self
    }

    /// Transition to `Completed`, recording the commit time and the
    /// debited wallet's post-commit balance.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidEntryTransition`] if the entry is
    /// already terminal.
    pub fn mark_completed(&mut self, balance_after: Option<Decimal>) -> Result<()> {
        if !self.status.can_transition_to(EntryStatus::Completed) {
            return Err(VaultError::InvalidEntryTransition {
                reason: format!("Cannot complete entry {} from {}", self.id, self.status),
            });
        }
        self.status = EntryStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.balance_after = balance_after;
        Ok(())
    }

    /// Transition to `Failed`, recording the abort time and reason.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidEntryTransition`] if the entry is
    /// already terminal.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        if !self.status.can_transition_to(EntryStatus::Failed) {
            return Err(VaultError::InvalidEntryTransition {
                reason: format!("Cannot fail entry {} from {}", self.id, self.status),
            });
        }
        self.status = EntryStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.failure_reason = Some(reason.into());
        Ok(())
    }
}
