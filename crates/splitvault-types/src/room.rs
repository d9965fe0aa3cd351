//! # Money Room — pooled escrow with conditional release
//!
//! A room collects contributions from its members into a pool held by the
//! engine. When the unlock condition is met the whole pool is credited to
//! the creator; an abandoned room is archived and every contributor is
//! refunded.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  condition met   ┌──────────┐
//!   │ OPEN ├─────────────────▶│ UNLOCKED │
//!   └──┬───┘                  └──────────┘
//!      │ refund
//!      ▼
//!   ┌──────────┐
//!   │ ARCHIVED │
//!   └──────────┘
//! ```
//!
//! Both terminal states are irreversible — a room never returns to OPEN.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ContributionId, EntryId, Result, RoomId, UserId, VaultError};

/// What releases a room's pool.
///
/// The persisted enum is explicitly four-way: the product's "both" option
/// is `TargetAndDate`, not a collapse into `Manual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnlockType {
    /// Unlocks once `current_amount >= target_amount`.
    TargetReached,
    /// Unlocks once `now >= unlock_date`.
    DateReached,
    /// Unlocks once both the target is met and the date has passed.
    TargetAndDate,
    /// Never auto-unlocks; only an explicit creator action releases or
    /// archives it.
    Manual,
}

impl UnlockType {
    /// Whether this type requires a positive `target_amount`.
    #[must_use]
    pub fn requires_target(&self) -> bool {
        matches!(self, Self::TargetReached | Self::TargetAndDate)
    }

    /// Whether this type requires a future `unlock_date`.
    #[must_use]
    pub fn requires_date(&self) -> bool {
        matches!(self, Self::DateReached | Self::TargetAndDate)
    }
}

/// The lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomStatus {
    /// Accepting contributions.
    Open,
    /// Pool released to the creator. **Irreversible.**
    Unlocked,
    /// Pool refunded to contributors. **Irreversible.**
    Archived,
}

impl RoomStatus {
    /// Can this room transition to the given target status?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Open, Self::Unlocked | Self::Archived))
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Unlocked => write!(f, "UNLOCKED"),
            Self::Archived => write!(f, "ARCHIVED"),
        }
    }
}

/// A pooled escrow room.
///
/// Invariant: `current_amount` equals the sum of all confirmed
/// contributions for this room. It may exceed `target_amount` — the pool is
/// not capped, and the full amount is released on unlock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub creator_id: UserId,
    pub name: String,
    /// Release goal. Zero for rooms whose unlock type carries no target.
    pub target_amount: Decimal,
    /// Sum of confirmed contributions.
    pub current_amount: Decimal,
    pub unlock_type: UnlockType,
    /// Required when `unlock_type.requires_date()`.
    pub unlock_date: Option<DateTime<Utc>>,
    pub status: RoomStatus,
    /// Unique join code, generated at creation.
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Create a new open room. Validates the target/date requirements of
    /// the unlock type.
    ///
    /// # Errors
    /// Returns [`VaultError::Validation`] if the unlock type requires a
    /// target but `target_amount <= 0`, or requires a date but
    /// `unlock_date` is missing or not strictly in the future.
    pub fn new(
        creator_id: UserId,
        name: impl Into<String>,
        target_amount: Decimal,
        unlock_type: UnlockType,
        unlock_date: Option<DateTime<Utc>>,
        invite_code: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(VaultError::Validation {
                reason: "Room name must not be empty".to_string(),
            });
        }
        if unlock_type.requires_target() && target_amount <= Decimal::ZERO {
            return Err(VaultError::Validation {
                reason: "Target amount must be positive".to_string(),
            });
        }
        if unlock_type.requires_date() {
            match unlock_date {
                Some(date) if date > now => {}
                Some(_) => {
                    return Err(VaultError::Validation {
                        reason: "Unlock date must be in the future".to_string(),
                    });
                }
                None => {
                    return Err(VaultError::Validation {
                        reason: "Unlock date is required for this unlock type".to_string(),
                    });
                }
            }
        }

        Ok(Self {
            id: RoomId::new(),
            creator_id,
            name,
            target_amount,
            current_amount: Decimal::ZERO,
            unlock_type,
            unlock_date,
            status: RoomStatus::Open,
            invite_code,
            created_at: now,
        })
    }

    /// Whether the room's automatic unlock condition holds at `now`.
    ///
    /// `Manual` rooms never satisfy this — they are released explicitly.
    #[must_use]
    pub fn unlock_due(&self, now: DateTime<Utc>) -> bool {
        if self.status != RoomStatus::Open {
            return false;
        }
        let target_met = self.current_amount >= self.target_amount;
        let date_passed = self.unlock_date.is_some_and(|d| now >= d);
        match self.unlock_type {
            UnlockType::TargetReached => target_met,
            UnlockType::DateReached => date_passed,
            UnlockType::TargetAndDate => target_met && date_passed,
            UnlockType::Manual => false,
        }
    }

    /// Transition to `Unlocked`.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidRoomTransition`] if the room is not open.
    pub fn mark_unlocked(&mut self) -> Result<()> {
        if !self.status.can_transition_to(RoomStatus::Unlocked) {
            return Err(VaultError::InvalidRoomTransition {
                reason: format!("Cannot unlock room {} from {}", self.id, self.status),
            });
        }
        self.status = RoomStatus::Unlocked;
        Ok(())
    }

    /// Transition to `Archived`.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidRoomTransition`] if the room is not open.
    pub fn mark_archived(&mut self) -> Result<()> {
        if !self.status.can_transition_to(RoomStatus::Archived) {
            return Err(VaultError::InvalidRoomTransition {
                reason: format!("Cannot archive room {} from {}", self.id, self.status),
            });
        }
        self.status = RoomStatus::Archived;
        Ok(())
    }
}

/// The lifecycle state of one contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContributionStatus {
    /// Funds held, not yet added to the pool.
    Pending,
    /// Funds in the pool. Counts toward `current_amount`.
    Confirmed,
    /// Funds returned to the contributor on archive.
    Refunded,
}

/// One user's payment into a room.
///
/// A user may contribute many times to the same room; rows are aggregated
/// for display, never merged in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub status: ContributionStatus,
    /// The ledger entry that moved the funds.
    pub transaction_id: EntryId,
    pub timestamp: DateTime<Utc>,
}

/// Membership row. Join is idempotent — joining twice is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomMembership {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}
