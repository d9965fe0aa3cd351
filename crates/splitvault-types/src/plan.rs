//! # Recurring savings plan ("hourglass")
//!
//! A plan debits a fixed amount from its owner's wallet on every cycle
//! boundary and accumulates it in a sub-ledger (`current_saved`). The saved
//! amount only moves back to the wallet through an explicit cancel refund.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐  pause   ┌────────┐
//!   │ ACTIVE ├─────────▶│ PAUSED │
//!   │        │◀─────────┤        │
//!   └─┬────┬─┘  resume  └───┬────┘
//!     │    │ end date       │ cancel
//!     │    ▼                ▼
//!     │ ┌───────────┐  ┌───────────┐
//!     │ │ COMPLETED │  │ CANCELLED │
//!     │ └───────────┘  └───────────┘
//!     └── cancel ──────────▲
//! ```
//!
//! `Completed` and `Cancelled` are terminal.

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{PlanId, Result, UserId, VaultError};

/// How often a plan deducts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    /// The next cycle boundary after `from`.
    ///
    /// Monthly advancement clamps at month end (Jan 31 + 1 month =
    /// Feb 28/29), so a plan anchored on the 31st never skips February.
    #[must_use]
    pub fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Daily => from + chrono::Duration::days(1),
            Self::Weekly => from + chrono::Duration::days(7),
            Self::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or(from + chrono::Duration::days(30)),
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// The lifecycle state of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanStatus {
    /// Deductions apply on every due cycle.
    Active,
    /// Frozen: ticks skip this plan; `next_deduction_date` does not move.
    Paused,
    /// End date reached. **Terminal.**
    Completed,
    /// Cancelled and refunded. **Terminal.**
    Cancelled,
}

impl PlanStatus {
    /// Can this plan transition to the given target status?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Paused | Self::Completed | Self::Cancelled)
                | (Self::Paused, Self::Active | Self::Cancelled)
        )
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A recurring savings plan.
///
/// Invariant: while `Active`, exactly one deduction attempt is made per
/// elapsed cycle boundary. `current_saved` only increases via successful
/// deductions and only drops to zero via the cancel refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringPlan {
    pub id: PlanId,
    pub user_id: UserId,
    pub name: String,
    /// Savings goal. Informational — deductions continue until `end_date`.
    pub target_amount: Decimal,
    /// Accumulated sub-ledger balance.
    pub current_saved: Decimal,
    /// Fixed amount deducted per cycle.
    pub deduction_amount: Decimal,
    pub recurrence: Recurrence,
    /// Next cycle boundary. Frozen while paused.
    pub next_deduction_date: DateTime<Utc>,
    /// Deductions stop here; the plan completes.
    pub end_date: DateTime<Utc>,
    pub status: PlanStatus,
    /// Consecutive due cycles skipped for insufficient funds. Reset on any
    /// successful deduction.
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
}

impl RecurringPlan {
    /// Transition helper with the usual monotonic guard.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidPlanTransition`] for any transition the
    /// state machine does not allow.
    pub fn transition(&mut self, target: PlanStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(VaultError::InvalidPlanTransition {
                reason: format!("Cannot move plan {} from {} to {target}", self.id, self.status),
            });
        }
        self.status = target;
        Ok(())
    }
}
