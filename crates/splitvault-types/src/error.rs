//! Error types for the SplitVault engine.
//!
//! All errors use the `SV_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors
//! - 2xx: Ledger / balance errors
//! - 3xx: Authentication errors
//! - 4xx: Limit errors
//! - 5xx: Room / escrow errors
//! - 6xx: Recurring plan errors
//! - 7xx: Concurrency errors
//! - 9xx: General / internal errors

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{PlanId, PlanStatus, Reference, RoomId, RoomStatus, UserId};

/// Which configured limit a rejected operation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LimitKind {
    /// Single-operation ceiling.
    PerTransaction,
    /// Rolling daily ceiling (UTC calendar day).
    Daily,
    /// Anti-dust floor.
    Minimum,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerTransaction => write!(f, "per-transaction"),
            Self::Daily => write!(f, "daily"),
            Self::Minimum => write!(f, "minimum"),
        }
    }
}

/// Central error enum for all SplitVault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The request failed validation (bad amount, missing date, etc.).
    #[error("SV_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// Sender and recipient are the same user.
    #[error("SV_ERR_101: Cannot transfer to self")]
    SelfTransfer,

    // =================================================================
    // Ledger / Balance Errors (2xx)
    // =================================================================
    /// Not enough available balance to perform the operation.
    #[error("SV_ERR_200: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    /// A balance operation would produce a negative value.
    #[error("SV_ERR_201: Balance underflow")]
    BalanceUnderflow,

    /// No wallet exists for this user.
    #[error("SV_ERR_202: Account not found: {0}")]
    AccountNotFound(UserId),

    /// The wallet has been deactivated and rejects mutations.
    #[error("SV_ERR_203: Account deactivated: {0}")]
    AccountInactive(UserId),

    /// An account with this user id already exists.
    #[error("SV_ERR_204: Account already exists: {0}")]
    DuplicateAccount(UserId),

    /// Sender and recipient wallets hold different currencies.
    #[error("SV_ERR_205: Currency mismatch: {from} vs {to}")]
    CurrencyMismatch { from: String, to: String },

    /// This idempotency reference is already owned by a pending or
    /// completed entry.
    #[error("SV_ERR_206: Reference already used: {0}")]
    DuplicateReference(Reference),

    /// A ledger entry cannot leave its terminal status.
    #[error("SV_ERR_207: Invalid entry status transition: {reason}")]
    InvalidEntryTransition { reason: String },

    /// The referenced ledger entry does not exist.
    #[error("SV_ERR_208: Ledger entry not found")]
    EntryNotFound,

    // =================================================================
    // Authentication Errors (3xx)
    // =================================================================
    /// Wrong PIN. Reports how many attempts remain before lockout.
    #[error("SV_ERR_300: PIN verification failed ({attempts_remaining} attempts remaining)")]
    AuthFailed { attempts_remaining: u32 },

    /// The account is PIN-locked until the given time.
    #[error("SV_ERR_301: PIN locked until {locked_until}")]
    AuthLocked { locked_until: DateTime<Utc> },

    /// No PIN has been set up for this user.
    #[error("SV_ERR_302: PIN not set up")]
    PinNotSet,

    // =================================================================
    // Limit Errors (4xx)
    // =================================================================
    /// A configured transaction limit was hit. Reports which one.
    #[error("SV_ERR_400: {kind} limit exceeded: attempted {attempted}, limit {limit}")]
    LimitExceeded {
        kind: LimitKind,
        attempted: Decimal,
        limit: Decimal,
    },

    // =================================================================
    // Room / Escrow Errors (5xx)
    // =================================================================
    /// The requested room was not found.
    #[error("SV_ERR_500: Room not found: {0}")]
    RoomNotFound(RoomId),

    /// The room is not open for this operation.
    #[error("SV_ERR_501: Room {room_id} is {status}, not OPEN")]
    RoomNotOpen { room_id: RoomId, status: RoomStatus },

    /// No room matches this invite code.
    #[error("SV_ERR_502: Unknown invite code")]
    InviteCodeNotFound,

    /// A room state transition was attempted out of order.
    #[error("SV_ERR_503: Invalid room transition: {reason}")]
    InvalidRoomTransition { reason: String },

    /// Only the room creator may perform this action.
    #[error("SV_ERR_504: Not the room creator")]
    NotRoomCreator,

    // =================================================================
    // Recurring Plan Errors (6xx)
    // =================================================================
    /// The requested plan was not found.
    #[error("SV_ERR_600: Plan not found: {0}")]
    PlanNotFound(PlanId),

    /// The plan is not in the status this operation requires.
    #[error("SV_ERR_601: Plan {plan_id} is {status}")]
    PlanNotActive { plan_id: PlanId, status: PlanStatus },

    /// A plan state transition was attempted out of order.
    #[error("SV_ERR_602: Invalid plan transition: {reason}")]
    InvalidPlanTransition { reason: String },

    // =================================================================
    // Concurrency Errors (7xx)
    // =================================================================
    /// Lost a race on an account lock. Transient — safe to retry the
    /// whole operation from the top.
    #[error("SV_ERR_700: Concurrency conflict: {reason}")]
    ConcurrencyConflict { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error. Guaranteed: no partial ledger
    /// mutation occurred.
    #[error("SV_ERR_900: Internal error: {0}")]
    Internal(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, VaultError>;
