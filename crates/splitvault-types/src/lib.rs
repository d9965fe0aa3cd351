//! # splitvault-types
//!
//! Shared types, errors, and configuration for the **SplitVault** ledger
//! and escrow engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`EntryId`], [`RoomId`], [`ContributionId`], [`PlanId`], [`Reference`]
//! - **Wallet model**: [`Wallet`]
//! - **Ledger model**: [`LedgerEntry`], [`EntryType`], [`EntryStatus`]
//! - **Room model**: [`Room`], [`RoomStatus`], [`UnlockType`], [`Contribution`], [`RoomMembership`]
//! - **Plan model**: [`RecurringPlan`], [`Recurrence`], [`PlanStatus`]
//! - **Auth model**: [`AuthLockState`], [`PinCheck`]
//! - **Events**: [`EngineEvent`], [`EventSink`]
//! - **Configuration**: [`EngineConfig`], [`PinPolicy`], [`TierLimits`], [`SchedulerPolicy`]
//! - **Errors**: [`VaultError`] with `SV_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod auth;
pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod event;
pub mod ids;
pub mod plan;
pub mod room;

// Re-export all primary types at crate root for ergonomic imports:
//   use splitvault_types::{Wallet, LedgerEntry, Room, ...};

pub use account::*;
pub use auth::*;
pub use config::*;
pub use entry::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use plan::*;
pub use room::*;

// Constants are accessed via `splitvault_types::constants::FOO`
// (not re-exported to avoid name collisions).
