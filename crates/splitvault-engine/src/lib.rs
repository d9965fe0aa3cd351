//! # splitvault-engine
//!
//! **Operations plane**: the money-moving services built on the ledger and
//! the security envelope.
//!
//! ## Architecture
//!
//! 1. **`TransferService`**: peer-to-peer transfers and top-ups, with PIN
//!    step-up, tier limits, and idempotent retries
//! 2. **`RoomEngine`**: pooled escrow — contributions, conditional release,
//!    refunds
//! 3. **`HourglassScheduler`**: recurring savings deductions driven by an
//!    external tick
//!
//! ## Operation Flow
//!
//! ```text
//! request → AuthGate (if PIN supplied) → LimitChecker
//!         → journal.append(pending) → AccountStore mutation
//!         → journal.complete() → EventSink
//! ```
//!
//! Every operation is a bounded transactional step: it either commits the
//! balance move together with its ledger entry, or leaves no trace beyond
//! a `Failed` audit entry.

pub mod rooms;
pub mod scheduler;
pub mod transfer;

pub use rooms::{CreateRoomReceipt, RoomEngine};
pub use scheduler::{DeductionOutcome, DeductionResult, HourglassScheduler};
pub use transfer::{TransferReceipt, TransferRequest, TransferService};
