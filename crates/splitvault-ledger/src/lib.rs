//! # splitvault-ledger
//!
//! **Money plane**: the single write path for every wallet balance, plus the
//! append-only journal of the events that produced them.
//!
//! ## Architecture
//!
//! 1. **`AccountStore`**: per-user wallets with available/pending accounting.
//!    Every mutation serializes against other operations on the same wallet;
//!    two-wallet transfers lock both in ascending user-id order so crossing
//!    transfers cannot deadlock.
//! 2. **`TransactionJournal`**: append-only ledger entries. A reference
//!    (idempotency key) is reserved when its entry is journaled and released
//!    only if the entry fails.
//!
//! ## Operation Flow
//!
//! ```text
//! service → journal.append(pending) → AccountStore mutation
//!         → journal.complete()  (or journal.fail() on abort)
//! ```
//!
//! The journal entry is durable before the balance moves, so no observer can
//! see a balance change without its causing entry.

pub mod accounts;
pub mod journal;

pub use accounts::AccountStore;
pub use journal::TransactionJournal;
