//! # splitvault-gate
//!
//! **Security Envelope**: PIN hashing, the lockout state machine, and
//! tier-aware transaction limits.
//!
//! ## Architecture
//!
//! The gate sits between the API layer and the money plane:
//! 1. **`pin`**: PBKDF2-HMAC-SHA256 derivation and constant-time verify
//! 2. **`AuthGate`**: per-user credentials + lockout (fail-closed)
//! 3. **`LimitChecker`**: floor / per-transaction / daily ceilings per tier
//!
//! ## Request Flow
//!
//! ```text
//! API → AuthGate.check() → LimitChecker.check() → ledger mutation
//! ```
//!
//! Every money-moving request that carries a PIN **must** pass the gate
//! before any balance is touched.

pub mod limits;
pub mod lockout;
pub mod pin;

pub use limits::{InMemoryTiers, LimitChecker, TierLookup};
pub use lockout::AuthGate;
