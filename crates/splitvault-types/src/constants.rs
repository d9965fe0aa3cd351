//! System-wide constants for the SplitVault engine.

/// PBKDF2 iteration count for PIN hashing.
pub const PIN_KDF_ITERATIONS: u32 = 100_000;

/// PIN hash output length in bytes (hex digest is twice this).
pub const PIN_HASH_LEN: usize = 32;

/// Per-user PIN salt length in bytes.
pub const PIN_SALT_LEN: usize = 16;

/// Consecutive wrong-PIN attempts before lockout.
pub const DEFAULT_MAX_PIN_ATTEMPTS: u32 = 5;

/// Lockout window in seconds (15 minutes).
pub const DEFAULT_LOCKOUT_WINDOW_SECS: i64 = 900;

/// Daily transfer ceiling for the default tier.
pub const DEFAULT_DAILY_LIMIT: i64 = 1_000_000;

/// Per-transaction ceiling for the default tier.
pub const DEFAULT_PER_TRANSACTION_LIMIT: i64 = 500_000;

/// Daily transfer ceiling for the verified tier.
pub const VERIFIED_DAILY_LIMIT: i64 = 5_000_000;

/// Per-transaction ceiling for the verified tier.
pub const VERIFIED_PER_TRANSACTION_LIMIT: i64 = 1_000_000;

/// Anti-dust floor for any transfer (both tiers).
pub const MIN_TRANSACTION: i64 = 100;

/// Invite code length for money rooms.
pub const INVITE_CODE_LEN: usize = 8;

/// How many collision-checked invite code draws before giving up.
pub const INVITE_CODE_MAX_ATTEMPTS: usize = 32;

/// Wallet currency assigned at signup when none is specified.
pub const DEFAULT_CURRENCY: &str = "NGN";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "SplitVault";
