//! PIN key derivation and verification.
//!
//! PBKDF2-HMAC-SHA256 with 100,000 iterations over PIN + per-user salt,
//! producing a 32-byte digest stored as hex. The PIN itself is never
//! stored. Verification recomputes and compares in constant time.
//!
//! This module never errors on a mismatch — only on malformed input.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use splitvault_types::constants::{PIN_HASH_LEN, PIN_KDF_ITERATIONS, PIN_SALT_LEN};
use splitvault_types::{Result, VaultError};
use subtle::ConstantTimeEq;

/// Generate a fresh random per-user salt, hex-encoded.
#[must_use]
pub fn generate_salt() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; PIN_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive the stored hash for a PIN.
///
/// # Errors
/// Returns [`VaultError::Validation`] for an empty PIN or salt.
pub fn derive_pin_hash(pin: &str, salt: &str) -> Result<String> {
    if pin.is_empty() {
        return Err(VaultError::Validation {
            reason: "PIN must not be empty".to_string(),
        });
    }
    if salt.is_empty() {
        return Err(VaultError::Validation {
            reason: "Salt must not be empty".to_string(),
        });
    }

    let mut out = [0u8; PIN_HASH_LEN];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt.as_bytes(), PIN_KDF_ITERATIONS, &mut out);
    Ok(hex::encode(out))
}

/// Recompute and compare against a stored hash, in constant time.
///
/// Returns `false` on mismatch — never an error.
///
/// # Errors
/// Returns [`VaultError::Validation`] only for malformed input (empty PIN
/// or salt).
pub fn verify_pin(pin: &str, salt: &str, expected_hash: &str) -> Result<bool> {
    let computed = derive_pin_hash(pin, salt)?;
    Ok(computed.as_bytes().ct_eq(expected_hash.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let salt = generate_salt();
        let a = derive_pin_hash("1234", &salt).unwrap();
        let b = derive_pin_hash("1234", &salt).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), PIN_HASH_LEN * 2, "hex digest of the full output");
    }

    #[test]
    fn different_salts_differ() {
        let a = derive_pin_hash("1234", &generate_salt()).unwrap();
        let b = derive_pin_hash("1234", &generate_salt()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_pins_differ() {
        let salt = generate_salt();
        let a = derive_pin_hash("1234", &salt).unwrap();
        let b = derive_pin_hash("1235", &salt).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_matches() {
        let salt = generate_salt();
        let hash = derive_pin_hash("4321", &salt).unwrap();
        assert!(verify_pin("4321", &salt, &hash).unwrap());
    }

    #[test]
    fn verify_mismatch_is_false_not_error() {
        let salt = generate_salt();
        let hash = derive_pin_hash("4321", &salt).unwrap();
        assert!(!verify_pin("0000", &salt, &hash).unwrap());
    }

    #[test]
    fn empty_inputs_rejected() {
        assert!(matches!(
            derive_pin_hash("", "salt").unwrap_err(),
            VaultError::Validation { .. }
        ));
        assert!(matches!(
            derive_pin_hash("1234", "").unwrap_err(),
            VaultError::Validation { .. }
        ));
        assert!(verify_pin("", "salt", "whatever").is_err());
    }

    #[test]
    fn salt_is_unique_per_call() {
        assert_ne!(generate_salt(), generate_salt());
        assert_eq!(generate_salt().len(), PIN_SALT_LEN * 2);
    }
}
