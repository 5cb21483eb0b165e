// ============================
// proxy-panel-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Operator passwords are stored as the hex encoded SHA-256 digest of the
//! plain text. This matches the existing credential files; it is a fast,
//! unsalted hash and not a password KDF.
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Hash a password to its hex encoded SHA-256 digest
pub fn hash_password(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

/// Verify a password against a stored hex digest in constant time.
///
/// Returns an error only when the stored digest itself is unreadable.
pub fn verify_password(plain: &str, stored_hex: &str) -> Result<bool, AppError> {
    let expected = hex::decode(stored_hex)
        .map_err(|_| AppError::Internal("stored password digest is not hex".to_string()))?;
    let actual = Sha256::digest(plain.as_bytes());
    Ok(actual.as_slice().ct_eq(&expected).into())
}
