// ============================
// crates/panel-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
/** Secure random values for authentication
This module draws session identifiers and CSRF nonces from the OS
entropy source. Failures are reported instead of panicking so a broken
RNG only fails the request that needed it. */
use rand::{rngs::OsRng, TryRngCore};

use crate::error::AppError;

/// Session identifier size in bytes (256 bits of entropy)
pub const SESSION_ID_BYTES: usize = 32;

/// CSRF nonce size in bytes
pub const NONCE_BYTES: usize = 16;

/// Fill a fresh buffer of `len` bytes from the OS RNG
pub fn random_bytes(len: usize) -> Result<Vec<u8>, AppError> {
    let mut buffer = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buffer)
        .map_err(|e| AppError::RandomSource(e.to_string()))?;
    Ok(buffer)
}

/** Generate a session identifier
# Returns
32 random bytes, base64 URL-safe encoded with padding */
pub fn generate_session_id() -> Result<String, AppError> {
    generate_secure_token_with_size(SESSION_ID_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes
# Returns
A base64 URL-safe encoded string */
pub fn generate_secure_token_with_size(bytes: usize) -> Result<String, AppError> {
    Ok(URL_SAFE.encode(random_bytes(bytes)?))
}
