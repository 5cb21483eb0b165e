// ============================
// proxy-panel-lib/src/auth/csrf.rs
// ============================
//! Stateless CSRF tokens bound to a session.
//!
//! A token has the form `base64(hmac) + "." + session_id + "!" + nonce`
//! where `hmac = HMAC-SHA256(secret, session_id + "!" + nonce)`. Nothing is
//! stored on the server; a token stays valid for as long as the session it
//! names is alive, and may be reused any number of times.
use std::fmt;

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::token_generator::{generate_secure_token_with_size, NONCE_BYTES};
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the form field and request header carrying the token
pub const CSRF_FIELD_NAME: &str = "csrf-token";

/// Issues and checks CSRF tokens with one shared signing secret
#[derive(Clone)]
pub struct CsrfCodec {
    secret: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for CsrfCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl CsrfCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Zeroizing::new(secret.as_ref().to_vec()),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("invalid CSRF key: {e}")))
    }

    /// Issue a fresh token for `session_id`
    pub fn issue(&self, session_id: &str) -> Result<String, AppError> {
        let nonce = generate_secure_token_with_size(NONCE_BYTES)?;
        let message = format!("{session_id}!{nonce}");

        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!("{}.{message}", URL_SAFE.encode(signature)))
    }

    /// Check that `token` was issued by this codec for `session_id`.
    ///
    /// The signature is compared in constant time. The embedded session id
    /// is compared with plain string equality.
    pub fn verify(&self, token: &str, session_id: &str) -> Result<(), AppError> {
        let (signature, message) = token
            .split_once('.')
            .ok_or(AppError::MalformedToken("missing signature separator"))?;
        let (embedded_session, _nonce) = message
            .split_once('!')
            .ok_or(AppError::MalformedToken("missing nonce separator"))?;

        if embedded_session != session_id {
            return Err(AppError::CsrfSessionMismatch);
        }

        let signature = URL_SAFE
            .decode(signature)
            .map_err(|_| AppError::MalformedToken("signature is not base64"))?;

        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AppError::SignatureMismatch)
    }
}
