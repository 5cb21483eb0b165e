// ============================
// proxy-panel-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod csrf;
pub mod lockout;
pub mod password;
pub mod session;
pub mod token_generator;

pub use csrf::{CsrfCodec, CSRF_FIELD_NAME};
pub use lockout::{AttemptOutcome, LoginLockout};
pub use password::{hash_password, verify_password};
pub use session::{Session, SessionManager};
