// ==============
// crates/panel-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const CSRF_REJECTED: &str = "csrf.rejected";
pub const LOGIN_FAILED: &str = "login.failed";
pub const LOGIN_LOCKOUT: &str = "login.lockout";
pub const RATE_LIMITED: &str = "ratelimit.rejected";
pub const SWEEP_REMOVED: &str = "sweep.removed";
