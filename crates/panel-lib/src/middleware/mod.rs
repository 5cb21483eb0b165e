// crates/panel-lib/src/middleware/mod.rs

//! Request guards for the admin panel.

pub mod csrf;
pub mod rate_limit;
pub mod session;

pub use csrf::require_csrf;
pub use rate_limit::rate_limit;
pub use session::require_login;
