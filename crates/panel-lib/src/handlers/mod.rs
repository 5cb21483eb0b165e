// ============================
// crates/panel-lib/src/handlers/mod.rs
// ============================
//! HTTP route handlers.

pub mod accounts;
pub mod auth;
pub mod dashboard;
pub mod server;

use axum::{
    http::{HeaderMap, Uri},
    response::Response,
};

use crate::error::{wants_json, AppError};

/// Fallback for unknown paths
pub async fn not_found(uri: Uri, headers: HeaderMap) -> Response {
    AppError::NotFound(uri.path().to_string()).respond(wants_json(&headers))
}
