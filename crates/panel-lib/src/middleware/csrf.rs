// ============================
// crates/panel-lib/src/middleware/csrf.rs
// ============================
//! CSRF guard for state-changing routes.
//!
//! The token is read from the `csrf-token` request header or, for HTML
//! forms, from the `csrf-token` form field. It must have been issued for
//! the session named by the request's session cookie.
use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{debug, warn};

use super::session::{redirect_to_login, session_id_from_headers};
use crate::auth::CSRF_FIELD_NAME;
use crate::error::{wants_json, AppError};
use crate::metrics::CSRF_REJECTED;
use crate::AppState;

/// Largest form body buffered while looking for the token
const MAX_FORM_BYTES: usize = 64 * 1024;

fn token_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_FIELD_NAME)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Find the token in a url-encoded form body
pub fn token_from_form(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(name, value)| name == CSRF_FIELD_NAME && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn reject(err: AppError, json: bool) -> Response {
    counter!(CSRF_REJECTED).increment(1);
    let mut response = err.respond(json);
    // JSON clients get 400 for every CSRF failure
    if json {
        *response.status_mut() = StatusCode::BAD_REQUEST;
    }
    response
}

/// Require a valid CSRF token on every non-safe request
pub async fn require_csrf(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(request).await;
    }

    let json = wants_json(request.headers());

    // Prefer the header; otherwise buffer the form body and put it back afterwards
    let (token, mut request) = match token_from_header(request.headers()) {
        Some(token) => (Some(token), request),
        None if is_form(request.headers()) => {
            let (parts, body) = request.into_parts();
            let bytes = match body::to_bytes(body, MAX_FORM_BYTES).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    return AppError::InvalidInput(format!("unreadable form body: {e}")).respond(json)
                },
            };
            let token = token_from_form(&bytes);
            (token, Request::from_parts(parts, Body::from(bytes)))
        },
        None => (None, request),
    };

    let Some(token) = token else {
        warn!(path = %request.uri().path(), "request without CSRF token");
        return reject(AppError::MissingCsrfToken, json);
    };

    let Some(session_id) = session_id_from_headers(request.headers()) else {
        warn!(path = %request.uri().path(), "CSRF token without a session cookie");
        return reject(AppError::CsrfSessionMismatch, json);
    };

    let session = match state.sessions.get(&session_id).await {
        Ok(session) => session,
        Err(e) => {
            debug!(path = %request.uri().path(), "invalid session on CSRF check: {e}");
            return redirect_to_login(request.headers());
        },
    };

    if let Err(e) = state.csrf.verify(&token, &session.id) {
        warn!(path = %request.uri().path(), "CSRF check failed: {e}");
        return reject(e, json);
    }

    request.extensions_mut().insert(session);
    next.run(request).await
}
