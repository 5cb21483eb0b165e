// ============================
// crates/panel-lib/src/middleware/session.rs
// ============================
//! Session cookies and the login guard.
use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tracing::debug;

use crate::auth::Session;
use crate::error::AppError;
use crate::AppState;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE_NAME: &str = "psid";

/// Login page; public sessions are scoped to it
pub const LOGIN_PATH: &str = "/admin/login";

/// Landing page after a successful login
pub const DASHBOARD_PATH: &str = "/admin/dashboard";

/// Paths cookies may have been set on
const COOKIE_PATHS: [&str; 2] = ["/", LOGIN_PATH];

/// Iterate over the `name=value` pairs of every `Cookie` header
fn request_cookies(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim(), value.trim()))
        })
}

/// Session id presented by the client, if any
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    request_cookies(headers)
        .find(|(name, value)| *name == SESSION_COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Build the `Set-Cookie` value for a session
pub fn session_cookie(
    session_id: &str,
    path: &str,
    domain: &str,
    max_age: Duration,
) -> Result<HeaderValue, AppError> {
    let cookie = format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path={path}; Domain={domain}; Max-Age={}; Secure; HttpOnly; SameSite=Strict",
        max_age.as_secs()
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(format!("invalid session cookie: {e}")))
}

/// Build a `Set-Cookie` value that removes `name` at `path`
pub fn expired_cookie(name: &str, path: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{name}=; Path={path}; Max-Age=0")).ok()
}

/// Expire every cookie the client sent, on every path the panel uses
pub fn clear_cookies(request_headers: &HeaderMap, response_headers: &mut HeaderMap) {
    for (name, _) in request_cookies(request_headers) {
        for path in COOKIE_PATHS {
            if let Some(cookie) = expired_cookie(name, path) {
                response_headers.append(SET_COOKIE, cookie);
            }
        }
    }
}

/// 302 redirect to `location`
pub fn redirect(location: &'static str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

/// Redirect to the login page, clearing the client's cookies
pub fn redirect_to_login(request_headers: &HeaderMap) -> Response {
    let mut response = redirect(LOGIN_PATH);
    clear_cookies(request_headers, response.headers_mut());
    response
}

/// Resolve the request's session.
///
/// `Ok(None)` means no session cookie at all; an error means the cookie
/// names a session that is unknown or has expired.
pub async fn current_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Session>, AppError> {
    match session_id_from_headers(headers) {
        Some(id) => state.sessions.get(&id).await.map(Some),
        None => Ok(None),
    }
}

/// Require an authenticated session; the session is handed to handlers as
/// a request extension.
pub async fn require_login(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let session = match current_session(&state, request.headers()).await {
        Ok(Some(session)) if session.is_authenticated() => session,
        Ok(Some(_)) => {
            debug!(path = %request.uri().path(), "public session on a protected route");
            return redirect(LOGIN_PATH);
        },
        Ok(None) => {
            debug!(path = %request.uri().path(), "no session cookie");
            return redirect(LOGIN_PATH);
        },
        Err(e) => {
            debug!(path = %request.uri().path(), "invalid session: {e}");
            return redirect_to_login(request.headers());
        },
    };

    request.extensions_mut().insert(session);
    next.run(request).await
}
