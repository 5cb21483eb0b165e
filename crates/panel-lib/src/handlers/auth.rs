// ============================
// crates/panel-lib/src/handlers/auth.rs
// ============================
//! Login and logout.
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use metrics::counter;
use proxy_panel_common::{LoginForm, LoginView};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::auth::{verify_password, AttemptOutcome, Session, CSRF_FIELD_NAME};
use crate::error::{wants_json, AppError};
use crate::metrics::LOGIN_FAILED;
use crate::middleware::session::{
    clear_cookies, current_session, expired_cookie, redirect, redirect_to_login, session_cookie,
    DASHBOARD_PATH, LOGIN_PATH, SESSION_COOKIE_NAME,
};
use crate::notify::{spawn_notification, Notification};
use crate::AppState;

/// `GET /admin/login`: hand out a CSRF token for the login form.
///
/// A client without a live session gets a fresh public session scoped to
/// the login path.
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let json = wants_json(&headers);
    let mut response_headers = HeaderMap::new();

    let session = match current_session(&state, &headers).await {
        Ok(Some(session)) => session,
        other => {
            if other.is_err() {
                clear_cookies(&headers, &mut response_headers);
            }
            match new_public_session(&state, &mut response_headers).await {
                Ok(session) => session,
                Err(e) => return e.respond(json),
            }
        },
    };

    let csrf_token = match state.csrf.issue(&session.id) {
        Ok(token) => token,
        Err(e) => return e.respond(json),
    };

    let view = LoginView {
        csrf_token,
        csrf_field: CSRF_FIELD_NAME.to_string(),
    };
    (response_headers, Json(view)).into_response()
}

async fn new_public_session(
    state: &AppState,
    response_headers: &mut HeaderMap,
) -> Result<Session, AppError> {
    let session = state.sessions.create_public().await?;
    let cookie = session_cookie(
        &session.id,
        LOGIN_PATH,
        &state.settings.hostname,
        state.sessions.ttl(),
    )?;
    response_headers.append(SET_COOKIE, cookie);
    Ok(session)
}

/// `POST /admin/login`
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(public_session): Extension<Session>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let json = wants_json(&headers);
    let username = form.username;
    let password = Zeroizing::new(form.password);
    let client_ip = addr.ip();

    if state.lockout.is_locked_out(&username) {
        warn!(username = %username, client = %client_ip, "login attempt while locked out");
        return AppError::LockedOut.respond(json);
    }

    if username.is_empty() || password.is_empty() {
        return AppError::InvalidInput("username and password are required".into()).respond(json);
    }

    let Some(stored_hash) = state.settings.auth.users.get(&username) else {
        warn!(client = %client_ip, "login attempt with unknown username");
        return AppError::Auth("unknown username".into()).respond(json);
    };

    let correct = match verify_password(&password, stored_hash) {
        Ok(correct) => correct,
        Err(e) => return e.respond(json),
    };

    if !correct {
        counter!(LOGIN_FAILED).increment(1);
        warn!(username = %username, client = %client_ip, "login attempt with wrong password");

        if state.lockout.record_failed_attempt(&username) == AttemptOutcome::LockedOut {
            let settings = &state.settings;
            spawn_notification(
                state.notifier.clone(),
                Notification::new(
                    format!("{} - User locked out", settings.hostname),
                    format!(
                        "User [[{username}]] is locked out for {} minutes",
                        settings.auth.lockout_minutes
                    ),
                ),
            );
        }
        return redirect(LOGIN_PATH);
    }

    state.lockout.reset_attempts(&username);

    // The public session has served its purpose
    let _ = state.sessions.delete(&public_session.id).await;

    let session = match state.sessions.create_authenticated(&username).await {
        Ok(session) => session,
        Err(e) => return e.respond(json),
    };
    let cookie = match session_cookie(
        &session.id,
        "/",
        &state.settings.hostname,
        state.sessions.ttl(),
    ) {
        Ok(cookie) => cookie,
        Err(e) => return e.respond(json),
    };

    info!(username = %username, client = %client_ip, "operator logged in");
    spawn_notification(
        state.notifier.clone(),
        Notification::new(
            format!("{} - {username} logged in", state.settings.hostname),
            format!(
                "{username} logged into {} using {client_ip}",
                state.settings.host_ip
            ),
        ),
    );

    let mut response = redirect(DASHBOARD_PATH);
    let response_headers = response.headers_mut();
    if let Some(stale) = expired_cookie(SESSION_COOKIE_NAME, LOGIN_PATH) {
        response_headers.append(SET_COOKIE, stale);
    }
    response_headers.append(SET_COOKIE, cookie);
    response
}

/// `POST /admin/logout`
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
) -> Response {
    let _ = state.sessions.delete(&session.id).await;
    info!(username = session.identity().unwrap_or_default(), "operator logged out");
    redirect_to_login(&headers)
}
