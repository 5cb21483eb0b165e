// ============================
// crates/panel-lib/src/router.rs
// ============================
//! Route table.
//!
//! Guards run outermost first: rate limit, then login, then CSRF.
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, auth, dashboard, not_found, server};
use crate::middleware::{
    rate_limit,
    require_csrf,
    require_login,
    session::{DASHBOARD_PATH, LOGIN_PATH},
};
use crate::AppState;

/// Create the panel's router
pub fn create_router(state: AppState) -> Router {
    // CSRF is skipped for GET, so the login page itself stays reachable
    let public = Router::new()
        .route(LOGIN_PATH, get(auth::login_page).post(auth::login))
        .route("/server/ip", get(server::server_ip))
        .route_layer(from_fn_with_state(state.clone(), require_csrf));

    let operator = Router::new()
        .route("/", get(dashboard::index))
        .route(DASHBOARD_PATH, get(dashboard::dashboard))
        .route("/admin/logout", post(auth::logout))
        .route("/admin/accounts", post(accounts::create_account))
        .route("/admin/accounts/edit", post(accounts::edit_account))
        .route("/admin/accounts/delete", post(accounts::delete_account))
        .route_layer(from_fn_with_state(state.clone(), require_csrf))
        .route_layer(from_fn_with_state(state.clone(), require_login));

    let restart = Router::new()
        .route("/server", post(server::restart))
        .route_layer(from_fn_with_state(state.clone(), require_csrf))
        .route_layer(from_fn_with_state(state.clone(), require_login))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(public)
        .merge(operator)
        .merge(restart)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
