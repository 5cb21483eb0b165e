// ============================
// crates/panel-lib/src/handlers/dashboard.rs
// ============================
use axum::{extract::State, response::Response, Extension, Json};
use proxy_panel_common::DashboardView;

use crate::auth::{Session, CSRF_FIELD_NAME};
use crate::error::AppError;
use crate::middleware::session::{redirect, DASHBOARD_PATH};
use crate::AppState;

/// `GET /`
pub async fn index() -> Response {
    redirect(DASHBOARD_PATH)
}

/// `GET /admin/dashboard`: accounts, server details and a CSRF token for
/// the dashboard's forms
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<DashboardView>, AppError> {
    let accounts = state.accounts.list_accounts().await?;
    let csrf_token = state.csrf.issue(&session.id)?;
    let settings = &state.settings;

    Ok(Json(DashboardView {
        accounts,
        server_host: settings.hostname.clone(),
        server_ip: settings.host_ip.clone(),
        proxy_port: settings.proxy_port,
        csrf_token,
        csrf_field: CSRF_FIELD_NAME.to_string(),
    }))
}
