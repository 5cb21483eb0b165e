// ============================
// crates/panel-lib/src/handlers/server.rs
// ============================
//! Proxy server endpoints.
use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    Json,
};
use proxy_panel_common::{RestartRequest, ServerIp};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::auth::verify_password;
use crate::error::AppError;
use crate::notify::{spawn_notification, Notification};
use crate::AppState;

/// `GET /server/ip`
pub async fn server_ip(State(state): State<AppState>) -> Json<ServerIp> {
    Json(ServerIp {
        ip: state.settings.host_ip.clone(),
    })
}

/// `POST /server`: re-check the operator's credentials, validate the
/// proxy configuration and restart the proxy.
pub async fn restart(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<RestartRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) =
        body.map_err(|e| AppError::InvalidInput(format!("invalid request body: {e}")))?;
    let password = Zeroizing::new(request.admin_password);

    let stored_hash = state
        .settings
        .auth
        .users
        .get(&request.admin_username)
        .ok_or_else(|| AppError::Auth("unknown username".into()))?;

    if !verify_password(&password, stored_hash)? {
        warn!(client = %addr.ip(), "restart requested with wrong credentials");
        return Err(AppError::Auth("wrong password".into()));
    }

    if let Err(e) = state.proxy.validate_and_restart().await {
        error!("proxy restart failed: {e}");
        return Err(e);
    }

    let settings = &state.settings;
    info!(operator = %request.admin_username, client = %addr.ip(), "proxy restarted from the panel");
    spawn_notification(
        state.notifier.clone(),
        Notification::new(
            format!("{} - proxy server {} restarted.", settings.hostname, settings.host_ip),
            format!("server {} restarted by {}", settings.host_ip, addr.ip()),
        ),
    );

    Ok(Json(json!({ "message": "Proxy service restarted successfully." })))
}
