// ============================
// crates/panel-lib/src/handlers/accounts.rs
// ============================
//! Account create, edit and delete.
//!
//! Every handler redirects back to the dashboard on success.
use axum::{extract::State, http::HeaderMap, response::Response, Extension, Form};
use proxy_panel_common::{AccountForm, DeleteAccountForm, EditAccountForm};
use tracing::info;

use crate::auth::Session;
use crate::error::{wants_json, AppError};
use crate::middleware::session::{redirect, DASHBOARD_PATH};
use crate::validation::{parse_user_number, parse_uuid, validate_account_form};
use crate::AppState;

fn finish(result: Result<(), AppError>, headers: &HeaderMap) -> Response {
    match result {
        Ok(()) => redirect(DASHBOARD_PATH),
        Err(e) => e.respond(wants_json(headers)),
    }
}

/// `POST /admin/accounts`
pub async fn create_account(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    Form(form): Form<AccountForm>,
) -> Response {
    let result = async {
        let account = validate_account_form(&form)?;
        state.accounts.create_account(&account).await?;
        info!(operator = session.identity(), username = %account.username, "account added");
        Ok::<(), AppError>(())
    }
    .await;
    finish(result, &headers)
}

/// `POST /admin/accounts/edit`
pub async fn edit_account(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    Form(form): Form<EditAccountForm>,
) -> Response {
    let result = async {
        let index = parse_user_number(&form.user_number)?;
        let account = validate_account_form(&form.account)?;
        state.accounts.edit_account(index, &account).await?;
        info!(operator = session.identity(), index, username = %account.username, "account edited");
        Ok::<(), AppError>(())
    }
    .await;
    finish(result, &headers)
}

/// `POST /admin/accounts/delete`
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    Form(form): Form<DeleteAccountForm>,
) -> Response {
    let result = async {
        let index = parse_user_number(&form.user_number)?;
        let id = parse_uuid("serverUUID", &form.server_uuid)?;
        let removed = state
            .accounts
            .delete_account(index, &form.username, id)
            .await?;
        info!(operator = session.identity(), index, username = %removed.username, "account removed");
        Ok::<(), AppError>(())
    }
    .await;
    finish(result, &headers)
}
