// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! shared between the proxy panel server and its clients.
//! This module defines the on-disk account records and the request/response
//! bodies exchanged with the panel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default `alterId` given to new proxy clients
pub const DEFAULT_ALTER_ID: u32 = 1;

/// A client entry inside the proxy's `inbounds[0].settings.clients` list
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyClient {
    /// Client UUID known to the proxy
    pub id: Uuid,
    /// Legacy vmess alter id
    pub alter_id: u32,
}

/// An account as tracked in the panel's user ledger
///
/// The ledger and the proxy config are index-aligned: the account at
/// position `n` describes the proxy client at position `n`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Client UUID, same as [`ProxyClient::id`]
    pub id: Uuid,
    /// Legacy vmess alter id
    pub alter_id: u32,
    /// Human readable owner name
    pub username: String,
    /// Device the account is locked to
    pub device_id: Uuid,
    /// First valid day, `YYYY-MM-DD`
    pub start_date: String,
    /// Last valid day, `YYYY-MM-DD`
    pub expire_date: String,
}

impl Account {
    /// The proxy-side view of this account
    pub fn proxy_client(&self) -> ProxyClient {
        ProxyClient {
            id: self.id,
            alter_id: self.alter_id,
        }
    }
}

/// Operator login form
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Account creation form
/// # Fields
/// * `server_uuid` - UUID the proxy will accept
/// * `username` - Owner name
/// * `device_uuid` - Device the account is bound to
/// * `start_date` / `expire_date` - Validity window, `YYYY-MM-DD`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AccountForm {
    #[serde(rename = "serverUUID")]
    pub server_uuid: String,
    pub username: String,
    #[serde(rename = "deviceUUID")]
    pub device_uuid: String,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "expireDate")]
    pub expire_date: String,
}

/// Account edit form: the replacement record plus its ledger position
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EditAccountForm {
    #[serde(flatten)]
    pub account: AccountForm,
    #[serde(rename = "userNumber", default)]
    pub user_number: String,
}

/// Account deletion form
///
/// `username` and `server_uuid` must match the record at `user_number`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DeleteAccountForm {
    pub username: String,
    #[serde(rename = "serverUUID")]
    pub server_uuid: String,
    #[serde(rename = "userNumber")]
    pub user_number: String,
}

/// JSON body of the proxy restart endpoint
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RestartRequest {
    pub admin_username: String,
    pub admin_password: String,
}

/// Login page data
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginView {
    /// Token to echo back with the login form
    pub csrf_token: String,
    /// Form field / header name the token travels under
    pub csrf_field: String,
}

/// Dashboard data
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DashboardView {
    pub accounts: Vec<Account>,
    pub server_host: String,
    pub server_ip: String,
    pub proxy_port: u16,
    pub csrf_token: String,
    pub csrf_field: String,
}

/// Response of `GET /server/ip`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerIp {
    pub ip: String,
}
