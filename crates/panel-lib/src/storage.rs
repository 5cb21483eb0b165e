// ============================
// proxy-panel-lib/src/storage.rs
// ============================
//! Account storage backed by the proxy's JSON files.
//!
//! Two files are kept index-aligned: the proxy configuration, whose
//! `inbounds[0].settings.clients` list the proxy reads, and the panel's
//! ledger, whose `clients` list carries the account details. Every other
//! field of both files is preserved untouched.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use proxy_panel_common::Account;
use serde_json::Value;
use tokio::{fs as tokio_fs, sync::Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;

const PROXY_CLIENTS_POINTER: &str = "/inbounds/0/settings/clients";
const LEDGER_CLIENTS_KEY: &str = "clients";

/// Trait for account storage backends
#[async_trait]
pub trait AccountStorage: Send + Sync {
    /// All accounts in ledger order
    async fn list_accounts(&self) -> Result<Vec<Account>, AppError>;

    /// Append an account
    async fn create_account(&self, account: &Account) -> Result<(), AppError>;

    /// Replace the account at `index`
    async fn edit_account(&self, index: usize, account: &Account) -> Result<(), AppError>;

    /// Remove the account at `index` if it matches `username` and `id`
    async fn delete_account(
        &self,
        index: usize,
        username: &str,
        id: Uuid,
    ) -> Result<Account, AppError>;
}

/// Flat-file implementation of the AccountStorage trait
#[derive(Clone)]
pub struct FlatFileStorage {
    config_file: PathBuf,
    user_file: PathBuf,
    /// Serialises read-modify-write cycles over both files
    lock: Arc<Mutex<()>>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(config_file: P, user_file: Q) -> Self {
        Self {
            config_file: config_file.as_ref().to_path_buf(),
            user_file: user_file.as_ref().to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_both(&self) -> Result<(Value, Value), AppError> {
        let config = read_json(&self.config_file).await?;
        let ledger = read_json(&self.user_file).await?;
        Ok((config, ledger))
    }

    async fn store_both(&self, config: &Value, ledger: &Value) -> Result<(), AppError> {
        write_json(&self.config_file, config).await?;
        write_json(&self.user_file, ledger).await
    }
}

async fn read_json(path: &Path) -> Result<Value, AppError> {
    let content = tokio_fs::read(path).await.map_err(|e| {
        AppError::Internal(format!("unable to read {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// Write pretty JSON next to `path`, then rename over it
async fn write_json(path: &Path, value: &Value) -> Result<(), AppError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut content = serde_json::to_vec_pretty(value)?;
    content.push(b'\n');
    tokio_fs::write(&tmp, content).await?;
    tokio_fs::rename(&tmp, path).await?;

    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

fn proxy_clients(config: &mut Value) -> Result<&mut Vec<Value>, AppError> {
    config
        .pointer_mut(PROXY_CLIENTS_POINTER)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| AppError::Internal("proxy config has no inbounds[0].settings.clients".into()))
}

fn ledger_clients(ledger: &mut Value) -> Result<&mut Vec<Value>, AppError> {
    ledger
        .get_mut(LEDGER_CLIENTS_KEY)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| AppError::Internal("user file has no clients list".into()))
}

/// Overwrite the keys of `target` with those of `patch`, keeping the rest
fn merge_into(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => target.extend(patch),
        (target, patch) => *target = patch,
    }
}

fn check_index(index: usize, proxy_len: usize, ledger_len: usize) -> Result<(), AppError> {
    if index >= proxy_len || index >= ledger_len {
        return Err(AppError::InvalidInput(format!("no account at position {index}")));
    }
    Ok(())
}

#[async_trait]
impl AccountStorage for FlatFileStorage {
    async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        let mut ledger = read_json(&self.user_file).await?;
        let clients = std::mem::take(ledger_clients(&mut ledger)?);
        clients
            .into_iter()
            .map(|client| serde_json::from_value(client).map_err(AppError::from))
            .collect()
    }

    async fn create_account(&self, account: &Account) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let (mut config, mut ledger) = self.load_both().await?;

        proxy_clients(&mut config)?.push(serde_json::to_value(account.proxy_client())?);
        ledger_clients(&mut ledger)?.push(serde_json::to_value(account)?);

        self.store_both(&config, &ledger).await?;
        info!(username = %account.username, id = %account.id, "account created");
        Ok(())
    }

    async fn edit_account(&self, index: usize, account: &Account) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let (mut config, mut ledger) = self.load_both().await?;

        let proxy = proxy_clients(&mut config)?;
        let proxy_len = proxy.len();
        let ledger_len = ledger_clients(&mut ledger)?.len();
        check_index(index, proxy_len, ledger_len)?;

        merge_into(&mut proxy[index], serde_json::to_value(account.proxy_client())?);
        merge_into(
            &mut ledger_clients(&mut ledger)?[index],
            serde_json::to_value(account)?,
        );

        self.store_both(&config, &ledger).await?;
        info!(index, username = %account.username, "account edited");
        Ok(())
    }

    async fn delete_account(
        &self,
        index: usize,
        username: &str,
        id: Uuid,
    ) -> Result<Account, AppError> {
        let _guard = self.lock.lock().await;
        let (mut config, mut ledger) = self.load_both().await?;

        let proxy = proxy_clients(&mut config)?;
        let ledger_list = ledger_clients(&mut ledger)?;
        check_index(index, proxy.len(), ledger_list.len())?;

        let account: Account = serde_json::from_value(ledger_list[index].clone())?;
        let id_text = id.to_string();
        let proxy_id = proxy[index].get("id").and_then(Value::as_str);
        if account.username != username || account.id != id || proxy_id != Some(id_text.as_str()) {
            return Err(AppError::InvalidInput(
                "account details do not match the selected position".into(),
            ));
        }

        proxy.remove(index);
        ledger_list.remove(index);

        self.store_both(&config, &ledger).await?;
        info!(index, username, "account deleted");
        Ok(account)
    }
}
