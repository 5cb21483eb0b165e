// ============================
// proxy-panel-lib/src/config.rs
// ============================
//! Configuration management.
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "panel.toml";

/// Prefix for environment overrides, e.g. `PANEL_AUTH__SESSION_MINUTES=15`
pub const ENV_PREFIX: &str = "PANEL_";

/// Minimum length of the CSRF signing secret in bytes
pub const MIN_SECRET_LEN: usize = 32;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Fully qualified host name, used as the cookie domain
    pub hostname: String,
    /// Public address of the proxy host
    pub host_ip: String,
    /// Port the proxy itself listens on
    pub proxy_port: u16,
    /// Log level
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    pub storage: StorageSettings,
    pub service: ServiceSettings,
    pub notify: NotifySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Session, lockout and CSRF settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Lifetime of a session in minutes
    pub session_minutes: u64,
    /// Lockout length in minutes once the threshold is hit
    pub lockout_minutes: u64,
    /// Failed logins allowed before a lockout
    pub max_failed_attempts: u32,
    /// HMAC key for CSRF tokens
    #[serde(skip_serializing)]
    pub csrf_secret: String,
    /// Panel operators: username to hex SHA-256 of the password
    #[serde(skip_serializing)]
    pub users: BTreeMap<String, String>,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("session_minutes", &self.session_minutes)
            .field("lockout_minutes", &self.lockout_minutes)
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("csrf_secret", &"<redacted>")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Token bucket settings for the per-address limiter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Tokens added per second
    pub refill_per_sec: f64,
    /// Bucket capacity
    pub burst: u32,
    /// Idle time after which a client's bucket is dropped
    pub cleanup_secs: u64,
}

/// Locations of the JSON files the panel edits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Proxy server configuration (`inbounds[0].settings.clients`)
    pub config_file: PathBuf,
    /// Panel account ledger (`clients`)
    pub user_file: PathBuf,
}

/// Commands used to check and restart the proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub validate_command: Vec<String>,
    pub restart_command: Vec<String>,
}

/// Push notification settings, disabled while `server` is unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub server: Option<String>,
    pub api_keys: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8888)),
            hostname: "127.0.0.1".to_string(),
            host_ip: "127.0.0.1".to_string(),
            proxy_port: 443,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            auth: AuthSettings::default(),
            rate_limit: RateLimitSettings::default(),
            storage: StorageSettings::default(),
            service: ServiceSettings::default(),
            notify: NotifySettings::default(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_minutes: 10,
            lockout_minutes: 30,
            max_failed_attempts: 5,
            csrf_secret: String::new(),
            users: BTreeMap::new(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        // 1 request every 5 seconds per address
        Self {
            refill_per_sec: 0.2,
            burst: 1,
            cleanup_secs: 5 * 60,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("server.json"),
            user_file: PathBuf::from("user_data.json"),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            validate_command: ["v2ray", "test", "-config", "server.json"]
                .map(String::from)
                .to_vec(),
            restart_command: ["sudo", "systemctl", "restart", "v2ray"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl Settings {
    /// Load settings: defaults, then the config file, then `PANEL_` env vars.
    ///
    /// A missing file is not an error; the defaults and environment still apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("invalid log level `{}`", self.log_level);
        }
        if self.auth.session_minutes == 0 {
            bail!("auth.session_minutes must be at least 1");
        }
        if self.auth.lockout_minutes == 0 {
            bail!("auth.lockout_minutes must be at least 1");
        }
        if self.auth.max_failed_attempts == 0 {
            bail!("auth.max_failed_attempts must be at least 1");
        }
        if self.auth.csrf_secret.len() < MIN_SECRET_LEN {
            bail!("auth.csrf_secret must be at least {MIN_SECRET_LEN} bytes");
        }
        for (user, hash) in &self.auth.users {
            if hex::decode(hash).map(|h| h.len()) != Ok(32) {
                bail!("auth.users.{user} is not a hex encoded SHA-256 digest");
            }
        }
        if !(self.rate_limit.refill_per_sec > 0.0 && self.rate_limit.refill_per_sec.is_finite()) {
            bail!("rate_limit.refill_per_sec must be a positive number");
        }
        if self.rate_limit.burst == 0 {
            bail!("rate_limit.burst must be at least 1");
        }
        if self.rate_limit.cleanup_secs == 0 {
            bail!("rate_limit.cleanup_secs must be at least 1");
        }
        if self.service.validate_command.is_empty() || self.service.restart_command.is_empty() {
            bail!("service commands must not be empty");
        }
        Ok(())
    }

    /// Session lifetime
    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.auth.session_minutes * 60)
    }

    /// Lockout length
    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.auth.lockout_minutes * 60)
    }

    /// How often expired sessions are swept: a quarter of the session
    /// lifetime in whole minutes, or the full lifetime when that quarter
    /// rounds down to zero.
    pub fn session_sweep_interval(&self) -> Duration {
        let quarter = self.auth.session_minutes / 4;
        let minutes = if quarter < 1 {
            self.auth.session_minutes
        } else {
            quarter
        };
        Duration::from_secs(minutes * 60)
    }

    /// Idle time before a client's rate-limit bucket is evicted
    pub fn rate_limit_cleanup(&self) -> Duration {
        Duration::from_secs(self.rate_limit.cleanup_secs)
    }
}
