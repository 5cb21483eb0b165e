// ============================
// proxy-panel-lib/src/lib.rs
// ============================
//! Core functionality of the proxy admin panel: authentication, abuse
//! prevention and the HTTP surface for editing proxy accounts.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod router;
pub mod service;
pub mod storage;
pub mod sweeper;
pub mod validation;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::auth::{CsrfCodec, LoginLockout, SessionManager};
use crate::config::Settings;
use crate::error::AppError;
use crate::middleware::rate_limit::ClientRateLimiter;
use crate::notify::Notifier;
use crate::service::ProxyService;
use crate::storage::{AccountStorage, FlatFileStorage};
use crate::sweeper::SweeperHandle;

pub use router::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Settings the server was started with
    pub settings: Arc<Settings>,
    /// Session manager
    pub sessions: Arc<SessionManager>,
    /// CSRF token codec
    pub csrf: Arc<CsrfCodec>,
    /// Failed login tracking
    pub lockout: Arc<LoginLockout>,
    /// Per-address limiter for expensive routes
    pub rate_limiter: Arc<ClientRateLimiter>,
    /// Account storage backend
    pub accounts: Arc<dyn AccountStorage>,
    /// Push notifications
    pub notifier: Arc<dyn Notifier>,
    /// Proxy service control
    pub proxy: Arc<ProxyService>,
    /// Background sweep tasks, joined on shutdown
    sweepers: Arc<Mutex<Vec<SweeperHandle>>>,
}

impl AppState {
    /// Create the application state from settings, using the flat-file
    /// account storage and the configured notifier.
    ///
    /// Must be called inside a tokio runtime; the sweep tasks start here.
    pub fn new(settings: Settings) -> Result<Self, AppError> {
        let accounts = Arc::new(FlatFileStorage::new(
            &settings.storage.config_file,
            &settings.storage.user_file,
        ));
        let notifier = notify::from_settings(&settings.notify)?;
        Ok(Self::with_components(settings, accounts, notifier))
    }

    /// Create the application state around the given storage and notifier
    pub fn with_components(
        settings: Settings,
        accounts: Arc<dyn AccountStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(settings.session_duration()));
        let csrf = Arc::new(CsrfCodec::new(settings.auth.csrf_secret.as_bytes()));
        let lockout = Arc::new(LoginLockout::new(
            settings.auth.max_failed_attempts,
            settings.lockout_duration(),
        ));
        let rate_limiter = Arc::new(ClientRateLimiter::new(
            settings.rate_limit.refill_per_sec,
            settings.rate_limit.burst,
            settings.rate_limit_cleanup(),
        ));
        let proxy = Arc::new(ProxyService::new(&settings.service));

        let sweepers = vec![
            sweeper::spawn(sessions.clone(), settings.session_sweep_interval()),
            sweeper::spawn(lockout.clone(), settings.lockout_duration()),
            sweeper::spawn(rate_limiter.clone(), settings.rate_limit_cleanup()),
        ];

        Self {
            settings: Arc::new(settings),
            sessions,
            csrf,
            lockout,
            rate_limiter,
            accounts,
            notifier,
            proxy,
            sweepers: Arc::new(Mutex::new(sweepers)),
        }
    }

    /// Stop every sweep task and wait for them to finish
    pub async fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.sweepers.lock().await);
        for handle in handles {
            let name = handle.name();
            handle.shutdown().await;
            info!(store = name, "sweeper shut down");
        }
    }
}
