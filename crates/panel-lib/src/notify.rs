// ============================
// crates/panel-lib/src/notify.rs
// ============================
//! Push notifications for security relevant events.
//!
//! Logins, lockouts and proxy restarts are pushed to a Gotify server when
//! one is configured. Delivery happens on a spawned task so the request
//! that triggered it never waits on the push server.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};
use url::Url;

use crate::config::NotifySettings;
use crate::error::AppError;

/// Priority used for every panel notification
pub const DEFAULT_PRIORITY: u8 = 9;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A single push message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: u8,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Trait for notification backends
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError>;
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        debug!(title = %notification.title, "notifications disabled, dropping");
        Ok(())
    }
}

/// Sends notifications to every configured Gotify application token
#[derive(Debug, Clone)]
pub struct GotifyNotifier {
    client: Client,
    endpoint: Url,
    api_keys: Vec<String>,
}

impl GotifyNotifier {
    /// `server` may omit the scheme, in which case `https://` is assumed
    pub fn new(server: &str, api_keys: Vec<String>) -> Result<Self, AppError> {
        let server = if server.contains("://") {
            server.to_string()
        } else {
            format!("https://{server}")
        };
        let mut base = Url::parse(&server)
            .map_err(|e| AppError::Internal(format!("invalid notification server `{server}`: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("message")
            .map_err(|e| AppError::Internal(format!("invalid notification endpoint: {e}")))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("unable to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_keys,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for GotifyNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        let mut failures = 0;
        for key in &self.api_keys {
            let result = self
                .client
                .post(self.endpoint.clone())
                .query(&[("token", key)])
                .json(notification)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);

            if let Err(e) = result {
                // The error may carry the URL and with it the token
                error!(title = %notification.title, "push notification failed: {}", e.without_url());
                failures += 1;
            }
        }

        if failures > 0 {
            return Err(AppError::Internal(format!(
                "{failures} of {} push notifications failed",
                self.api_keys.len()
            )));
        }
        Ok(())
    }
}

/// Build the notifier described by `settings`
pub fn from_settings(settings: &NotifySettings) -> Result<Arc<dyn Notifier>, AppError> {
    match settings.server.as_deref() {
        Some(server) if !server.is_empty() && !settings.api_keys.is_empty() => Ok(Arc::new(
            GotifyNotifier::new(server, settings.api_keys.clone())?,
        )),
        _ => Ok(Arc::new(NoopNotifier)),
    }
}

/// Deliver `notification` in the background
pub fn spawn_notification(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notification).await {
            debug!("notification not delivered: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Query, State},
        routing::post,
        Json, Router,
    };
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    type Received = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    async fn capture(
        State(received): State<Received>,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<serde_json::Value>,
    ) -> &'static str {
        let token = query.get("token").cloned().unwrap_or_default();
        received.lock().await.push((token, body));
        "{}"
    }

    async fn gotify_stub() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/message", post(capture))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }

    #[test]
    fn test_endpoint_building() {
        let notifier = GotifyNotifier::new("push.example.com", vec![]).unwrap();
        assert_eq!(notifier.endpoint().as_str(), "https://push.example.com/message");

        let notifier = GotifyNotifier::new("http://10.0.0.1:8080/gotify", vec![]).unwrap();
        assert_eq!(notifier.endpoint().as_str(), "http://10.0.0.1:8080/gotify/message");
    }

    #[test]
    fn test_from_settings_without_server_is_noop() {
        let settings = NotifySettings::default();
        assert!(from_settings(&settings).is_ok());

        let settings = NotifySettings {
            server: Some("::not a url::".to_string()),
            api_keys: vec!["key".to_string()],
        };
        assert!(from_settings(&settings).is_err());
    }

    #[tokio::test]
    async fn test_sends_to_every_key() {
        let (server, received) = gotify_stub().await;
        let notifier =
            GotifyNotifier::new(&server, vec!["key-a".to_string(), "key-b".to_string()]).unwrap();

        notifier
            .notify(&Notification::new("panel - admin logged in", "admin logged in"))
            .await
            .unwrap();

        let received = received.lock().await;
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].0, "key-a");
        assert_eq!(received[1].0, "key-b");
        assert_eq!(received[0].1["title"], "panel - admin logged in");
        assert_eq!(received[0].1["priority"], DEFAULT_PRIORITY);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        // Reserve a port, then free it so nothing listens there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = GotifyNotifier::new(&format!("http://{addr}"), vec!["k".into()]).unwrap();
        assert!(notifier.notify(&Notification::new("t", "m")).await.is_err());
    }
}
