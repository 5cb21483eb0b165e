//! Test utilities for the panel's HTTP tests
//!
//! Builds an [`AppState`] around temporary account files and a notifier
//! that records instead of sending, and wraps the router so handlers see
//! a fixed client address.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use proxy_panel_lib::{
    auth::{hash_password, CSRF_FIELD_NAME},
    config::Settings,
    create_router,
    error::AppError,
    notify::{Notification, Notifier},
    storage::FlatFileStorage,
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const CLIENT_ADDR: ([u8; 4], u16) = ([203, 0, 113, 7], 51234);
pub const EXISTING_ID: &str = "0e3c1a6e-2b5f-4c43-9a4e-3c1f9a1d2b11";
pub const DEVICE_ID: &str = "6f1c2d7e-9b0a-4f3e-8d2c-1a2b3c4d5e6f";

/// Records notifications instead of pushing them
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct TestEnv {
    pub state: AppState,
    pub app: Router,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: TempDir,
}

impl TestEnv {
    pub fn config_file(&self) -> std::path::PathBuf {
        self.dir.path().join("server.json")
    }

    pub fn user_file(&self) -> std::path::PathBuf {
        self.dir.path().join("user_data.json")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Wait until at least `count` notifications were recorded
    pub async fn wait_for_notifications(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.notifier.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.sent()
    }
}

/// Settings every test starts from
pub fn test_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.hostname = "panel.example.com".to_string();
    settings.host_ip = "198.51.100.10".to_string();
    settings.auth.csrf_secret = "test-secret-test-secret-test-secret!".to_string();
    settings
        .auth
        .users
        .insert(ADMIN.to_string(), hash_password(ADMIN_PASSWORD));
    settings.storage.config_file = dir.path().join("server.json");
    settings.storage.user_file = dir.path().join("user_data.json");
    settings.service.validate_command = vec!["true".to_string()];
    settings.service.restart_command = vec!["true".to_string()];
    settings
}

fn write_account_files(dir: &TempDir) {
    let config = json!({
        "log": { "loglevel": "warning" },
        "inbounds": [{
            "port": 443,
            "protocol": "vmess",
            "settings": { "clients": [ { "id": EXISTING_ID, "alterId": 1 } ] }
        }],
        "outbounds": [{ "protocol": "freedom" }]
    });
    let ledger = json!({
        "clients": [{
            "id": EXISTING_ID,
            "alterId": 1,
            "username": "alice",
            "deviceId": DEVICE_ID,
            "startDate": "2024-01-01",
            "expireDate": "2024-12-31"
        }]
    });
    std::fs::write(dir.path().join("server.json"), config.to_string()).unwrap();
    std::fs::write(dir.path().join("user_data.json"), ledger.to_string()).unwrap();
}

pub async fn setup_test_env() -> TestEnv {
    setup_test_env_with(|_| {}).await
}

/// Sets up a test environment, letting the caller adjust the settings first
pub async fn setup_test_env_with(adjust: impl FnOnce(&mut Settings)) -> TestEnv {
    let dir = TempDir::new().unwrap();
    write_account_files(&dir);

    let mut settings = test_settings(&dir);
    adjust(&mut settings);
    settings.validate().unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let accounts = Arc::new(FlatFileStorage::new(
        &settings.storage.config_file,
        &settings.storage.user_file,
    ));
    let state = AppState::with_components(settings, accounts, notifier.clone());
    let app = create_router(state.clone()).layer(MockConnectInfo(SocketAddr::from(CLIENT_ADDR)));

    TestEnv {
        state,
        app,
        notifier,
        dir,
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Url-encode `fields` as a form body
pub fn form_body(fields: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

pub fn post_form(uri: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(form_body(fields))).unwrap()
}

pub fn post_json(uri: &str, cookie: Option<&str>, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    if let Some(token) = token {
        builder = builder.header(CSRF_FIELD_NAME, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The `psid=<id>` pair of the last session cookie the response sets
pub fn session_cookie(response: &Response) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .filter_map(|cookie| cookie.split(';').next().map(str::to_string))
        .filter(|pair| pair.starts_with("psid=") && pair.len() > "psid=".len())
        .last()
}

pub fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Visit the login page, returning the public session cookie and its token
pub async fn open_login_page(env: &TestEnv) -> (String, String) {
    let response = env.send(get("/admin/login", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("login page sets a session cookie");
    let body = body_json(response).await;
    let token = body["csrf_token"].as_str().unwrap().to_string();
    (cookie, token)
}

/// Submit the login form for `username`/`password` through a fresh public session
pub async fn submit_login(env: &TestEnv, username: &str, password: &str) -> Response {
    let (cookie, token) = open_login_page(env).await;
    env.send(post_form(
        "/admin/login",
        Some(&cookie),
        &[
            ("username", username),
            ("password", password),
            (CSRF_FIELD_NAME, &token),
        ],
    ))
    .await
}

/// Log in as the test operator, returning the authenticated session cookie
pub async fn login(env: &TestEnv) -> String {
    let response = submit_login(env, ADMIN, ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response).as_deref(), Some("/admin/dashboard"));
    session_cookie(&response).expect("login sets the operator session cookie")
}

/// Fetch the dashboard and return its CSRF token
pub async fn dashboard_token(env: &TestEnv, cookie: &str) -> String {
    let response = env.send(get("/admin/dashboard", Some(cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["csrf_token"]
        .as_str()
        .unwrap()
        .to_string()
}
