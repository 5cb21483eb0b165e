mod common;

use axum::http::StatusCode;
use proxy_panel_lib::auth::CSRF_FIELD_NAME;
use serde_json::Value;

use common::*;

const NEW_ID: &str = "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";
const NEW_DEVICE: &str = "1b2c3d4e-5f6a-4b7c-8d9e-0f1a2b3c4d5e";

fn read(path: std::path::PathBuf) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

async fn operator(env: &TestEnv) -> (String, String) {
    let cookie = login(env).await;
    let token = dashboard_token(env, &cookie).await;
    (cookie, token)
}

#[tokio::test]
async fn test_create_account() {
    let env = setup_test_env().await;
    let (cookie, token) = operator(&env).await;

    let response = env
        .send(post_form(
            "/admin/accounts",
            Some(&cookie),
            &[
                ("serverUUID", NEW_ID),
                ("username", "bob"),
                ("deviceUUID", NEW_DEVICE),
                ("startDate", "2024-03-01"),
                ("expireDate", "2024-04-01"),
                (CSRF_FIELD_NAME, &token),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response).as_deref(), Some("/admin/dashboard"));

    let config = read(env.config_file());
    let clients = config["inbounds"][0]["settings"]["clients"].as_array().unwrap();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[1]["id"], NEW_ID);
    assert_eq!(clients[1]["alterId"], 1);
    // Unrelated configuration survives the rewrite
    assert_eq!(config["log"]["loglevel"], "warning");
    assert_eq!(config["inbounds"][0]["port"], 443);

    let ledger = read(env.user_file());
    assert_eq!(ledger["clients"][1]["username"], "bob");
    assert_eq!(ledger["clients"][1]["deviceId"], NEW_DEVICE);
    assert_eq!(ledger["clients"][1]["expireDate"], "2024-04-01");

    // The same token stays valid for the rest of the session
    let response = env.send(get("/admin/dashboard", Some(&cookie))).await;
    let body = body_json(response).await;
    assert_eq!(body["accounts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_account_rejects_bad_input() {
    let env = setup_test_env().await;
    let (cookie, token) = operator(&env).await;

    let cases: [&[(&str, &str)]; 3] = [
        &[("serverUUID", "not-a-uuid"), ("username", "bob"), ("deviceUUID", NEW_DEVICE), ("startDate", "2024-03-01"), ("expireDate", "2024-04-01")],
        &[("serverUUID", NEW_ID), ("username", "bob"), ("deviceUUID", NEW_DEVICE), ("startDate", "2024-05-01"), ("expireDate", "2024-04-01")],
        &[("serverUUID", NEW_ID), ("username", ""), ("deviceUUID", NEW_DEVICE), ("startDate", "2024-03-01"), ("expireDate", "2024-04-01")],
    ];
    for fields in cases {
        let mut fields = fields.to_vec();
        fields.push((CSRF_FIELD_NAME, &token));
        let response = env
            .send(post_form("/admin/accounts", Some(&cookie), &fields))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{fields:?}");
    }

    let ledger = read(env.user_file());
    assert_eq!(ledger["clients"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_account_routes_require_csrf() {
    let env = setup_test_env().await;
    let cookie = login(&env).await;

    let response = env
        .send(post_form(
            "/admin/accounts",
            Some(&cookie),
            &[
                ("serverUUID", NEW_ID),
                ("username", "bob"),
                ("deviceUUID", NEW_DEVICE),
                ("startDate", "2024-03-01"),
                ("expireDate", "2024-04-01"),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read(env.user_file())["clients"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_account_routes_require_login() {
    let env = setup_test_env().await;
    let (public_cookie, token) = open_login_page(&env).await;

    let response = env
        .send(post_form(
            "/admin/accounts/delete",
            Some(&public_cookie),
            &[
                ("username", "alice"),
                ("serverUUID", EXISTING_ID),
                ("userNumber", "0"),
                (CSRF_FIELD_NAME, &token),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response).as_deref(), Some("/admin/login"));
    assert_eq!(read(env.user_file())["clients"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_edit_account() {
    let env = setup_test_env().await;
    let (cookie, token) = operator(&env).await;

    let response = env
        .send(post_form(
            "/admin/accounts/edit",
            Some(&cookie),
            &[
                ("serverUUID", NEW_ID),
                ("username", "alice-renewed"),
                ("deviceUUID", DEVICE_ID),
                ("startDate", "2025-01-01"),
                ("expireDate", "2025-12-31"),
                ("userNumber", "0"),
                (CSRF_FIELD_NAME, &token),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let config = read(env.config_file());
    assert_eq!(config["inbounds"][0]["settings"]["clients"][0]["id"], NEW_ID);
    let ledger = read(env.user_file());
    assert_eq!(ledger["clients"][0]["username"], "alice-renewed");
    assert_eq!(ledger["clients"][0]["startDate"], "2025-01-01");

    // Out of range positions are refused
    let response = env
        .send(post_form(
            "/admin/accounts/edit",
            Some(&cookie),
            &[
                ("serverUUID", NEW_ID),
                ("username", "ghost"),
                ("deviceUUID", DEVICE_ID),
                ("startDate", "2025-01-01"),
                ("expireDate", "2025-12-31"),
                ("userNumber", "7"),
                (CSRF_FIELD_NAME, &token),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_account() {
    let env = setup_test_env().await;
    let (cookie, token) = operator(&env).await;

    // Wrong username for that position
    let response = env
        .send(post_form(
            "/admin/accounts/delete",
            Some(&cookie),
            &[
                ("username", "bob"),
                ("serverUUID", EXISTING_ID),
                ("userNumber", "0"),
                (CSRF_FIELD_NAME, &token),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read(env.user_file())["clients"].as_array().unwrap().len(), 1);

    let response = env
        .send(post_form(
            "/admin/accounts/delete",
            Some(&cookie),
            &[
                ("username", "alice"),
                ("serverUUID", EXISTING_ID),
                ("userNumber", "0"),
                (CSRF_FIELD_NAME, &token),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response).as_deref(), Some("/admin/dashboard"));

    assert!(read(env.user_file())["clients"].as_array().unwrap().is_empty());
    assert!(read(env.config_file())["inbounds"][0]["settings"]["clients"]
        .as_array()
        .unwrap()
        .is_empty());
}
