//! Device registration, the `Token` header contract and device logout.

use axum::http::StatusCode;
use serde_json::json;

use pantry_integration_tests::{PASSWORD, TestApp};

fn registration(device_id: &str) -> serde_json::Value {
    json!({
        "device_id": device_id,
        "device_type": "IOS",
        "device_model": "iPhone 15",
        "operation_version": "17.4",
        "ip_address": "10.0.0.9",
        "language": "en",
    })
}

#[tokio::test]
async fn registration_returns_the_token_once() {
    let app = TestApp::new();

    let res = app
        .post("/api/v1/users/devices")
        .json(registration("hw-ios-1"))
        .send()
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.key(), "CREATED");
    let token = res.data()["device_token"].as_str().unwrap_or_default();
    assert_eq!(token.len(), 64);
    assert_eq!(res.data()["device_type"], "IOS");
    assert_eq!(res.data()["is_active"], true);

    let res = app
        .get("/api/v1/users/devices/list")
        .token(token)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.data()[0].get("device_token").is_none());
}

#[tokio::test]
async fn duplicate_device_id_conflicts() {
    let app = TestApp::new();
    app.register_device("hw-dup").await;

    let res = app
        .post("/api/v1/users/devices")
        .json(registration("hw-dup"))
        .send()
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.key(), "DUPLICATE_DEVICE");
}

#[tokio::test]
async fn invalid_fields_are_listed() {
    let app = TestApp::new();

    let mut body = registration("hw-bad");
    body["ip_address"] = json!("not-an-ip");
    body["device_model"] = json!("   ");
    let res = app.post("/api/v1/users/devices").json(body).send().await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.key(), "VALIDATION_ERROR");
    assert!(res.body["context"]["errors"]["ip_address"].is_string());
    assert!(res.body["context"]["errors"]["device_model"].is_string());
}

#[tokio::test]
async fn missing_and_unknown_tokens_are_distinguished() {
    let app = TestApp::new();

    let res = app.get("/api/v1/users/devices/list").send().await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.key(), "TOKEN_IS_NOT_PROVIDED");

    let res = app
        .get("/api/v1/users/devices/list")
        .token("0000")
        .send()
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.key(), "DEVICE_NOT_FOUND");

    let res = app
        .get("/api/v1/users/devices/list")
        .token("t\u{f6}k\u{e9}n")
        .send()
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.key(), "DEVICE_NOT_FOUND");
}

#[tokio::test]
async fn list_is_scoped_to_the_owner_group() {
    let app = TestApp::new();
    let phone_a = app.register_device("hw-a").await;
    let tablet_a = app.register_device("hw-a-tab").await;
    let stranger = app.register_device("hw-b").await;

    let res = app
        .get("/api/v1/users/devices/list")
        .token(&stranger)
        .send()
        .await;
    assert_eq!(res.data().as_array().map(Vec::len), Some(1));

    app.sign_up("+998901234567", Some(&phone_a)).await;
    let res = app
        .post("/api/v1/users/login")
        .token(&tablet_a)
        .json(json!({ "phone": "+998901234567", "password": PASSWORD }))
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .get("/api/v1/users/devices/list")
        .token(&phone_a)
        .send()
        .await;
    let ids: Vec<&str> = res
        .data()
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|d| d["device_id"].as_str())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"hw-a"));
    assert!(ids.contains(&"hw-a-tab"));
}

#[tokio::test]
async fn logout_then_login_restores_the_device() {
    let app = TestApp::new();
    let token = app.register_device("hw-1").await;
    app.sign_up("+998901234567", Some(&token)).await;

    let res = app
        .post("/api/v1/users/devices/logout")
        .token(&token)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["is_active"], false);
    assert!(res.data()["logged_out_at"].is_string());

    let res = app
        .post("/api/v1/users/login")
        .token(&token)
        .json(json!({ "phone": "+998901234567", "password": PASSWORD }))
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .get("/api/v1/users/devices/list")
        .token(&token)
        .send()
        .await;
    let device = &res.data()[0];
    assert_eq!(device["is_active"], true);
    assert!(device["logged_out_at"].is_null());
}

#[tokio::test]
async fn logout_all_counts_the_users_devices() {
    let app = TestApp::new();
    let first = app.register_device("hw-1").await;
    let second = app.register_device("hw-2").await;
    let tokens = app.sign_up("+998901234567", Some(&first)).await;
    app.post("/api/v1/users/login")
        .token(&second)
        .json(json!({ "phone": "+998901234567", "password": PASSWORD }))
        .send()
        .await;

    let res = app
        .post("/api/v1/users/devices/logout-all")
        .bearer(&tokens.access)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["logged_out"], 2);

    let res = app
        .post("/api/v1/users/devices/logout-all")
        .token(&first)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn latest_app_version_is_public() {
    let app = TestApp::new();

    let res = app
        .get("/api/v1/app-versions/latest?platform=IOS")
        .send()
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.key(), "NOT_FOUND");
}
