//! Administrator endpoints and the app release gate.

use axum::http::StatusCode;
use serde_json::json;

use pantry_integration_tests::{PASSWORD, TestApp, tokens};

const ADMIN_PHONE: &str = "+998909999999";
const USER_PHONE: &str = "+998901234567";

async fn admin_access(app: &TestApp) -> String {
    let admin = app.state.admin().ensure_admin(ADMIN_PHONE, PASSWORD).await;
    assert!(admin.is_ok(), "{admin:?}");

    let res = app
        .post("/api/v1/users/login")
        .json(json!({ "phone": ADMIN_PHONE, "password": PASSWORD }))
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    tokens(&res).access
}

#[tokio::test]
async fn admin_routes_need_an_admin_bearer() {
    let app = TestApp::new();
    let device = app.register_device("hw-1").await;

    let res = app.get("/api/v1/admin/users").token(&device).send().await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.key(), "NOT_AUTHENTICATED");

    let user = app.sign_up(USER_PHONE, None).await;
    let res = app
        .get("/api/v1/admin/users")
        .bearer(&user.access)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.key(), "PERMISSION_DENIED");
}

#[tokio::test]
async fn users_statistics_and_device_logout() {
    let app = TestApp::new();
    let android = app.register_device("hw-android").await;
    let user = app.sign_up(USER_PHONE, Some(&android)).await;
    let admin = admin_access(&app).await;

    let res = app
        .get("/api/v1/admin/users?limit=10&offset=0")
        .bearer(&admin)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let listed = res.data().as_array().map(Vec::len);
    assert_eq!(listed, Some(2));

    let res = app
        .get("/api/v1/admin/users/statistics")
        .bearer(&admin)
        .send()
        .await;
    assert_eq!(res.data()["all"], 1);
    assert_eq!(res.data()["android"], 1);
    assert_eq!(res.data()["online"], 1);

    let user_id = app
        .get("/api/v1/users/profile")
        .bearer(&user.access)
        .send()
        .await
        .data()["id"]
        .as_i64()
        .unwrap_or_default();
    let res = app
        .get(&format!("/api/v1/admin/users/{user_id}"))
        .bearer(&admin)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["phone"], USER_PHONE);
    assert_eq!(res.data()["is_admin"], false);
    let device_id = res.data()["devices"][0]["id"].as_i64().unwrap_or_default();

    let res = app
        .delete(&format!("/api/v1/admin/users/{user_id}/devices/{device_id}"))
        .bearer(&admin)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app
        .get("/api/v1/admin/users/statistics")
        .bearer(&admin)
        .send()
        .await;
    assert_eq!(res.data()["online"], 0);
    assert_eq!(res.data()["offline"], 1);

    let res = app
        .get("/api/v1/admin/users/424242")
        .bearer(&admin)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn published_release_gates_its_platform() {
    let app = TestApp::new();
    let admin = admin_access(&app).await;

    let res = app
        .post("/api/v1/admin/app-versions")
        .bearer(&admin)
        .json(json!({ "version": "2.1.0", "platform": "ANDROID", "force_update": true }))
        .send()
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["is_active"], true);

    let res = app
        .get("/api/v1/app-versions/latest?platform=ANDROID")
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["version"], "2.1.0");
    assert_eq!(res.data()["force_update"], true);

    let res = app
        .post("/api/v1/admin/app-versions")
        .bearer(&admin)
        .json(json!({ "version": "2.2.0", "platform": "ANDROID", "is_active": false }))
        .send()
        .await;
    let draft = res.data()["id"].as_i64().unwrap_or_default();

    let res = app
        .post(&format!("/api/v1/admin/app-versions/{draft}/activate"))
        .bearer(&admin)
        .send()
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .get("/api/v1/app-versions/latest?platform=ANDROID")
        .send()
        .await;
    assert_eq!(res.data()["version"], "2.2.0");

    let res = app
        .get("/api/v1/app-versions/latest?platform=IOS")
        .send()
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn force_update_requires_an_active_release() {
    let app = TestApp::new();
    let admin = admin_access(&app).await;

    let res = app
        .post("/api/v1/admin/app-versions")
        .bearer(&admin)
        .json(json!({ "version": "3.0.0", "platform": "IOS", "is_active": false, "force_update": true }))
        .send()
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["context"]["errors"]["force_update"].is_string());
}
