//! End-to-end tests for the Pantry API.
//!
//! Every test drives the real router (extractors, envelopes, error mapping)
//! over the in-memory store with a controllable clock, so no database or
//! network is needed.
//!
//! ```rust,ignore
//! let app = TestApp::new();
//! let token = app.register_device("hw-1").await;
//! let res = app.get("/api/v1/carts").token(&token).send().await;
//! assert_eq!(res.status, StatusCode::OK);
//! ```

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use pantry_server::db::memory::MemoryStore;
use pantry_server::state::AppState;
use pantry_server::test_support::{MutableClock, memory_state};

/// Password that satisfies the policy.
pub const PASSWORD: &str = "TestPass123!";

/// A router over a fresh in-memory store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<MutableClock>,
}

/// Decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// `Value::Null` for an empty body.
    pub body: Value,
}

impl TestResponse {
    /// `message_key` of either envelope.
    #[must_use]
    pub fn key(&self) -> &str {
        self.body["message_key"].as_str().unwrap_or_default()
    }

    #[must_use]
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

/// A request under construction.
pub struct Call<'a> {
    app: &'a TestApp,
    method: Method,
    uri: String,
    headers: Vec<(&'static str, String)>,
    body: Option<Value>,
}

impl Call<'_> {
    /// Send the `Token` device header.
    #[must_use]
    pub fn token(mut self, device_token: &str) -> Self {
        self.headers.push(("token", device_token.to_owned()));
        self
    }

    /// Send `Authorization: Bearer <access>`.
    #[must_use]
    pub fn bearer(mut self, access: &str) -> Self {
        self.headers
            .push(("authorization", format!("Bearer {access}")));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Run the request through the router.
    ///
    /// # Panics
    ///
    /// If the request cannot be built or the body is not JSON.
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }
        let request = match self.body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        let response = self
            .app
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse { status, body }
    }
}

/// Access and refresh tokens from verify or login.
#[derive(Debug, Clone)]
pub struct Tokens {
    pub access: String,
    pub refresh: String,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let (state, store, clock) = memory_state();
        Self {
            router: pantry_server::app(state.clone()),
            state,
            store,
            clock,
        }
    }

    fn call(&self, method: Method, uri: &str) -> Call<'_> {
        Call {
            app: self,
            method,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Call<'_> {
        self.call(Method::GET, uri)
    }

    #[must_use]
    pub fn post(&self, uri: &str) -> Call<'_> {
        self.call(Method::POST, uri)
    }

    #[must_use]
    pub fn patch(&self, uri: &str) -> Call<'_> {
        self.call(Method::PATCH, uri)
    }

    #[must_use]
    pub fn delete(&self, uri: &str) -> Call<'_> {
        self.call(Method::DELETE, uri)
    }

    /// Register an Android device and return its token.
    ///
    /// # Panics
    ///
    /// If registration does not return 201.
    pub async fn register_device(&self, device_id: &str) -> String {
        let res = self
            .post("/api/v1/users/devices")
            .json(json!({
                "device_id": device_id,
                "device_type": "ANDROID",
                "device_model": "Pixel 8",
                "operation_version": "14",
                "ip_address": "10.0.0.7",
            }))
            .send()
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.data()["device_token"]
            .as_str()
            .expect("device_token present")
            .to_owned()
    }

    /// Register `phone` and return the issued code.
    ///
    /// # Panics
    ///
    /// If the response carries no code.
    pub async fn register_phone(&self, phone: &str, password: &str) -> String {
        let res = self
            .post("/api/v1/users/register")
            .json(json!({ "phone": phone, "password": password }))
            .send()
            .await;
        res.data()["code"]
            .as_str()
            .unwrap_or_else(|| panic!("no code in {:?}", res.body))
            .to_owned()
    }

    /// Register and verify `phone`, binding `device_token` if given.
    ///
    /// # Panics
    ///
    /// If verification fails.
    pub async fn sign_up(&self, phone: &str, device_token: Option<&str>) -> Tokens {
        let code = self.register_phone(phone, PASSWORD).await;
        let mut call = self
            .post("/api/v1/users/verify")
            .json(json!({ "phone": phone, "code": code }));
        if let Some(token) = device_token {
            call = call.token(token);
        }
        let res = call.send().await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
        tokens(&res)
    }
}

/// Pull `data.tokens` out of a verify or login response.
///
/// # Panics
///
/// If the tokens are missing.
#[must_use]
pub fn tokens(res: &TestResponse) -> Tokens {
    let tokens = &res.data()["tokens"];
    Tokens {
        access: tokens["access"].as_str().expect("access token").to_owned(),
        refresh: tokens["refresh"].as_str().expect("refresh token").to_owned(),
    }
}
