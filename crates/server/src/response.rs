//! Success envelope.
//!
//! `{"success": true, "message_key": "...", "data": ...}`. Failures use the
//! matching shape from [`ApiError`](crate::error::ApiError).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    message_key: &'static str,
    data: Option<T>,
}

/// A successful response with its status and message key.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message_key: &'static str,
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 `SUCCESS`.
    pub const fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message_key: "SUCCESS",
            data: Some(data),
        }
    }

    /// 201 `CREATED`.
    pub const fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message_key: "CREATED",
            data: Some(data),
        }
    }

    #[must_use]
    pub const fn key(mut self, message_key: &'static str) -> Self {
        self.message_key = message_key;
        self
    }

    #[must_use]
    pub const fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl ApiResponse<()> {
    /// 200 with `data: null`.
    #[must_use]
    pub const fn message(message_key: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            message_key,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            message_key: self.message_key,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    use super::*;

    async fn render(response: impl IntoResponse) -> (StatusCode, Value) {
        let response = response.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn created_wraps_data() {
        let (status, body) = render(ApiResponse::created(json!({ "id": 1 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({ "success": true, "message_key": "CREATED", "data": { "id": 1 } })
        );
    }

    #[tokio::test]
    async fn message_has_null_data() {
        let (status, body) = render(ApiResponse::message("LOGGED_OUT")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message_key"], "LOGGED_OUT");
        assert_eq!(body["data"], Value::Null);
    }
}
