//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, ApiError>`. Service errors convert into
//! [`ApiError`], which picks the status, the machine-readable message key and
//! any context the client needs. Server errors are captured to Sentry before
//! responding and never leak their detail.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::access::AccessError;
use crate::services::devices::DeviceError;
use crate::services::guard::ResourceError;
use crate::services::identity::AuthError;
use crate::services::otp::OtpError;
use crate::services::tokens::TokenError;
use crate::services::validation::ValidationErrors;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Request body or parameters could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Status, message key and optional context for a failure.
type Parts = (StatusCode, &'static str, Option<Value>);

const fn internal() -> Parts {
    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
}

fn validation(errors: &ValidationErrors) -> Parts {
    (
        StatusCode::BAD_REQUEST,
        "VALIDATION_ERROR",
        Some(json!({ "errors": errors })),
    )
}

fn field_error(key: &'static str, field: &str, reason: impl ToString) -> Parts {
    (
        StatusCode::BAD_REQUEST,
        key,
        Some(json!({ "errors": { field: reason.to_string() } })),
    )
}

fn token(err: &TokenError) -> Parts {
    match err {
        TokenError::Expired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", None),
        TokenError::Invalid => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", None),
        TokenError::Encode(_) => internal(),
    }
}

fn auth(err: &AuthError) -> Parts {
    match err {
        AuthError::InvalidPhone(e) => field_error("INVALID_PHONE", "phone", e),
        AuthError::WeakPassword(e) => field_error("WEAK_PASSWORD", "password", e),
        AuthError::PasswordMismatch => (StatusCode::BAD_REQUEST, "PASSWORD_MISMATCH", None),
        AuthError::SameAsOld => (StatusCode::BAD_REQUEST, "SAME_AS_OLD_PASSWORD", None),
        AuthError::InvalidCurrentPassword => {
            (StatusCode::BAD_REQUEST, "INVALID_CURRENT_PASSWORD", None)
        }
        AuthError::InvalidCredentials => (StatusCode::BAD_REQUEST, "INVALID_CREDENTIALS", None),
        AuthError::UnknownPhone(phone) => (
            StatusCode::NOT_FOUND,
            "USER_NOT_FOUND",
            Some(json!({ "phone": phone })),
        ),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND", None),
        AuthError::UserInactive => (StatusCode::UNAUTHORIZED, "USER_INACTIVE", None),
        AuthError::Otp { phone, source } => {
            let (status, key) = match source {
                OtpError::CodeNotFound => (StatusCode::BAD_REQUEST, "CODE_NOT_FOUND"),
                OtpError::CodeExpired => (StatusCode::BAD_REQUEST, "CODE_EXPIRED"),
                OtpError::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_ATTEMPTS"),
                OtpError::InvalidCode { remaining_attempts } => {
                    return (
                        StatusCode::BAD_REQUEST,
                        "INVALID_CODE",
                        Some(json!({
                            "phone": phone,
                            "remaining_attempts": remaining_attempts,
                        })),
                    );
                }
                OtpError::Repository(_) => return internal(),
            };
            (status, key, Some(json!({ "phone": phone })))
        }
        AuthError::Token(e) => token(e),
        AuthError::Validation(errors) => validation(errors),
        AuthError::PasswordHash(_) | AuthError::Repository(_) => internal(),
    }
}

fn access(err: &AccessError) -> Parts {
    match err {
        AccessError::TokenNotProvided => (StatusCode::UNAUTHORIZED, "TOKEN_IS_NOT_PROVIDED", None),
        AccessError::DeviceNotFound => (StatusCode::NOT_FOUND, "DEVICE_NOT_FOUND", None),
        AccessError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED", None),
        AccessError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", None),
        AccessError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", None),
        AccessError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND", None),
        AccessError::UserInactive => (StatusCode::UNAUTHORIZED, "USER_INACTIVE", None),
        AccessError::PermissionDenied => (StatusCode::FORBIDDEN, "PERMISSION_DENIED", None),
        AccessError::Repository(_) => internal(),
    }
}

fn resource(err: &ResourceError) -> Parts {
    match err {
        ResourceError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
        ResourceError::PermissionDenied => (StatusCode::FORBIDDEN, "PERMISSION_DENIED", None),
        ResourceError::DeviceNotFound => (StatusCode::NOT_FOUND, "DEVICE_NOT_FOUND", None),
        ResourceError::AlreadyExists => (StatusCode::CONFLICT, "ALREADY_EXISTS", None),
        ResourceError::Validation(errors) => validation(errors),
        ResourceError::Repository(_) => internal(),
    }
}

impl ApiError {
    fn parts(&self) -> Parts {
        match self {
            Self::Auth(e) => auth(e),
            Self::Device(DeviceError::DuplicateDevice) => {
                (StatusCode::CONFLICT, "DUPLICATE_DEVICE", None)
            }
            Self::Device(DeviceError::Validation(errors)) | Self::Validation(errors) => {
                validation(errors)
            }
            Self::Device(DeviceError::Repository(_)) | Self::Database(_) => internal(),
            Self::Access(e) => access(e),
            Self::Resource(e) => resource(e),
            Self::BadRequest(reason) => field_error("VALIDATION_ERROR", "body", reason),
        }
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    /// Machine-readable message key.
    #[must_use]
    pub fn message_key(&self) -> &'static str {
        self.parts().1
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, key, context) = self.parts();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, message_key = key, "Request rejected");
        }

        let body = json!({
            "success": false,
            "message_key": key,
            "context": context.unwrap_or_else(|| json!({})),
        });
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Associate subsequent Sentry events with a user and, when known, a device.
pub fn set_sentry_user(user_id: &impl ToString, device_id: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
        if let Some(device_id) = device_id {
            scope.set_tag("device_id", device_id);
        }
    });
}

/// Stop associating Sentry events with the user. Call on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use pantry_core::Phone;

    use super::*;

    async fn body(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::from(AccessError::TokenNotProvided).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AccessError::DeviceNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ResourceError::PermissionDenied).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(DeviceError::DuplicateDevice).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ResourceError::AlreadyExists).message_key(),
            "ALREADY_EXISTS"
        );
        assert_eq!(
            ApiError::from(RepositoryError::NotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn too_many_attempts_is_rate_limited() {
        let err = ApiError::from(AuthError::Otp {
            phone: Phone::parse("+998901234567").unwrap(),
            source: OtpError::TooManyAttempts,
        });
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.message_key(), "TOO_MANY_ATTEMPTS");
    }

    #[tokio::test]
    async fn invalid_code_reports_remaining_attempts() {
        let (status, json) = body(ApiError::from(AuthError::Otp {
            phone: Phone::parse("+998901234567").unwrap(),
            source: OtpError::InvalidCode {
                remaining_attempts: 7,
            },
        }))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message_key"], "INVALID_CODE");
        assert_eq!(json["context"]["phone"], "+998901234567");
        assert_eq!(json["context"]["remaining_attempts"], 7);
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let (status, json) = body(ApiError::Database(RepositoryError::DataCorruption(
            "bad row".to_owned(),
        )))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message_key"], "INTERNAL_ERROR");
        assert_eq!(json["context"], json!({}));
    }

    #[tokio::test]
    async fn validation_errors_are_listed_per_field() {
        let (status, json) = body(ApiError::from(ValidationErrors::single(
            "title",
            "must not be blank",
        )))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message_key"], "VALIDATION_ERROR");
        assert_eq!(json["context"]["errors"]["title"], "must not be blank");
    }
}
