//! Account routes: registration, OTP verification, login, passwords and
//! profile.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use pantry_core::Phone;

use crate::error::{Result, clear_sentry_user};
use crate::extract::Json;
use crate::middleware::{AuthenticatedUser, MaybeDevice};
use crate::models::UserProfile;
use crate::response::ApiResponse;
use crate::services::identity::{ProfilePatch, Registration, RegistrationOutcome, Session};
use crate::services::tokens::TokenPair;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

/// `password` is the current one; `password1`/`password2` the new pair.
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub phone: Phone,
    pub tokens: TokenPair,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            phone: session.user.phone,
            tokens: session.tokens,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: String,
}

/// POST /users/register
///
/// 201 `USER_CREATED` for a new phone, 200 `OTP_SENT` when the phone is
/// already known and a fresh code was issued.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<ApiResponse<Registration>> {
    let registration = state.identity().register(&req.phone, &req.password).await?;

    Ok(match registration.outcome {
        RegistrationOutcome::Created => ApiResponse::created(registration).key("USER_CREATED"),
        RegistrationOutcome::Resent => ApiResponse::ok(registration).key("OTP_SENT"),
    })
}

/// POST /users/verify
///
/// Consumes the OTP, activates the user and binds the calling device if a
/// `Token` header is sent.
pub async fn verify(
    State(state): State<AppState>,
    MaybeDevice(device): MaybeDevice,
    Json(req): Json<VerifyRequest>,
) -> Result<ApiResponse<SessionResponse>> {
    let session = state
        .identity()
        .verify_and_bind(&req.phone, &req.code, device.as_ref())
        .await?;

    Ok(ApiResponse::ok(session.into()).key("VERIFIED"))
}

/// POST /users/login
pub async fn login(
    State(state): State<AppState>,
    MaybeDevice(device): MaybeDevice,
    Json(req): Json<Credentials>,
) -> Result<ApiResponse<SessionResponse>> {
    let session = state
        .identity()
        .login(&req.phone, &req.password, device.as_ref())
        .await?;

    Ok(ApiResponse::ok(session.into()).key("LOGGED_IN"))
}

/// POST /users/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<PhoneRequest>,
) -> Result<ApiResponse<Registration>> {
    let registration = state.identity().forgot_password(&req.phone).await?;
    Ok(ApiResponse::ok(registration).key("OTP_SENT"))
}

/// PATCH /users/set-password
pub async fn set_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<SetPasswordRequest>,
) -> Result<ApiResponse<()>> {
    state
        .identity()
        .set_password(&user, &req.password, &req.password_confirm)
        .await?;
    Ok(ApiResponse::message("PASSWORD_UPDATED"))
}

/// PATCH /users/update-password
pub async fn update_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<ApiResponse<()>> {
    state
        .identity()
        .update_password(&user, &req.password, &req.password1, &req.password2)
        .await?;
    Ok(ApiResponse::message("PASSWORD_UPDATED"))
}

/// GET /users/profile
pub async fn profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResponse<UserProfile> {
    ApiResponse::ok(state.identity().profile(&user))
}

/// PATCH /users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(patch): Json<ProfilePatch>,
) -> Result<ApiResponse<UserProfile>> {
    let profile = state.identity().update_profile(&user, patch).await?;
    Ok(ApiResponse::ok(profile))
}

/// POST /users/logout
///
/// Revokes the refresh token and, when a `Token` header is sent, logs the
/// device out.
pub async fn logout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    MaybeDevice(device): MaybeDevice,
    Json(req): Json<RefreshRequest>,
) -> Result<ApiResponse<()>> {
    state
        .identity()
        .logout(&user, &req.refresh, device.as_ref())
        .await?;
    clear_sentry_user();
    Ok(ApiResponse::message("LOGGED_OUT"))
}

/// POST /users/token/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<ApiResponse<AccessResponse>> {
    let access = state.identity().refresh(&req.refresh).await?;
    Ok(ApiResponse::ok(AccessResponse { access }))
}
