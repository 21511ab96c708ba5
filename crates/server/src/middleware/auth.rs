//! Capability extractors.
//!
//! Each extractor resolves the credentials a request carries (the `Token`
//! header for a device, `Authorization: Bearer` for a user) and checks them
//! against one [`Capability`]. Handlers name the extractor matching the
//! access they need:
//!
//! ```rust,ignore
//! async fn list_carts(MobileDevice(device): MobileDevice, MaybeUser(user): MaybeUser) { .. }
//! async fn get_cart(Caller(ctx): Caller, Path(id): Path<CartId>) { .. }
//! ```
//!
//! A present but unusable credential is always an error, even where the
//! credential is optional.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{ApiError, set_sentry_user};
use crate::models::{Device, User};
use crate::services::access::{self, Capability, RequestContext};
use crate::state::AppState;

/// Header carrying the opaque device token.
pub const DEVICE_TOKEN_HEADER: &str = "token";

/// A present header that is not visible ASCII reads as an empty value, so it
/// fails as an unusable credential rather than passing as absent.
fn header<'a>(parts: &'a Parts, name: impl axum::http::header::AsHeaderName) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .map(|v| v.to_str().unwrap_or_default())
}

async fn device(parts: &Parts, state: &AppState) -> Result<Option<Device>, ApiError> {
    Ok(access::device_from_header(&state.devices(), header(parts, DEVICE_TOKEN_HEADER)).await?)
}

async fn user(parts: &Parts, state: &AppState) -> Result<Option<User>, ApiError> {
    Ok(access::user_from_bearer(state.repos(), state.tokens(), header(parts, AUTHORIZATION)).await?)
}

fn tag_sentry(ctx: &RequestContext) {
    if let Some(user) = &ctx.user {
        set_sentry_user(&user.id, ctx.device.as_ref().map(|d| d.device_id.as_str()));
    } else if let Some(device) = &ctx.device {
        sentry::configure_scope(|scope| scope.set_tag("device_id", &device.device_id));
    }
}

async fn context(
    parts: &Parts,
    state: &AppState,
    capability: Capability,
) -> Result<RequestContext, ApiError> {
    let device = device(parts, state).await?;
    let user = user(parts, state).await?;
    let ctx = access::resolve(capability, device, user)?;
    tag_sentry(&ctx);
    Ok(ctx)
}

/// Requires a registered device.
#[derive(Debug, Clone)]
pub struct MobileDevice(pub Device);

impl FromRequestParts<AppState> for MobileDevice {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let device = device(parts, state).await?;
        let ctx = access::resolve(Capability::MobileDeviceOnly, device, None)?;
        tag_sentry(&ctx);
        ctx.device
            .map(Self)
            .ok_or_else(|| access::AccessError::TokenNotProvided.into())
    }
}

/// The device if a `Token` header is sent.
#[derive(Debug, Clone)]
pub struct MaybeDevice(pub Option<Device>);

impl FromRequestParts<AppState> for MaybeDevice {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(device(parts, state).await?))
    }
}

/// Requires an active user behind a valid access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = user(parts, state).await?;
        let ctx = access::resolve(Capability::AuthenticatedUserOnly, None, user)?;
        tag_sentry(&ctx);
        ctx.user
            .map(Self)
            .ok_or_else(|| access::AccessError::NotAuthenticated.into())
    }
}

/// The user if a bearer token is sent.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(user(parts, state).await?))
    }
}

/// A device, a user, or both.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(context(parts, state, Capability::EitherOf).await?))
    }
}

/// Requires an administrator.
#[derive(Debug, Clone)]
pub struct Admin(pub User);

impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = user(parts, state).await?;
        let ctx = access::resolve(Capability::AdminOnly, None, user)?;
        tag_sentry(&ctx);
        ctx.user
            .map(Self)
            .ok_or_else(|| access::AccessError::NotAuthenticated.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode};

    use super::*;
    use crate::test_support::{memory_state, register_device};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::get("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn mobile_device_requires_the_header() {
        let (state, _, _) = memory_state();

        let err = MobileDevice::from_request_parts(&mut parts(&[]), &state)
            .await
            .unwrap_err();
        assert_eq!(err.message_key(), "TOKEN_IS_NOT_PROVIDED");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_device_token_is_not_anonymous() {
        let (state, _, _) = memory_state();

        let err = MaybeDevice::from_request_parts(&mut parts(&[("token", "nope")]), &state)
            .await
            .unwrap_err();
        assert_eq!(err.message_key(), "DEVICE_NOT_FOUND");
    }

    #[tokio::test]
    async fn registered_device_is_resolved() {
        let (state, _, _) = memory_state();
        let registered = register_device(state.repos(), "hw-1").await.unwrap();

        let MobileDevice(device) = MobileDevice::from_request_parts(
            &mut parts(&[("token", registered.device_token.as_str())]),
            &state,
        )
        .await
        .unwrap();
        assert_eq!(device.id, registered.id);

        let Caller(ctx) = Caller::from_request_parts(
            &mut parts(&[("token", registered.device_token.as_str())]),
            &state,
        )
        .await
        .unwrap();
        assert!(ctx.user.is_none());
    }

    #[tokio::test]
    async fn caller_needs_some_identity() {
        let (state, _, _) = memory_state();

        let err = Caller::from_request_parts(&mut parts(&[]), &state)
            .await
            .unwrap_err();
        assert_eq!(err.message_key(), "NOT_AUTHENTICATED");
    }

    #[tokio::test]
    async fn malformed_bearer_is_rejected() {
        let (state, _, _) = memory_state();

        let err = MaybeUser::from_request_parts(&mut parts(&[("authorization", "Token abc")]), &state)
            .await
            .unwrap_err();
        assert_eq!(err.message_key(), "INVALID_TOKEN");

        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts(&[]), &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
