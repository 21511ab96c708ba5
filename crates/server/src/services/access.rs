//! Request capabilities.
//!
//! A request may carry a device (`Token` header), a user (bearer access
//! token), both, or neither. Endpoints declare a [`Capability`]; the lookup
//! helpers resolve whichever credentials are present and [`resolve`] decides
//! whether that is enough.

use thiserror::Error;

use crate::db::{Repositories, RepositoryError};
use crate::models::{Device, User};
use crate::services::devices::DeviceRegistry;
use crate::services::tokens::{TokenError, TokenService, TokenType};

/// Access requirement declared by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    MobileDeviceOnly,
    AuthenticatedUserOnly,
    /// A device, a user, or both.
    EitherOf,
    AdminOnly,
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("token header not provided")]
    TokenNotProvided,

    #[error("device not found")]
    DeviceNotFound,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("user not found")]
    UserNotFound,

    #[error("user inactive")]
    UserInactive,

    #[error("permission denied")]
    PermissionDenied,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<TokenError> for AccessError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid | TokenError::Encode(_) => Self::InvalidToken,
        }
    }
}

/// Identities attached to a request, handed explicitly to services.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub device: Option<Device>,
    pub user: Option<User>,
}

impl RequestContext {
    #[must_use]
    pub const fn device(device: Device) -> Self {
        Self {
            device: Some(device),
            user: None,
        }
    }

    #[must_use]
    pub const fn user(user: User) -> Self {
        Self {
            device: None,
            user: Some(user),
        }
    }
}

/// Decide whether the resolved identities satisfy `capability`.
///
/// # Errors
///
/// `TokenNotProvided` when a device is required but absent,
/// `NotAuthenticated` when a user (or any identity) is required but absent,
/// `PermissionDenied` when an admin is required and the user is not one.
pub fn resolve(
    capability: Capability,
    device: Option<Device>,
    user: Option<User>,
) -> Result<RequestContext, AccessError> {
    match capability {
        Capability::MobileDeviceOnly if device.is_none() => Err(AccessError::TokenNotProvided),
        Capability::AuthenticatedUserOnly if user.is_none() => {
            Err(AccessError::NotAuthenticated)
        }
        Capability::EitherOf if device.is_none() && user.is_none() => {
            Err(AccessError::NotAuthenticated)
        }
        Capability::AdminOnly => match &user {
            None => Err(AccessError::NotAuthenticated),
            Some(u) if !u.is_admin => {
                tracing::warn!(user_id = %u.id, "Admin capability denied");
                Err(AccessError::PermissionDenied)
            }
            Some(_) => Ok(RequestContext { device, user }),
        },
        _ => Ok(RequestContext { device, user }),
    }
}

/// Resolve the device behind a `Token` header value.
///
/// An absent header is `Ok(None)`; a present header naming no device is
/// `DeviceNotFound`, never silently anonymous.
///
/// # Errors
///
/// Returns `AccessError::DeviceNotFound` for an unknown token.
pub async fn device_from_header(
    registry: &DeviceRegistry<'_>,
    header: Option<&str>,
) -> Result<Option<Device>, AccessError> {
    let Some(token) = header else {
        return Ok(None);
    };

    match registry.resolve(token).await? {
        Some(device) => Ok(Some(device)),
        None => {
            tracing::debug!("Unknown device token");
            Err(AccessError::DeviceNotFound)
        }
    }
}

/// Resolve the user behind an `Authorization: Bearer` header value.
///
/// # Errors
///
/// `InvalidToken`/`TokenExpired` for a bad credential, `UserNotFound` if the
/// subject no longer exists, `UserInactive` if it has not been activated.
pub async fn user_from_bearer(
    repos: &Repositories,
    tokens: &TokenService,
    header: Option<&str>,
) -> Result<Option<User>, AccessError> {
    let Some(value) = header else {
        return Ok(None);
    };

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AccessError::InvalidToken)?;

    let claims = tokens.decode(token, TokenType::Access)?;

    let user = repos
        .users
        .get_by_id(claims.sub)
        .await?
        .ok_or(AccessError::UserNotFound)?;

    if !user.is_active {
        return Err(AccessError::UserInactive);
    }
    Ok(Some(user))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use pantry_core::Phone;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::NewUser;
    use crate::test_support::{MutableClock, jwt_config, register_device};

    async fn seed_user(repos: &Repositories, is_active: bool, is_admin: bool) -> User {
        repos
            .users
            .create(NewUser {
                phone: Phone::parse("+998901234567").unwrap(),
                username: "user_abc123".to_owned(),
                password_hash: String::new(),
                is_active,
                is_admin,
            })
            .await
            .unwrap()
    }

    fn repos() -> Repositories {
        Repositories::memory(&Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn capabilities_require_their_identity() {
        let repos = repos();
        let device = register_device(&repos, "hw-1").await.unwrap();
        let user = seed_user(&repos, true, false).await;

        assert!(matches!(
            resolve(Capability::MobileDeviceOnly, None, Some(user.clone())),
            Err(AccessError::TokenNotProvided)
        ));
        assert!(matches!(
            resolve(Capability::AuthenticatedUserOnly, Some(device.clone()), None),
            Err(AccessError::NotAuthenticated)
        ));
        assert!(matches!(
            resolve(Capability::EitherOf, None, None),
            Err(AccessError::NotAuthenticated)
        ));

        let ctx = resolve(Capability::EitherOf, Some(device), Some(user)).unwrap();
        assert!(ctx.device.is_some() && ctx.user.is_some());
    }

    #[tokio::test]
    async fn admin_requires_flag() {
        let repos = repos();
        let user = seed_user(&repos, true, false).await;

        assert!(matches!(
            resolve(Capability::AdminOnly, None, Some(user.clone())),
            Err(AccessError::PermissionDenied)
        ));

        let admin = User {
            is_admin: true,
            ..user
        };
        assert!(resolve(Capability::AdminOnly, None, Some(admin)).is_ok());
    }

    #[tokio::test]
    async fn missing_and_unknown_device_headers_differ() {
        let repos = repos();
        let clock = MutableClock::new(Utc::now());
        let registry = DeviceRegistry::new(&repos, &clock);
        let device = register_device(&repos, "hw-1").await.unwrap();

        assert!(device_from_header(&registry, None).await.unwrap().is_none());
        assert!(matches!(
            device_from_header(&registry, Some("deadbeef")).await,
            Err(AccessError::DeviceNotFound)
        ));
        assert!(matches!(
            device_from_header(&registry, Some("  ")).await,
            Err(AccessError::DeviceNotFound)
        ));

        let padded = format!(" {} ", device.device_token.as_str());
        let found = device_from_header(&registry, Some(&padded))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, device.id);
    }

    #[tokio::test]
    async fn bearer_resolves_active_user() {
        let repos = repos();
        let tokens = TokenService::new(&jwt_config());
        let user = seed_user(&repos, true, false).await;
        let pair = tokens.issue_pair(&user).unwrap();

        let header = format!("Bearer {}", pair.access);
        let resolved = user_from_bearer(&repos, &tokens, Some(&header))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, user.id);

        let refresh_header = format!("Bearer {}", pair.refresh);
        assert!(matches!(
            user_from_bearer(&repos, &tokens, Some(&refresh_header)).await,
            Err(AccessError::InvalidToken)
        ));
        assert!(matches!(
            user_from_bearer(&repos, &tokens, Some("Basic abc")).await,
            Err(AccessError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn bearer_for_inactive_user_is_rejected() {
        let repos = repos();
        let tokens = TokenService::new(&jwt_config());
        let user = seed_user(&repos, false, false).await;
        let header = format!("Bearer {}", tokens.issue_access(&user).unwrap());

        assert!(matches!(
            user_from_bearer(&repos, &tokens, Some(&header)).await,
            Err(AccessError::UserInactive)
        ));

        repos.users.activate(user.id, Utc::now()).await.unwrap();
        assert!(
            user_from_bearer(&repos, &tokens, Some(&header))
                .await
                .unwrap()
                .is_some()
        );
    }
}
