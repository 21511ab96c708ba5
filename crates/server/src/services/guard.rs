//! Ownership checks for device-owned resources.
//!
//! Every cart, rating and vote hangs off exactly one device. A caller may
//! touch it when it presents that device, or when it is authenticated as the
//! user the owning device is currently bound to. Presenting a *different*
//! device of the same user is not enough on its own.

use thiserror::Error;

use pantry_core::{DeviceId, UserId};

use super::access::RequestContext;
use super::validation::ValidationErrors;
use crate::db::{Repositories, RepositoryError};
use crate::models::{Cart, Device, Rating, Vote};

/// Errors shared by the device-owned resource services.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    /// The caller has no device to own a new resource.
    #[error("device not found")]
    DeviceNotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<ValidationErrors> for ResourceError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// The owning device of a resource and the user it is bound to right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOwner {
    pub device_id: DeviceId,
    pub user_id: Option<UserId>,
}

/// A resource owned through a device.
pub trait Owned {
    fn owner(&self) -> DeviceOwner;
}

impl Owned for Cart {
    fn owner(&self) -> DeviceOwner {
        DeviceOwner {
            device_id: self.device_id,
            user_id: self.owner_user_id,
        }
    }
}

impl Owned for Rating {
    fn owner(&self) -> DeviceOwner {
        DeviceOwner {
            device_id: self.device_id,
            user_id: self.owner_user_id,
        }
    }
}

impl Owned for Vote {
    fn owner(&self) -> DeviceOwner {
        DeviceOwner {
            device_id: self.device_id,
            user_id: self.owner_user_id,
        }
    }
}

impl Owned for Device {
    fn owner(&self) -> DeviceOwner {
        DeviceOwner {
            device_id: self.id,
            user_id: self.user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

/// Same device, or authenticated as the owning device's user.
#[must_use]
pub fn authorize(ctx: &RequestContext, owner: &DeviceOwner) -> Decision {
    if ctx.device.as_ref().is_some_and(|d| d.id == owner.device_id) {
        return Decision::Allowed;
    }

    match (owner.user_id, &ctx.user) {
        (Some(owner_user), Some(user)) if owner_user == user.id => Decision::Allowed,
        _ => Decision::Denied,
    }
}

/// Existence first, then ownership.
///
/// # Errors
///
/// `ResourceError::NotFound` for `None`, `ResourceError::PermissionDenied`
/// when [`authorize`] denies.
pub fn ensure<T: Owned>(ctx: &RequestContext, resource: Option<T>) -> Result<T, ResourceError> {
    let resource = resource.ok_or(ResourceError::NotFound)?;
    let owner = resource.owner();

    match authorize(ctx, &owner) {
        Decision::Allowed => Ok(resource),
        Decision::Denied => {
            tracing::warn!(
                owner_device_id = %owner.device_id,
                caller_device_id = ?ctx.device.as_ref().map(|d| d.id),
                caller_user_id = ?ctx.user.as_ref().map(|u| u.id),
                "Ownership check denied"
            );
            Err(ResourceError::PermissionDenied)
        }
    }
}

/// The device a new resource is created under: the presented device, else
/// the bearer user's most recently logged-in device.
///
/// # Errors
///
/// `ResourceError::DeviceNotFound` when neither yields a device.
pub async fn acting_device(
    repos: &Repositories,
    ctx: &RequestContext,
) -> Result<DeviceId, ResourceError> {
    if let Some(device) = &ctx.device {
        return Ok(device.id);
    }
    let Some(user) = &ctx.user else {
        return Err(ResourceError::DeviceNotFound);
    };

    repos
        .devices
        .latest_for_user(user.id)
        .await?
        .map(|d| d.id)
        .ok_or(ResourceError::DeviceNotFound)
}
