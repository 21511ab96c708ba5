//! Device registry.
//!
//! Registration is unauthenticated: it is how an installation gets its
//! identity in the first place. Uniqueness of the client `device_id` and of
//! the generated token is left to the store.

use std::net::IpAddr;

use mockable::Clock;
use serde::Deserialize;
use thiserror::Error;

use pantry_core::{AppVersionId, DevicePlatform, DeviceToken, Language, Theme, UserId};

use super::validation::{ValidationErrors, check_length};
use crate::db::devices::{DEVICE_ID_UNIQUE, DEVICE_TOKEN_UNIQUE};
use crate::db::{Repositories, RepositoryError};
use crate::models::{Device, NewDevice};

/// A 256-bit token collision is not expected; bound the retries anyway.
const TOKEN_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device already registered")]
    DuplicateDevice,

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Registration payload as sent by the app.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRegistration {
    pub device_id: String,
    pub device_type: DevicePlatform,
    pub device_model: String,
    #[serde(default)]
    pub operation_version: String,
    pub ip_address: String,
    #[serde(default)]
    pub app_version: Option<AppVersionId>,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub theme: Theme,
}

/// Creates, resolves and logs out devices.
pub struct DeviceRegistry<'a> {
    repos: &'a Repositories,
    clock: &'a dyn Clock,
}

impl<'a> DeviceRegistry<'a> {
    #[must_use]
    pub const fn new(repos: &'a Repositories, clock: &'a dyn Clock) -> Self {
        Self { repos, clock }
    }

    /// Register a new installation and mint its token.
    ///
    /// # Errors
    ///
    /// `DeviceError::Validation` for bad fields or an unknown app version,
    /// `DeviceError::DuplicateDevice` if `device_id` is already registered.
    pub async fn register(&self, input: DeviceRegistration) -> Result<Device, DeviceError> {
        let new_device = self.validate(input).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let token = DeviceToken::generate();
            match self.repos.devices.create(&new_device, &token).await {
                Ok(device) => {
                    tracing::info!(
                        device_id = %device.id,
                        platform = %device.platform,
                        "Device registered"
                    );
                    return Ok(device);
                }
                Err(e) if e.is_conflict_on(DEVICE_ID_UNIQUE) => {
                    tracing::info!(client_device_id = %new_device.device_id, "Duplicate device registration");
                    return Err(DeviceError::DuplicateDevice);
                }
                Err(e) if e.is_conflict_on(DEVICE_TOKEN_UNIQUE) && attempt < TOKEN_RETRIES => {
                    tracing::warn!(attempt, "Device token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn validate(&self, input: DeviceRegistration) -> Result<NewDevice, DeviceError> {
        let mut errors = ValidationErrors::new();

        let device_id = input.device_id.trim().to_owned();
        check_length(&mut errors, "device_id", &device_id, 1, 255);
        let device_model = input.device_model.trim().to_owned();
        check_length(&mut errors, "device_model", &device_model, 1, 128);
        let operation_version = input.operation_version.trim().to_owned();
        check_length(&mut errors, "operation_version", &operation_version, 0, 64);

        if !input.device_type.is_device_platform() {
            errors.add("device_type", "must be ANDROID or IOS");
        }

        let ip_address = match input.ip_address.trim().parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => {
                errors.add("ip_address", "must be a valid IP address");
                String::new()
            }
        };

        if let Some(version) = input.app_version
            && self.repos.app_versions.get(version).await?.is_none()
        {
            errors.add("app_version", "does not exist");
        }

        errors.into_result().map_err(DeviceError::Validation)?;

        Ok(NewDevice {
            device_id,
            platform: input.device_type,
            device_model,
            operation_version,
            ip_address,
            app_version_id: input.app_version,
            push_token: input.push_token.filter(|t| !t.trim().is_empty()),
            language: input.language,
            theme: input.theme,
        })
    }

    /// Look up the device presenting `token`. Surrounding whitespace is
    /// ignored; an empty or unknown token resolves to `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if storage fails.
    pub async fn resolve(&self, token: &str) -> Result<Option<Device>, RepositoryError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        self.repos.devices.get_by_token(token).await
    }

    /// Soft-disable the device. Logging out twice keeps the first timestamp.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Repository` if storage fails.
    pub async fn logout(&self, device: &Device) -> Result<Device, DeviceError> {
        let device = self.repos.devices.logout(device.id, self.clock.utc()).await?;
        tracing::info!(device_id = %device.id, "Device logged out");
        Ok(device)
    }

    /// Log out every active device bound to `user`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Repository` if storage fails.
    pub async fn logout_all(&self, user: UserId) -> Result<u64, DeviceError> {
        let count = self
            .repos
            .devices
            .logout_all_for_user(user, self.clock.utc())
            .await?;
        tracing::info!(user_id = %user, count, "Logged out all devices");
        Ok(count)
    }

    /// The caller's ownership group: its own device, plus every device of
    /// its user when bound.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Repository` if storage fails.
    pub async fn list_for(&self, device: &Device) -> Result<Vec<Device>, DeviceError> {
        match device.user_id {
            Some(user) => Ok(self.repos.devices.list_for_user(user).await?),
            None => Ok(vec![device.clone()]),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::NewAppVersion;
    use crate::test_support::{MutableClock, device_registration as registration};

    fn setup() -> (Repositories, MutableClock) {
        let store = Arc::new(MemoryStore::new());
        (Repositories::memory(&store), MutableClock::new(Utc::now()))
    }

    #[tokio::test]
    async fn register_mints_a_token_and_starts_active() {
        let (repos, clock) = setup();
        let registry = DeviceRegistry::new(&repos, &clock);

        let device = registry.register(registration("hw-1")).await.unwrap();

        assert_eq!(device.device_token.as_str().len(), DeviceToken::LENGTH);
        assert!(device.is_active);
        assert!(device.logged_out_at.is_none());
        assert!(device.user_id.is_none());
        assert_eq!(device.display_name(), "Android - Samsung Galaxy S21");

        let resolved = registry
            .resolve(device.device_token.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, device.id);
    }

    #[tokio::test]
    async fn duplicate_device_id_fails_once() {
        let (repos, clock) = setup();
        let registry = DeviceRegistry::new(&repos, &clock);

        let (a, b) = tokio::join!(
            registry.register(registration("hw-1")),
            registry.register(registration("hw-1")),
        );

        let outcomes = [a.is_ok(), b.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let err = a.err().or(b.err()).unwrap();
        assert!(matches!(err, DeviceError::DuplicateDevice));
    }

    #[tokio::test]
    async fn invalid_fields_are_reported_together() {
        let (repos, clock) = setup();
        let registry = DeviceRegistry::new(&repos, &clock);
        let mut input = registration("  ");
        input.ip_address = "not-an-ip".to_owned();
        input.device_type = DevicePlatform::All;
        input.app_version = Some(AppVersionId::new(999));

        let Err(DeviceError::Validation(errors)) = registry.register(input).await else {
            panic!("expected validation error");
        };
        assert!(errors.get("device_id").is_some());
        assert!(errors.get("ip_address").is_some());
        assert!(errors.get("device_type").is_some());
        assert_eq!(errors.get("app_version"), Some("does not exist"));
    }

    #[tokio::test]
    async fn known_app_version_is_accepted() {
        let (repos, clock) = setup();
        let version = repos
            .app_versions
            .create(&NewAppVersion {
                version: "1.2.0".to_owned(),
                platform: DevicePlatform::Android,
                is_active: true,
                force_update: false,
                description: String::new(),
            })
            .await
            .unwrap();
        let registry = DeviceRegistry::new(&repos, &clock);
        let mut input = registration("hw-1");
        input.app_version = Some(version.id);

        let device = registry.register(input).await.unwrap();
        assert_eq!(device.app_version_id, Some(version.id));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (repos, clock) = setup();
        let registry = DeviceRegistry::new(&repos, &clock);
        let device = registry.register(registration("hw-1")).await.unwrap();

        let first = registry.logout(&device).await.unwrap();
        clock.advance_seconds(30);
        let second = registry.logout(&device).await.unwrap();

        assert!(!second.is_active);
        assert_eq!(first.logged_out_at, second.logged_out_at);
    }

    #[tokio::test]
    async fn unbound_device_lists_only_itself() {
        let (repos, clock) = setup();
        let registry = DeviceRegistry::new(&repos, &clock);
        let device = registry.register(registration("hw-1")).await.unwrap();
        registry.register(registration("hw-2")).await.unwrap();

        let listed = registry.list_for(&device).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, device.id);
    }
}
