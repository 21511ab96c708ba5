//! Test doubles shared by unit and integration tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::{Clock, DefaultClock};
use pantry_core::{DevicePlatform, Language, Theme};
use secrecy::SecretString;

use crate::config::JwtConfig;
use crate::db::Repositories;
use crate::db::memory::MemoryStore;
use crate::models::Device;
use crate::services::devices::{DeviceError, DeviceRegistration, DeviceRegistry};
use crate::services::tokens::TokenService;
use crate::state::AppState;

/// A clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// JWT settings for tests.
#[must_use]
pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: SecretString::from("t3st-Jw7!k9Qz2#vX8@pL5$mN1&rB4*wC"),
        issuer: "pantry-test".to_string(),
        access_token_minutes: 60,
        refresh_token_days: 30,
    }
}

/// Application state over a fresh in-memory store and a controllable clock.
#[must_use]
pub fn memory_state() -> (AppState, Arc<MemoryStore>, Arc<MutableClock>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(MutableClock::new(Utc::now()));
    let state = AppState::new(
        Repositories::memory(&store),
        TokenService::new(&jwt_config()),
        clock.clone(),
    );
    (state, store, clock)
}

/// A valid Android registration for `device_id`.
#[must_use]
pub fn device_registration(device_id: &str) -> DeviceRegistration {
    DeviceRegistration {
        device_id: device_id.to_owned(),
        device_type: DevicePlatform::Android,
        device_model: "Samsung Galaxy S21".to_owned(),
        operation_version: "13".to_owned(),
        ip_address: "192.168.1.10".to_owned(),
        app_version: None,
        push_token: None,
        language: Language::default(),
        theme: Theme::default(),
    }
}

/// Register a device straight through the registry.
///
/// # Errors
///
/// Propagates registration failures.
pub async fn register_device(repos: &Repositories, device_id: &str) -> Result<Device, DeviceError> {
    DeviceRegistry::new(repos, &DefaultClock)
        .register(device_registration(device_id))
        .await
}
