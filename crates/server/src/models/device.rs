//! Device domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pantry_core::{AppVersionId, DeviceId, DevicePlatform, DeviceToken, Language, Theme, UserId};

/// An app installation, identified by its opaque token.
///
/// `is_active` is true exactly when `logged_out_at` is `None`.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    pub device_token: DeviceToken,
    /// Client-supplied hardware/install identifier, unique.
    pub device_id: String,
    pub platform: DevicePlatform,
    pub device_model: String,
    pub operation_version: String,
    pub ip_address: String,
    pub app_version_id: Option<AppVersionId>,
    pub push_token: Option<String>,
    pub language: Language,
    pub theme: Theme,
    pub is_active: bool,
    pub logged_out_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// e.g. `"Android - Samsung Galaxy S21"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.platform.label(), self.device_model)
    }
}

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub device_id: String,
    pub platform: DevicePlatform,
    pub device_model: String,
    pub operation_version: String,
    pub ip_address: String,
    pub app_version_id: Option<AppVersionId>,
    pub push_token: Option<String>,
    pub language: Language,
    pub theme: Theme,
}

/// Device as shown in listings. Never carries the token.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    pub id: DeviceId,
    pub device_id: String,
    pub device_type: DevicePlatform,
    pub device_model: String,
    pub display_name: String,
    pub operation_version: String,
    pub ip_address: String,
    pub app_version: Option<AppVersionId>,
    pub language: Language,
    pub theme: Theme,
    pub is_active: bool,
    pub logged_out_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub user: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl From<&Device> for DeviceView {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id,
            device_id: device.device_id.clone(),
            device_type: device.platform,
            device_model: device.device_model.clone(),
            display_name: device.display_name(),
            operation_version: device.operation_version.clone(),
            ip_address: device.ip_address.clone(),
            app_version: device.app_version_id,
            language: device.language,
            theme: device.theme,
            is_active: device.is_active,
            logged_out_at: device.logged_out_at,
            last_login: device.last_login,
            user: device.user_id,
            created_at: device.created_at,
        }
    }
}

/// Registration response: the listing view plus the freshly minted token.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredDevice {
    #[serde(flatten)]
    pub device: DeviceView,
    pub device_token: String,
}

impl From<&Device> for RegisteredDevice {
    fn from(device: &Device) -> Self {
        Self {
            device: DeviceView::from(device),
            device_token: device.device_token.as_str().to_owned(),
        }
    }
}

/// Device counts for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStatistics {
    pub all: i64,
    pub android: i64,
    pub ios: i64,
    pub online: i64,
    pub offline: i64,
}
