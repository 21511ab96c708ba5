//! Per-platform release gate.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pantry_core::{AppVersionId, DevicePlatform};

/// A published app release.
#[derive(Debug, Clone, Serialize)]
pub struct AppVersion {
    pub id: AppVersionId,
    pub version: String,
    #[serde(rename = "device_type")]
    pub platform: DevicePlatform,
    pub is_active: bool,
    pub force_update: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new release.
#[derive(Debug, Clone)]
pub struct NewAppVersion {
    pub version: String,
    pub platform: DevicePlatform,
    pub is_active: bool,
    pub force_update: bool,
    pub description: String,
}
