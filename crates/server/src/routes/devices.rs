//! Device registry routes, mounted under `/users/devices`.

use axum::extract::State;
use serde::Serialize;

use crate::error::Result;
use crate::extract::Json;
use crate::middleware::{AuthenticatedUser, MobileDevice};
use crate::models::{DeviceView, RegisteredDevice};
use crate::response::ApiResponse;
use crate::services::devices::DeviceRegistration;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LoggedOut {
    pub logged_out: u64,
}

/// POST /users/devices
///
/// The only response that ever carries the device token.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<DeviceRegistration>,
) -> Result<ApiResponse<RegisteredDevice>> {
    let device = state.devices().register(req).await?;
    Ok(ApiResponse::created(RegisteredDevice::from(&device)))
}

/// GET /users/devices/list
pub async fn list(
    State(state): State<AppState>,
    MobileDevice(device): MobileDevice,
) -> Result<ApiResponse<Vec<DeviceView>>> {
    let devices = state.devices().list_for(&device).await?;
    Ok(ApiResponse::ok(devices.iter().map(DeviceView::from).collect()))
}

/// POST /users/devices/logout
pub async fn logout(
    State(state): State<AppState>,
    MobileDevice(device): MobileDevice,
) -> Result<ApiResponse<DeviceView>> {
    let device = state.devices().logout(&device).await?;
    Ok(ApiResponse::ok(DeviceView::from(&device)).key("LOGGED_OUT"))
}

/// POST /users/devices/logout-all
pub async fn logout_all(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<ApiResponse<LoggedOut>> {
    let logged_out = state.devices().logout_all(user.id).await?;
    Ok(ApiResponse::ok(LoggedOut { logged_out }).key("LOGGED_OUT"))
}
