//! Administrator routes. Every handler requires [`Admin`].

use axum::extract::State;
use axum::http::StatusCode;

use pantry_core::{AppVersionId, DeviceId, UserId};

use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::Admin;
use crate::models::{AppVersion, DeviceStatistics};
use crate::response::ApiResponse;
use crate::services::admin::{AdminUserDetail, AdminUserView, Page};
use crate::services::app_versions::PublishVersion;
use crate::state::AppState;

/// GET /admin/users?limit=&offset=
pub async fn list_users(
    State(state): State<AppState>,
    Admin(_): Admin,
    Query(page): Query<Page>,
) -> Result<ApiResponse<Vec<AdminUserView>>> {
    Ok(ApiResponse::ok(state.admin().list_users(page).await?))
}

/// GET /admin/users/statistics
pub async fn statistics(
    State(state): State<AppState>,
    Admin(_): Admin,
) -> Result<ApiResponse<DeviceStatistics>> {
    Ok(ApiResponse::ok(state.admin().statistics().await?))
}

/// GET /admin/users/{id}
pub async fn user_detail(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(id): Path<UserId>,
) -> Result<ApiResponse<AdminUserDetail>> {
    Ok(ApiResponse::ok(state.admin().user_detail(id).await?))
}

/// DELETE /admin/users/{id}/devices/{device_id}
pub async fn logout_user_device(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path((user, device)): Path<(UserId, DeviceId)>,
) -> Result<StatusCode> {
    state.admin().logout_user_device(user, device).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/app-versions
pub async fn publish_version(
    State(state): State<AppState>,
    Admin(_): Admin,
    Json(req): Json<PublishVersion>,
) -> Result<ApiResponse<AppVersion>> {
    Ok(ApiResponse::created(state.app_versions().publish(req).await?))
}

/// POST /admin/app-versions/{id}/activate
pub async fn activate_version(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(id): Path<AppVersionId>,
) -> Result<ApiResponse<AppVersion>> {
    Ok(ApiResponse::ok(state.app_versions().activate(id).await?))
}
