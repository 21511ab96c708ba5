//! Public release check.

use axum::extract::State;
use serde::Deserialize;

use pantry_core::DevicePlatform;

use crate::error::Result;
use crate::extract::Query;
use crate::models::AppVersion;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    #[serde(default)]
    pub platform: Option<DevicePlatform>,
}

/// GET /app-versions/latest?platform=ANDROID|IOS
///
/// Without a platform only the cross-platform release is considered.
pub async fn latest(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<ApiResponse<AppVersion>> {
    let platform = query.platform.unwrap_or(DevicePlatform::All);
    let version = state.app_versions().latest(platform).await?;
    Ok(ApiResponse::ok(version))
}
