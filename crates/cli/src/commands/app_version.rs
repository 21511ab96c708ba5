//! `pantry-cli app-version publish`.

use pantry_core::DevicePlatform;
use pantry_server::db::Repositories;
use pantry_server::services::app_versions::{AppVersionService, PublishVersion};

use super::{CommandError, connect};

/// Publish an active release for `platform`.
pub async fn publish(
    version: String,
    platform: DevicePlatform,
    force_update: bool,
    description: String,
) -> Result<(), CommandError> {
    let pool = connect().await?;
    let repos = Repositories::postgres(&pool);

    let published = AppVersionService::new(&repos)
        .publish(PublishVersion {
            version,
            platform,
            is_active: true,
            force_update,
            description,
        })
        .await?;

    tracing::info!(
        "Published {} for {} (id {}, force_update: {})",
        published.version,
        published.platform,
        published.id,
        published.force_update
    );
    Ok(())
}
