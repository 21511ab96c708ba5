//! App version repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use pantry_core::{AppVersionId, DevicePlatform};

use super::{RepositoryError, map_unique_violation};
use crate::models::{AppVersion, NewAppVersion};

/// Partial unique index allowing one active release per platform.
pub const ACTIVE_PLATFORM_UNIQUE: &str = "app_version_active_platform_idx";

/// Storage port for app releases.
#[async_trait]
pub trait AppVersionRepository: Send + Sync {
    async fn get(&self, id: AppVersionId) -> Result<Option<AppVersion>, RepositoryError>;

    /// Insert a release. An active one first deactivates the other active
    /// release of the same platform, in the same transaction.
    async fn create(&self, version: &NewAppVersion) -> Result<AppVersion, RepositoryError>;

    /// Make `id` the active release of its platform.
    async fn activate(&self, id: AppVersionId) -> Result<AppVersion, RepositoryError>;

    /// The active release targeting exactly `platform`.
    async fn active_for(
        &self,
        platform: DevicePlatform,
    ) -> Result<Option<AppVersion>, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct AppVersionRow {
    id: AppVersionId,
    version: String,
    platform: DevicePlatform,
    is_active: bool,
    force_update: bool,
    description: String,
    created_at: DateTime<Utc>,
}

impl From<AppVersionRow> for AppVersion {
    fn from(row: AppVersionRow) -> Self {
        Self {
            id: row.id,
            version: row.version,
            platform: row.platform,
            is_active: row.is_active,
            force_update: row.force_update,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL` app version repository.
#[derive(Clone)]
pub struct PgAppVersionRepository {
    pool: PgPool,
}

impl PgAppVersionRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Deactivate the platform's live release other than `keep`.
async fn deactivate_platform(
    tx: &mut Transaction<'_, Postgres>,
    platform: DevicePlatform,
    keep: Option<AppVersionId>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE app_version
        SET is_active = FALSE, force_update = FALSE
        WHERE platform = $1 AND is_active AND ($2::INTEGER IS NULL OR id <> $2)
        ",
    )
    .bind(platform)
    .bind(keep)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl AppVersionRepository for PgAppVersionRepository {
    async fn get(&self, id: AppVersionId) -> Result<Option<AppVersion>, RepositoryError> {
        let row = sqlx::query_as::<_, AppVersionRow>(
            r"
            SELECT id, version, platform, is_active, force_update, description, created_at
            FROM app_version
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn create(&self, version: &NewAppVersion) -> Result<AppVersion, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if version.is_active {
            deactivate_platform(&mut tx, version.platform, None).await?;
        }

        let row = sqlx::query_as::<_, AppVersionRow>(
            r"
            INSERT INTO app_version (version, platform, is_active, force_update, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, version, platform, is_active, force_update, description, created_at
            ",
        )
        .bind(&version.version)
        .bind(version.platform)
        .bind(version.is_active)
        .bind(version.force_update)
        .bind(&version.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn activate(&self, id: AppVersionId) -> Result<AppVersion, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let platform: Option<DevicePlatform> =
            sqlx::query_scalar("SELECT platform FROM app_version WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let platform = platform.ok_or(RepositoryError::NotFound)?;

        deactivate_platform(&mut tx, platform, Some(id)).await?;

        let row = sqlx::query_as::<_, AppVersionRow>(
            r"
            UPDATE app_version
            SET is_active = TRUE
            WHERE id = $1
            RETURNING id, version, platform, is_active, force_update, description, created_at
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn active_for(
        &self,
        platform: DevicePlatform,
    ) -> Result<Option<AppVersion>, RepositoryError> {
        let row = sqlx::query_as::<_, AppVersionRow>(
            r"
            SELECT id, version, platform, is_active, force_update, description, created_at
            FROM app_version
            WHERE platform = $1 AND is_active
            ",
        )
        .bind(platform)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}
