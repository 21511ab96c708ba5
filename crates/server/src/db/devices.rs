//! Device repository.
//!
//! Uniqueness of `device_id` and `device_token` is enforced by constraints,
//! so two racing registrations resolve to one row and one conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pantry_core::{
    AppVersionId, DeviceId, DevicePlatform, DeviceToken, Language, Theme, UserId,
};

use super::{RepositoryError, map_unique_violation};
use crate::models::{Device, DeviceStatistics, NewDevice};

/// Constraint violated by a second registration of the same hardware id.
pub const DEVICE_ID_UNIQUE: &str = "device_device_id_key";
/// Constraint violated by a token collision.
pub const DEVICE_TOKEN_UNIQUE: &str = "device_device_token_key";

/// Storage port for devices.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert an active, unbound device.
    ///
    /// # Errors
    ///
    /// `Conflict(DEVICE_ID_UNIQUE)` or `Conflict(DEVICE_TOKEN_UNIQUE)` on duplicates.
    async fn create(
        &self,
        device: &NewDevice,
        token: &DeviceToken,
    ) -> Result<Device, RepositoryError>;

    /// Look up by the raw `Token` header value.
    async fn get_by_token(&self, token: &str) -> Result<Option<Device>, RepositoryError>;

    async fn get_by_id(&self, id: DeviceId) -> Result<Option<Device>, RepositoryError>;

    /// Attach to `user` and mark signed in, in one statement.
    async fn bind_user(
        &self,
        id: DeviceId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Device, RepositoryError>;

    /// Soft-disable. Keeps the first `logged_out_at` when already logged out.
    async fn logout(&self, id: DeviceId, now: DateTime<Utc>) -> Result<Device, RepositoryError>;

    /// Log out every active device of `user`; returns how many changed.
    async fn logout_all_for_user(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Device>, RepositoryError>;

    /// The user's device with the most recent login.
    async fn latest_for_user(&self, user: UserId) -> Result<Option<Device>, RepositoryError>;

    async fn statistics(&self) -> Result<DeviceStatistics, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: DeviceId,
    device_token: DeviceToken,
    device_id: String,
    platform: DevicePlatform,
    device_model: String,
    operation_version: String,
    ip_address: String,
    app_version_id: Option<AppVersionId>,
    push_token: Option<String>,
    language: Language,
    theme: Theme,
    is_active: bool,
    logged_out_at: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
    user_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: row.id,
            device_token: row.device_token,
            device_id: row.device_id,
            platform: row.platform,
            device_model: row.device_model,
            operation_version: row.operation_version,
            ip_address: row.ip_address,
            app_version_id: row.app_version_id,
            push_token: row.push_token,
            language: row.language,
            theme: row.theme,
            is_active: row.is_active,
            logged_out_at: row.logged_out_at,
            last_login: row.last_login,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatisticsRow {
    all: i64,
    android: i64,
    ios: i64,
    online: i64,
    offline: i64,
}

/// `PostgreSQL` device repository.
#[derive(Clone)]
pub struct PgDeviceRepository {
    pool: PgPool,
}

impl PgDeviceRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    async fn create(
        &self,
        device: &NewDevice,
        token: &DeviceToken,
    ) -> Result<Device, RepositoryError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r"
            INSERT INTO device (device_token, device_id, platform, device_model,
                                operation_version, ip_address, app_version_id,
                                push_token, language, theme)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, device_token, device_id, platform, device_model, operation_version,
                      ip_address, app_version_id, push_token, language, theme, is_active,
                      logged_out_at, last_login, user_id, created_at, updated_at
            ",
        )
        .bind(token)
        .bind(&device.device_id)
        .bind(device.platform)
        .bind(&device.device_model)
        .bind(&device.operation_version)
        .bind(&device.ip_address)
        .bind(device.app_version_id)
        .bind(device.push_token.as_deref())
        .bind(device.language)
        .bind(device.theme)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(row.into())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Device>, RepositoryError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r"
            SELECT id, device_token, device_id, platform, device_model, operation_version,
                   ip_address, app_version_id, push_token, language, theme, is_active,
                   logged_out_at, last_login, user_id, created_at, updated_at
            FROM device
            WHERE device_token = $1
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_by_id(&self, id: DeviceId) -> Result<Option<Device>, RepositoryError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r"
            SELECT id, device_token, device_id, platform, device_model, operation_version,
                   ip_address, app_version_id, push_token, language, theme, is_active,
                   logged_out_at, last_login, user_id, created_at, updated_at
            FROM device
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn bind_user(
        &self,
        id: DeviceId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Device, RepositoryError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r"
            UPDATE device
            SET user_id = $2, is_active = TRUE, logged_out_at = NULL,
                last_login = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, device_token, device_id, platform, device_model, operation_version,
                      ip_address, app_version_id, push_token, language, theme, is_active,
                      logged_out_at, last_login, user_id, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(user)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn logout(&self, id: DeviceId, now: DateTime<Utc>) -> Result<Device, RepositoryError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r"
            UPDATE device
            SET is_active = FALSE,
                logged_out_at = COALESCE(logged_out_at, $2),
                updated_at = now()
            WHERE id = $1
            RETURNING id, device_token, device_id, platform, device_model, operation_version,
                      ip_address, app_version_id, push_token, language, theme, is_active,
                      logged_out_at, last_login, user_id, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn logout_all_for_user(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE device
            SET is_active = FALSE, logged_out_at = $2, updated_at = now()
            WHERE user_id = $1 AND is_active
            ",
        )
        .bind(user)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Device>, RepositoryError> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            r"
            SELECT id, device_token, device_id, platform, device_model, operation_version,
                   ip_address, app_version_id, push_token, language, theme, is_active,
                   logged_out_at, last_login, user_id, created_at, updated_at
            FROM device
            WHERE user_id = $1
            ORDER BY id
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn latest_for_user(&self, user: UserId) -> Result<Option<Device>, RepositoryError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r"
            SELECT id, device_token, device_id, platform, device_model, operation_version,
                   ip_address, app_version_id, push_token, language, theme, is_active,
                   logged_out_at, last_login, user_id, created_at, updated_at
            FROM device
            WHERE user_id = $1
            ORDER BY last_login DESC NULLS LAST, id DESC
            LIMIT 1
            ",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn statistics(&self) -> Result<DeviceStatistics, RepositoryError> {
        let row = sqlx::query_as::<_, StatisticsRow>(
            r#"
            SELECT count(*)                                     AS "all",
                   count(*) FILTER (WHERE platform = 'ANDROID') AS android,
                   count(*) FILTER (WHERE platform = 'IOS')     AS ios,
                   count(*) FILTER (WHERE is_active)            AS online,
                   count(*) FILTER (WHERE NOT is_active)        AS offline
            FROM device
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DeviceStatistics {
            all: row.all,
            android: row.android,
            ios: row.ios,
            online: row.online,
            offline: row.offline,
        })
    }
}
