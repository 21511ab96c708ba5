//! Revoked refresh tokens.
//!
//! Rows only need to outlive the token they block, so each revoke also
//! purges entries whose token has already expired.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

/// Storage port for the refresh token denylist.
#[async_trait]
pub trait RevokedTokenRepository: Send + Sync {
    /// Block `jti` until `expires_at`. Revoking twice is a no-op.
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError>;
}

/// `PostgreSQL` denylist.
#[derive(Clone)]
pub struct PgRevokedTokenRepository {
    pool: PgPool,
}

impl PgRevokedTokenRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevokedTokenRepository for PgRevokedTokenRepository {
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM revoked_token WHERE expires_at < now()")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            INSERT INTO revoked_token (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO NOTHING
            ",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_token WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }
}
