//! Phone OTP repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pantry_core::{OtpId, Phone};

use super::{RepositoryError, map_unique_violation};
use crate::models::PhoneOtp;

/// Storage port for verification codes.
#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// Delete every unused code for `phone` and insert a new one, atomically.
    async fn replace_unused(
        &self,
        phone: &Phone,
        code: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<PhoneOtp, RepositoryError>;

    /// Most recently created unused code for `phone`.
    async fn latest_unused(&self, phone: &Phone) -> Result<Option<PhoneOtp>, RepositoryError>;

    async fn delete(&self, id: OtpId) -> Result<(), RepositoryError>;

    /// Take one attempt if fewer than `max_attempts` are spent; returns the
    /// new count, or `None` once the budget is gone or the code is consumed.
    async fn reserve_attempt(
        &self,
        id: OtpId,
        max_attempts: i32,
    ) -> Result<Option<i32>, RepositoryError>;

    /// Flip `used` and hand back the attempt reserved for the matching
    /// comparison. Returns `false` if the code was already consumed.
    async fn mark_used(&self, id: OtpId) -> Result<bool, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct OtpRow {
    id: OtpId,
    phone: String,
    code: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    attempts: i32,
    used: bool,
}

impl TryFrom<OtpRow> for PhoneOtp {
    type Error = RepositoryError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let phone = Phone::parse(&row.phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            phone,
            code: row.code,
            created_at: row.created_at,
            expires_at: row.expires_at,
            attempts: row.attempts,
            used: row.used,
        })
    }
}

/// `PostgreSQL` OTP repository.
#[derive(Clone)]
pub struct PgOtpRepository {
    pool: PgPool,
}

impl PgOtpRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpRepository for PgOtpRepository {
    async fn replace_unused(
        &self,
        phone: &Phone,
        code: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<PhoneOtp, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM phone_otp WHERE phone = $1 AND NOT used")
            .bind(phone.as_str())
            .execute(&mut *tx)
            .await?;

        // A concurrent issue for the same phone trips the partial unique index
        let row = sqlx::query_as::<_, OtpRow>(
            r"
            INSERT INTO phone_otp (phone, code, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, phone, code, created_at, expires_at, attempts, used
            ",
        )
        .bind(phone.as_str())
        .bind(code)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;

        PhoneOtp::try_from(row)
    }

    async fn latest_unused(&self, phone: &Phone) -> Result<Option<PhoneOtp>, RepositoryError> {
        sqlx::query_as::<_, OtpRow>(
            r"
            SELECT id, phone, code, created_at, expires_at, attempts, used
            FROM phone_otp
            WHERE phone = $1 AND NOT used
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(PhoneOtp::try_from)
        .transpose()
    }

    async fn delete(&self, id: OtpId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM phone_otp WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reserve_attempt(
        &self,
        id: OtpId,
        max_attempts: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        // Check and increment in one statement so concurrent guesses cannot
        // overshoot the budget
        let attempts: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE phone_otp
            SET attempts = attempts + 1
            WHERE id = $1 AND NOT used AND attempts < $2
            RETURNING attempts
            ",
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempts)
    }

    async fn mark_used(&self, id: OtpId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE phone_otp
            SET used = TRUE, attempts = GREATEST(attempts - 1, 0)
            WHERE id = $1 AND NOT used
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
