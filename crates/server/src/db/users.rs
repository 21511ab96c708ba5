//! User repository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use pantry_core::{Gender, Phone, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{NewUser, ProfileUpdate, User};

/// Constraint violated when a phone is registered twice.
pub const PHONE_UNIQUE: &str = "app_user_phone_key";
/// Constraint violated when a generated username collides.
pub const USERNAME_UNIQUE: &str = "app_user_username_key";

/// Storage port for users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError>;

    /// Insert a user.
    ///
    /// # Errors
    ///
    /// `Conflict(PHONE_UNIQUE)` or `Conflict(USERNAME_UNIQUE)` on duplicates.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Mark active and stamp `last_login`.
    async fn activate(&self, id: UserId, now: DateTime<Utc>) -> Result<User, RepositoryError>;

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError>;

    /// Grant or revoke the admin flag. Also marks the account active.
    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<User, RepositoryError>;

    /// Users ordered by id.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    phone: String,
    username: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    surname: String,
    gender: Option<Gender>,
    birthday: Option<NaiveDate>,
    is_active: bool,
    is_admin: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let phone = Phone::parse(&row.phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            phone,
            username: row.username,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            surname: row.surname,
            gender: row.gender,
            birthday: row.birthday,
            is_active: row.is_active,
            is_admin: row.is_admin,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `PostgreSQL` user repository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, phone, username, password_hash, first_name, last_name, surname,
                   gender, birthday, is_active, is_admin, last_login, created_at, updated_at
            FROM app_user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn get_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, phone, username, password_hash, first_name, last_name, surname,
                   gender, birthday, is_active, is_admin, last_login, created_at, updated_at
            FROM app_user
            WHERE phone = $1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO app_user (phone, username, password_hash, is_active, is_admin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, phone, username, password_hash, first_name, last_name, surname,
                      gender, birthday, is_active, is_admin, last_login, created_at, updated_at
            ",
        )
        .bind(user.phone.as_str())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        User::try_from(row)
    }

    async fn activate(&self, id: UserId, now: DateTime<Utc>) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            UPDATE app_user
            SET is_active = TRUE, last_login = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, phone, username, password_hash, first_name, last_name, surname,
                      gender, birthday, is_active, is_admin, last_login, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
        .and_then(User::try_from)
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE app_user SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            UPDATE app_user
            SET first_name = COALESCE($2, first_name),
                last_name  = COALESCE($3, last_name),
                surname    = COALESCE($4, surname),
                gender     = COALESCE($5, gender),
                birthday   = COALESCE($6, birthday),
                updated_at = now()
            WHERE id = $1
            RETURNING id, phone, username, password_hash, first_name, last_name, surname,
                      gender, birthday, is_active, is_admin, last_login, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.surname.as_deref())
        .bind(update.gender)
        .bind(update.birthday)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
        .and_then(User::try_from)
    }

    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            UPDATE app_user
            SET is_admin = $2, is_active = TRUE, updated_at = now()
            WHERE id = $1
            RETURNING id, phone, username, password_hash, first_name, last_name, surname,
                      gender, birthday, is_active, is_admin, last_login, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(is_admin)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
        .and_then(User::try_from)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, phone, username, password_hash, first_name, last_name, surname,
                   gender, birthday, is_active, is_admin, last_login, created_at, updated_at
            FROM app_user
            ORDER BY id
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }
}
