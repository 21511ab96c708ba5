//! Storage layer.
//!
//! Every aggregate has an `async_trait` repository port and a `PostgreSQL`
//! implementation beside it. Services only ever see the traits, bundled in
//! [`Repositories`], so the same service code runs against the in-memory
//! store in tests.
//!
//! ## Tables
//!
//! - `app_user` - Phone accounts
//! - `device` - App installations (`device_token`, `device_id` unique)
//! - `phone_otp` - Verification codes (one unused row per phone)
//! - `app_version` - Releases (one active row per platform)
//! - `revoked_token` - Refresh tokens revoked by logout
//! - `cart`, `cart_product` - Per-device shopping lists
//! - `product`, `color`, `recipe`, `recipe_ingredient`, `answer`, ... - Catalog
//! - `recipe_rating`, `vote` - Device-owned feedback
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p pantry-cli -- migrate
//! ```

pub mod app_versions;
pub mod carts;
pub mod catalog;
pub mod devices;
pub mod otps;
pub mod ratings;
pub mod tokens;
pub mod users;
pub mod votes;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use app_versions::{AppVersionRepository, PgAppVersionRepository};
pub use carts::{CartRepository, PgCartRepository};
pub use catalog::{CatalogRepository, PgCatalogRepository};
pub use devices::{DeviceRepository, PgDeviceRepository};
pub use otps::{OtpRepository, PgOtpRepository};
pub use ratings::{PgRatingRepository, RatingRepository};
pub use tokens::{PgRevokedTokenRepository, RevokedTokenRepository};
pub use users::{PgUserRepository, UserRepository};
pub use votes::{PgVoteRepository, VoteRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation. Carries the violated constraint name.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether this is a unique violation of the named constraint.
    #[must_use]
    pub fn is_conflict_on(&self, constraint: &str) -> bool {
        matches!(self, Self::Conflict(name) if name == constraint)
    }
}

/// Turn unique violations into [`RepositoryError::Conflict`].
pub(crate) fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        let constraint = db_err.constraint().unwrap_or("unique").to_owned();
        return RepositoryError::Conflict(constraint);
    }
    RepositoryError::Database(err)
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Succeeds when the store answers a trivial query.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` health probe.
#[derive(Clone)]
pub struct PgStoreHealth {
    pool: PgPool,
}

#[async_trait]
impl StoreHealth for PgStoreHealth {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// All repository ports, cheaply cloneable.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub otps: Arc<dyn OtpRepository>,
    pub app_versions: Arc<dyn AppVersionRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub ratings: Arc<dyn RatingRepository>,
    pub votes: Arc<dyn VoteRepository>,
    pub revoked_tokens: Arc<dyn RevokedTokenRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    /// Wire every port to `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            devices: Arc::new(PgDeviceRepository::new(pool.clone())),
            otps: Arc::new(PgOtpRepository::new(pool.clone())),
            app_versions: Arc::new(PgAppVersionRepository::new(pool.clone())),
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            catalog: Arc::new(PgCatalogRepository::new(pool.clone())),
            ratings: Arc::new(PgRatingRepository::new(pool.clone())),
            votes: Arc::new(PgVoteRepository::new(pool.clone())),
            revoked_tokens: Arc::new(PgRevokedTokenRepository::new(pool.clone())),
            health: Arc::new(PgStoreHealth { pool: pool.clone() }),
        }
    }

    /// Wire every port to one shared in-memory store.
    #[cfg(any(test, feature = "test-support"))]
    #[must_use]
    pub fn memory(store: &Arc<memory::MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            devices: store.clone(),
            otps: store.clone(),
            app_versions: store.clone(),
            carts: store.clone(),
            catalog: store.clone(),
            ratings: store.clone(),
            votes: store.clone(),
            revoked_tokens: store.clone(),
            health: store.clone(),
        }
    }
}

/// Create a `PostgreSQL` connection pool.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
