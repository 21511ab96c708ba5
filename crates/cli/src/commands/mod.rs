//! Subcommand implementations.

pub mod admin;
pub mod app_version;
pub mod migrate;

use pantry_server::config::{ConfigError, get_database_url};
use pantry_server::services::guard::ResourceError;
use pantry_server::services::identity::AuthError;
use sqlx::PgPool;
use thiserror::Error;

/// Errors surfaced by any subcommand.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Resource(#[from] ResourceError),
}

/// Connect using `PANTRY_DATABASE_URL`, falling back to `DATABASE_URL`.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();
    let database_url = get_database_url("PANTRY_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    Ok(pantry_server::db::create_pool(&database_url, 2).await?)
}
