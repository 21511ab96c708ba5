//! Pantry CLI - database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply the embedded migrations
//! pantry-cli migrate
//!
//! # Create (or promote) an administrator
//! pantry-cli admin create --phone +998901234567 --password 'S3cure!pass'
//!
//! # Publish an active release, retiring the platform's previous one
//! pantry-cli app-version publish --version 1.4.0 --platform ANDROID --force-update
//! ```
//!
//! # Environment Variables
//!
//! - `PANTRY_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pantry_core::DevicePlatform;

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "pantry-cli")]
#[command(author, version, about = "Pantry CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Manage administrator users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage app releases
    AppVersion {
        #[command(subcommand)]
        action: AppVersionAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an active admin, or promote the user with this phone
    Create {
        /// Phone in `+998XXXXXXXXX` form
        #[arg(long)]
        phone: String,

        /// Password; must satisfy the password policy
        #[arg(long, env = "PANTRY_ADMIN_PASSWORD")]
        password: String,
    },
}

#[derive(Subcommand)]
enum AppVersionAction {
    /// Publish an active release
    Publish {
        /// Version string, e.g. 1.4.0
        #[arg(long)]
        version: String,

        /// ANDROID, IOS or ALL
        #[arg(long)]
        platform: DevicePlatform,

        /// Require clients below this release to update
        #[arg(long)]
        force_update: bool,

        /// Release notes
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pantry_cli=info,pantry_server=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { phone, password } => {
                commands::admin::create(&phone, &password).await?;
            }
        },
        Commands::AppVersion { action } => match action {
            AppVersionAction::Publish {
                version,
                platform,
                force_update,
                description,
            } => {
                commands::app_version::publish(version, platform, force_update, description)
                    .await?;
            }
        },
    }
    Ok(())
}
