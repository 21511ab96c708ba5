//! `pantry-cli admin create`: bootstrap an administrator.
//!
//! Admins sign in through the same phone/password login as everyone else;
//! this only sets the flag, activates the account and sets the password.

use mockable::DefaultClock;
use pantry_server::db::Repositories;
use pantry_server::services::admin::AdminService;

use super::{CommandError, connect};

/// Create or promote the admin holding `phone`.
pub async fn create(phone: &str, password: &str) -> Result<(), CommandError> {
    let pool = connect().await?;
    let repos = Repositories::postgres(&pool);

    let user = AdminService::new(&repos, &DefaultClock)
        .ensure_admin(phone, password)
        .await?;

    tracing::info!(
        "Admin ready! ID: {}, Phone: {}, Username: {}",
        user.id,
        user.phone,
        user.username
    );
    Ok(())
}
