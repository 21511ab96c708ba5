//! Administrator operations on users and their devices.

use mockable::Clock;
use serde::{Deserialize, Serialize};

use pantry_core::{DeviceId, Phone, UserId, validate_password};

use super::guard::ResourceError;
use super::identity::{AuthError, USERNAME_RETRIES, generate_username};
use super::passwords::hash_password;
use crate::db::Repositories;
use crate::db::users::USERNAME_UNIQUE;
use crate::models::{DeviceStatistics, DeviceView, NewUser, User, UserProfile};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    /// `(limit, offset)` clamped to sane bounds.
    #[must_use]
    pub fn bounds(self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// A user as administrators see it.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUserView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub is_admin: bool,
}

impl From<&User> for AdminUserView {
    fn from(user: &User) -> Self {
        Self {
            profile: UserProfile::from(user),
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminUserDetail {
    #[serde(flatten)]
    pub user: AdminUserView,
    pub devices: Vec<DeviceView>,
}

pub struct AdminService<'a> {
    repos: &'a Repositories,
    clock: &'a dyn Clock,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub const fn new(repos: &'a Repositories, clock: &'a dyn Clock) -> Self {
        Self { repos, clock }
    }

    /// # Errors
    ///
    /// Returns `ResourceError::Repository` if storage fails.
    pub async fn list_users(&self, page: Page) -> Result<Vec<AdminUserView>, ResourceError> {
        let (limit, offset) = page.bounds();
        let users = self.repos.users.list(limit, offset).await?;
        Ok(users.iter().map(AdminUserView::from).collect())
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn user_detail(&self, id: UserId) -> Result<AdminUserDetail, ResourceError> {
        let user = self
            .repos
            .users
            .get_by_id(id)
            .await?
            .ok_or(ResourceError::NotFound)?;
        let devices = self.repos.devices.list_for_user(id).await?;

        Ok(AdminUserDetail {
            user: AdminUserView::from(&user),
            devices: devices.iter().map(DeviceView::from).collect(),
        })
    }

    /// Log out one of a user's devices.
    ///
    /// # Errors
    ///
    /// `NotFound` when the device does not exist or is not bound to `user`.
    pub async fn logout_user_device(
        &self,
        user: UserId,
        device: DeviceId,
    ) -> Result<(), ResourceError> {
        let device = self
            .repos
            .devices
            .get_by_id(device)
            .await?
            .filter(|d| d.user_id == Some(user))
            .ok_or(ResourceError::NotFound)?;

        self.repos.devices.logout(device.id, self.clock.utc()).await?;
        tracing::info!(user_id = %user, device_id = %device.id, "Admin logged out device");
        Ok(())
    }

    /// Create an active administrator, or promote and re-password the user
    /// already holding `phone`.
    ///
    /// # Errors
    ///
    /// `InvalidPhone` or `WeakPassword` before anything is written.
    pub async fn ensure_admin(&self, phone: &str, password: &str) -> Result<User, AuthError> {
        let phone = Phone::parse(phone)?;
        validate_password(password)?;
        let password_hash = hash_password(password.trim())?;

        if let Some(existing) = self.repos.users.get_by_phone(&phone).await? {
            self.repos
                .users
                .set_password_hash(existing.id, &password_hash)
                .await?;
            let user = self.repos.users.set_admin(existing.id, true).await?;
            tracing::info!(user_id = %user.id, phone = %phone, "User promoted to admin");
            return Ok(user);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let new_user = NewUser {
                phone: phone.clone(),
                username: generate_username(),
                password_hash: password_hash.clone(),
                is_active: true,
                is_admin: true,
            };
            match self.repos.users.create(new_user).await {
                Ok(user) => {
                    tracing::info!(user_id = %user.id, phone = %phone, "Admin user created");
                    return Ok(user);
                }
                Err(e) if e.is_conflict_on(USERNAME_UNIQUE) && attempt < USERNAME_RETRIES => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// # Errors
    ///
    /// Returns `ResourceError::Repository` if storage fails.
    pub async fn statistics(&self) -> Result<DeviceStatistics, ResourceError> {
        Ok(self.repos.devices.statistics().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use pantry_core::Phone;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::NewUser;
    use crate::test_support::{MutableClock, register_device};

    async fn user(repos: &Repositories, phone: &str, username: &str) -> User {
        repos
            .users
            .create(NewUser {
                phone: Phone::parse(phone).unwrap(),
                username: username.to_owned(),
                password_hash: String::new(),
                is_active: true,
                is_admin: false,
            })
            .await
            .unwrap()
    }

    #[test]
    fn page_bounds_are_clamped() {
        assert_eq!(Page::default().bounds(), (50, 0));
        assert_eq!(
            Page {
                limit: Some(1000),
                offset: Some(-5)
            }
            .bounds(),
            (200, 0)
        );
        assert_eq!(
            Page {
                limit: Some(0),
                offset: Some(10)
            }
            .bounds(),
            (1, 10)
        );
    }

    #[tokio::test]
    async fn detail_lists_user_devices() {
        let repos = Repositories::memory(&Arc::new(MemoryStore::new()));
        let clock = MutableClock::new(Utc::now());
        let owner = user(&repos, "+998901234567", "user_admin1").await;
        let device = register_device(&repos, "hw-a").await.unwrap();
        register_device(&repos, "hw-b").await.unwrap();
        repos.devices.bind_user(device.id, owner.id, Utc::now()).await.unwrap();

        let detail = AdminService::new(&repos, &clock)
            .user_detail(owner.id)
            .await
            .unwrap();

        assert_eq!(detail.devices.len(), 1);
        assert_eq!(detail.devices[0].id, device.id);
        assert!(matches!(
            AdminService::new(&repos, &clock)
                .user_detail(UserId::new(9999))
                .await,
            Err(ResourceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn ensure_admin_creates_then_promotes() {
        let repos = Repositories::memory(&Arc::new(MemoryStore::new()));
        let clock = MutableClock::new(Utc::now());
        let admin = AdminService::new(&repos, &clock);

        let created = admin
            .ensure_admin("+998901112233", "TestPass123!")
            .await
            .unwrap();
        assert!(created.is_admin);
        assert!(created.is_active);

        let plain = user(&repos, "+998904445566", "user_plain1").await;
        let promoted = admin
            .ensure_admin("+998904445566", "OtherPass456!")
            .await
            .unwrap();
        assert_eq!(promoted.id, plain.id);
        assert!(promoted.is_admin);

        assert!(matches!(
            admin.ensure_admin("+998904445566", "12345678").await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            admin.ensure_admin("998904445566", "TestPass123!").await,
            Err(AuthError::InvalidPhone(_))
        ));
    }

    #[tokio::test]
    async fn logout_only_touches_the_users_device() {
        let repos = Repositories::memory(&Arc::new(MemoryStore::new()));
        let clock = MutableClock::new(Utc::now());
        let owner = user(&repos, "+998901234567", "user_admin1").await;
        let other = user(&repos, "+998907654321", "user_admin2").await;
        let device = register_device(&repos, "hw-a").await.unwrap();
        repos.devices.bind_user(device.id, owner.id, Utc::now()).await.unwrap();
        let admin = AdminService::new(&repos, &clock);

        assert!(matches!(
            admin.logout_user_device(other.id, device.id).await,
            Err(ResourceError::NotFound)
        ));

        admin.logout_user_device(owner.id, device.id).await.unwrap();
        let device = repos.devices.get_by_id(device.id).await.unwrap().unwrap();
        assert!(!device.is_active);
        assert_eq!(device.logged_out_at, Some(clock.utc()));

        let stats = admin.statistics().await.unwrap();
        assert_eq!(stats.all, 1);
        assert_eq!(stats.offline, 1);
    }
}
