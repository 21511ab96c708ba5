//! App release gate.
//!
//! At most one active release per platform. A force-update flag is only
//! meaningful on an active release.

use serde::Deserialize;

use pantry_core::{AppVersionId, DevicePlatform};

use super::guard::ResourceError;
use super::validation::{ValidationErrors, check_length};
use crate::db::app_versions::ACTIVE_PLATFORM_UNIQUE;
use crate::db::{Repositories, RepositoryError};
use crate::models::{AppVersion, NewAppVersion};

const VERSION_MAX_LENGTH: usize = 32;

/// Two activations racing on one platform can both retire the old release
/// and then trip the single-active index; the loser retries once.
const ACTIVATION_ATTEMPTS: usize = 2;

const fn default_true() -> bool {
    true
}

/// A release to publish.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishVersion {
    pub version: String,
    pub platform: DevicePlatform,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub description: String,
}

pub struct AppVersionService<'a> {
    repos: &'a Repositories,
}

impl<'a> AppVersionService<'a> {
    #[must_use]
    pub const fn new(repos: &'a Repositories) -> Self {
        Self { repos }
    }

    /// Publish a release. An active one retires the platform's previous
    /// active release.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank version or `force_update` without `is_active`,
    /// `AlreadyExists` if a concurrent activation keeps winning the platform.
    pub async fn publish(&self, input: PublishVersion) -> Result<AppVersion, ResourceError> {
        let mut errors = ValidationErrors::new();
        let version = input.version.trim().to_owned();
        check_length(&mut errors, "version", &version, 1, VERSION_MAX_LENGTH);
        if input.force_update && !input.is_active {
            errors.add("force_update", "requires is_active");
        }
        errors.into_result()?;

        let new_version = NewAppVersion {
            version,
            platform: input.platform,
            is_active: input.is_active,
            force_update: input.force_update,
            description: input.description.trim().to_owned(),
        };

        let mut attempt = 0;
        let created = loop {
            attempt += 1;
            match self.repos.app_versions.create(&new_version).await {
                Ok(created) => break created,
                Err(e) if e.is_conflict_on(ACTIVE_PLATFORM_UNIQUE) => {
                    if attempt >= ACTIVATION_ATTEMPTS {
                        tracing::warn!(
                            platform = %new_version.platform,
                            "App version publish lost the activation race"
                        );
                        return Err(ResourceError::AlreadyExists);
                    }
                    tracing::debug!(
                        platform = %new_version.platform,
                        attempt,
                        "App version publish raced, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(
            app_version_id = %created.id,
            version = %created.version,
            platform = %created.platform,
            is_active = created.is_active,
            "App version published"
        );
        Ok(created)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown id, `AlreadyExists` if a concurrent
    /// activation keeps winning the platform.
    pub async fn activate(&self, id: AppVersionId) -> Result<AppVersion, ResourceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.repos.app_versions.activate(id).await {
                Ok(version) => {
                    tracing::info!(
                        app_version_id = %id,
                        platform = %version.platform,
                        "App version activated"
                    );
                    return Ok(version);
                }
                Err(RepositoryError::NotFound) => return Err(ResourceError::NotFound),
                Err(e) if e.is_conflict_on(ACTIVE_PLATFORM_UNIQUE) => {
                    if attempt >= ACTIVATION_ATTEMPTS {
                        tracing::warn!(app_version_id = %id, "App version activation lost the race");
                        return Err(ResourceError::AlreadyExists);
                    }
                    tracing::debug!(
                        app_version_id = %id,
                        attempt,
                        "App version activation raced, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The active release for `platform`, else the active cross-platform one.
    ///
    /// # Errors
    ///
    /// `NotFound` when neither exists.
    pub async fn latest(&self, platform: DevicePlatform) -> Result<AppVersion, ResourceError> {
        if let Some(version) = self.repos.app_versions.active_for(platform).await? {
            return Ok(version);
        }
        if platform == DevicePlatform::All {
            return Err(ResourceError::NotFound);
        }
        self.repos
            .app_versions
            .active_for(DevicePlatform::All)
            .await?
            .ok_or(ResourceError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::db::AppVersionRepository;
    use crate::db::memory::MemoryStore;

    /// Fails the next `conflicts` writes as if a concurrent activation had
    /// committed first.
    struct RacedVersions {
        store: Arc<MemoryStore>,
        conflicts: AtomicUsize,
    }

    impl RacedVersions {
        fn lose(&self) -> Result<(), RepositoryError> {
            let lost = self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if lost {
                return Err(RepositoryError::Conflict(ACTIVE_PLATFORM_UNIQUE.to_owned()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AppVersionRepository for RacedVersions {
        async fn get(&self, id: AppVersionId) -> Result<Option<AppVersion>, RepositoryError> {
            AppVersionRepository::get(self.store.as_ref(), id).await
        }

        async fn create(&self, version: &NewAppVersion) -> Result<AppVersion, RepositoryError> {
            self.lose()?;
            AppVersionRepository::create(self.store.as_ref(), version).await
        }

        async fn activate(&self, id: AppVersionId) -> Result<AppVersion, RepositoryError> {
            self.lose()?;
            AppVersionRepository::activate(self.store.as_ref(), id).await
        }

        async fn active_for(
            &self,
            platform: DevicePlatform,
        ) -> Result<Option<AppVersion>, RepositoryError> {
            AppVersionRepository::active_for(self.store.as_ref(), platform).await
        }
    }

    fn raced(conflicts: usize) -> Repositories {
        let store = Arc::new(MemoryStore::new());
        Repositories {
            app_versions: Arc::new(RacedVersions {
                store: Arc::clone(&store),
                conflicts: AtomicUsize::new(conflicts),
            }),
            ..Repositories::memory(&store)
        }
    }

    fn release(version: &str, platform: DevicePlatform) -> PublishVersion {
        PublishVersion {
            version: version.to_owned(),
            platform,
            is_active: true,
            force_update: false,
            description: String::new(),
        }
    }

    async fn is_active(repos: &Repositories, id: AppVersionId) -> bool {
        repos.app_versions.get(id).await.unwrap().unwrap().is_active
    }

    #[tokio::test]
    async fn activation_is_per_platform() {
        let repos = Repositories::memory(&Arc::new(MemoryStore::new()));
        let service = AppVersionService::new(&repos);

        let android_old = service
            .publish(release("1.0.0", DevicePlatform::Android))
            .await
            .unwrap();
        let ios = service
            .publish(release("1.0.0", DevicePlatform::Ios))
            .await
            .unwrap();
        let android_new = service
            .publish(release("1.1.0", DevicePlatform::Android))
            .await
            .unwrap();

        assert!(!is_active(&repos, android_old.id).await);
        assert!(is_active(&repos, ios.id).await);
        assert!(is_active(&repos, android_new.id).await);

        service.activate(android_old.id).await.unwrap();
        assert!(!is_active(&repos, android_new.id).await);
        assert!(is_active(&repos, ios.id).await);
    }

    #[tokio::test]
    async fn force_update_requires_active() {
        let repos = Repositories::memory(&Arc::new(MemoryStore::new()));
        let mut input = release("2.0.0", DevicePlatform::Ios);
        input.is_active = false;
        input.force_update = true;

        let Err(ResourceError::Validation(errors)) =
            AppVersionService::new(&repos).publish(input).await
        else {
            panic!("expected validation error");
        };
        assert!(errors.get("force_update").is_some());
    }

    #[tokio::test]
    async fn latest_falls_back_to_all() {
        let repos = Repositories::memory(&Arc::new(MemoryStore::new()));
        let service = AppVersionService::new(&repos);

        assert!(matches!(
            service.latest(DevicePlatform::Ios).await,
            Err(ResourceError::NotFound)
        ));

        let all = service
            .publish(release("3.0.0", DevicePlatform::All))
            .await
            .unwrap();
        assert_eq!(service.latest(DevicePlatform::Ios).await.unwrap().id, all.id);

        let ios = service
            .publish(release("3.0.1", DevicePlatform::Ios))
            .await
            .unwrap();
        assert_eq!(service.latest(DevicePlatform::Ios).await.unwrap().id, ios.id);
    }

    #[tokio::test]
    async fn activating_unknown_version_is_not_found() {
        let repos = Repositories::memory(&Arc::new(MemoryStore::new()));
        assert!(matches!(
            AppVersionService::new(&repos)
                .activate(AppVersionId::new(42))
                .await,
            Err(ResourceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn publish_retries_a_lost_activation_race() {
        let repos = raced(1);
        let service = AppVersionService::new(&repos);

        let published = service
            .publish(release("4.0.0", DevicePlatform::Android))
            .await
            .unwrap();
        assert!(published.is_active);
        assert_eq!(
            service.latest(DevicePlatform::Android).await.unwrap().id,
            published.id
        );
    }

    #[tokio::test]
    async fn repeated_activation_races_are_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        let versions = Arc::new(RacedVersions {
            store: Arc::clone(&store),
            conflicts: AtomicUsize::new(0),
        });
        let repos = Repositories {
            app_versions: Arc::clone(&versions) as Arc<dyn AppVersionRepository>,
            ..Repositories::memory(&store)
        };
        let service = AppVersionService::new(&repos);

        let mut draft = release("4.1.0", DevicePlatform::Ios);
        draft.is_active = false;
        let draft = service.publish(draft).await.unwrap();

        versions
            .conflicts
            .store(ACTIVATION_ATTEMPTS, Ordering::SeqCst);
        assert!(matches!(
            service.activate(draft.id).await,
            Err(ResourceError::AlreadyExists)
        ));
        assert!(!is_active(&repos, draft.id).await);

        versions
            .conflicts
            .store(ACTIVATION_ATTEMPTS, Ordering::SeqCst);
        assert!(matches!(
            service.publish(release("4.2.0", DevicePlatform::Ios)).await,
            Err(ResourceError::AlreadyExists)
        ));
    }
}
