//! Application state shared across handlers.

use std::sync::Arc;

use mockable::Clock;

use crate::db::Repositories;
use crate::services::admin::AdminService;
use crate::services::app_versions::AppVersionService;
use crate::services::carts::CartService;
use crate::services::devices::DeviceRegistry;
use crate::services::identity::IdentityBinder;
use crate::services::recipes::RecipeService;
use crate::services::tokens::TokenService;
use crate::services::votes::VoteService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Services are built per
/// request and borrow from it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    repos: Repositories,
    tokens: TokenService,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `repos` - Repository ports (`PostgreSQL` in production)
    /// * `tokens` - JWT issuer/verifier
    /// * `clock` - Time source for OTP expiry and login stamps
    #[must_use]
    pub fn new(repos: Repositories, tokens: TokenService, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                repos,
                tokens,
                clock,
            }),
        }
    }

    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    #[must_use]
    pub fn devices(&self) -> DeviceRegistry<'_> {
        DeviceRegistry::new(self.repos(), self.clock())
    }

    #[must_use]
    pub fn identity(&self) -> IdentityBinder<'_> {
        IdentityBinder::new(self.repos(), self.tokens(), self.clock())
    }

    #[must_use]
    pub fn carts(&self) -> CartService<'_> {
        CartService::new(self.repos())
    }

    #[must_use]
    pub fn recipes(&self) -> RecipeService<'_> {
        RecipeService::new(self.repos())
    }

    #[must_use]
    pub fn votes(&self) -> VoteService<'_> {
        VoteService::new(self.repos())
    }

    #[must_use]
    pub fn app_versions(&self) -> AppVersionService<'_> {
        AppVersionService::new(self.repos())
    }

    #[must_use]
    pub fn admin(&self) -> AdminService<'_> {
        AdminService::new(self.repos(), self.clock())
    }
}
