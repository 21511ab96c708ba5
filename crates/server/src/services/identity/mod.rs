//! Phone identity and device binding.
//!
//! A phone moves from no account, to an inactive account with a pending
//! code, to an active account bound to the device that verified it. Later
//! logins may bind further devices; the last bind wins.

mod error;

pub use error::AuthError;

use chrono::NaiveDate;
use mockable::Clock;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use pantry_core::{Gender, Phone, validate_password};

use super::otp::{EXPIRATION_MINUTES, IssuedCode, MAX_ATTEMPTS, OtpLedger};
use super::passwords::{hash_password, verify_password};
use super::tokens::{TokenError, TokenPair, TokenService, TokenType};
use super::validation::{ValidationErrors, check_length};
use crate::db::Repositories;
use crate::db::users::{PHONE_UNIQUE, USERNAME_UNIQUE};
use crate::models::{Device, NewUser, ProfileUpdate, User, UserProfile};

const USERNAME_PREFIX: &str = "user_";
const USERNAME_SUFFIX_LENGTH: usize = 6;
pub(crate) const USERNAME_RETRIES: usize = 5;
const NAME_MAX_LENGTH: usize = 150;

/// Whether `register` created an account or only re-sent a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created,
    Resent,
}

/// Response to `register` and `forgot_password`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    #[serde(skip)]
    pub outcome: RegistrationOutcome,
    pub phone: Phone,
    pub code: String,
    pub expires_in_minutes: i64,
    pub max_attempts: i32,
}

impl Registration {
    fn new(outcome: RegistrationOutcome, phone: Phone, issued: IssuedCode) -> Self {
        Self {
            outcome,
            phone,
            code: issued.code,
            expires_in_minutes: EXPIRATION_MINUTES,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// An authenticated user with fresh tokens.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

/// Profile changes as sent by the app.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub surname: Option<String>,
    pub gender: Option<Gender>,
    pub birthday: Option<NaiveDate>,
}

/// Registration, verification, login and password management.
pub struct IdentityBinder<'a> {
    repos: &'a Repositories,
    tokens: &'a TokenService,
    clock: &'a dyn Clock,
}

impl<'a> IdentityBinder<'a> {
    #[must_use]
    pub const fn new(repos: &'a Repositories, tokens: &'a TokenService, clock: &'a dyn Clock) -> Self {
        Self {
            repos,
            tokens,
            clock,
        }
    }

    fn ledger(&self) -> OtpLedger<'_> {
        OtpLedger::new(self.repos.otps.as_ref(), self.clock)
    }

    async fn issue_code(
        &self,
        phone: Phone,
        outcome: RegistrationOutcome,
    ) -> Result<Registration, AuthError> {
        match self.ledger().issue(&phone).await {
            Ok(issued) => Ok(Registration::new(outcome, phone, issued)),
            Err(source) => Err(AuthError::Otp { phone, source }),
        }
    }

    // =========================================================================
    // Phone verification
    // =========================================================================

    /// Create an inactive account, or re-send the code for an existing one.
    ///
    /// The password of an existing account is never changed here.
    ///
    /// # Errors
    ///
    /// `InvalidPhone` or `WeakPassword` before anything is looked up.
    pub async fn register(&self, phone: &str, password: &str) -> Result<Registration, AuthError> {
        let phone = Phone::parse(phone)?;
        validate_password(password)?;

        if self.repos.users.get_by_phone(&phone).await?.is_some() {
            tracing::debug!(phone = %phone, "Phone already registered, submitted password ignored");
            return self.issue_code(phone, RegistrationOutcome::Resent).await;
        }

        let password_hash = hash_password(password.trim())?;
        let outcome = match self.create_user(&phone, password_hash).await? {
            Some(user) => {
                tracing::info!(user_id = %user.id, phone = %phone, "User registered");
                RegistrationOutcome::Created
            }
            None => RegistrationOutcome::Resent,
        };

        self.issue_code(phone, outcome).await
    }

    /// Insert with a generated username. `None` if the phone was registered
    /// concurrently.
    async fn create_user(
        &self,
        phone: &Phone,
        password_hash: String,
    ) -> Result<Option<User>, AuthError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let new_user = NewUser {
                phone: phone.clone(),
                username: generate_username(),
                password_hash: password_hash.clone(),
                is_active: false,
                is_admin: false,
            };
            match self.repos.users.create(new_user).await {
                Ok(user) => return Ok(Some(user)),
                Err(e) if e.is_conflict_on(PHONE_UNIQUE) => return Ok(None),
                Err(e) if e.is_conflict_on(USERNAME_UNIQUE) && attempt < USERNAME_RETRIES => {
                    tracing::debug!(attempt, "Generated username taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Consume the code, activate the account and bind `device` to it.
    ///
    /// # Errors
    ///
    /// `Otp` for any code failure, `UnknownPhone` if the code checks out but
    /// the account is gone.
    pub async fn verify_and_bind(
        &self,
        phone: &str,
        code: &str,
        device: Option<&Device>,
    ) -> Result<Session, AuthError> {
        let phone = Phone::parse(phone)?;

        if let Err(source) = self.ledger().verify(&phone, code.trim()).await {
            return Err(AuthError::Otp { phone, source });
        }

        let user = self
            .repos
            .users
            .get_by_phone(&phone)
            .await?
            .ok_or_else(|| AuthError::UnknownPhone(phone.clone()))?;

        let session = self.open_session(&user, device).await?;
        tracing::info!(user_id = %session.user.id, "Phone verified");
        Ok(session)
    }

    /// Password login.
    ///
    /// # Errors
    ///
    /// `UnknownPhone` when there is no account, `InvalidCredentials` when the
    /// password does not match the stored hash.
    pub async fn login(
        &self,
        phone: &str,
        password: &str,
        device: Option<&Device>,
    ) -> Result<Session, AuthError> {
        let phone = Phone::parse(phone)?;

        let user = self
            .repos
            .users
            .get_by_phone(&phone)
            .await?
            .ok_or_else(|| AuthError::UnknownPhone(phone.clone()))?;

        if !verify_password(password.trim(), &user.password_hash) {
            tracing::warn!(user_id = %user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.open_session(&user, device).await?;
        tracing::info!(user_id = %session.user.id, "User logged in");
        Ok(session)
    }

    /// Activate, bind and mint tokens.
    async fn open_session(&self, user: &User, device: Option<&Device>) -> Result<Session, AuthError> {
        let now = self.clock.utc();
        let user = self.repos.users.activate(user.id, now).await?;

        if let Some(device) = device {
            let bound = self.repos.devices.bind_user(device.id, user.id, now).await?;
            tracing::info!(
                device_id = %bound.id,
                user_id = %user.id,
                previous_user_id = ?device.user_id,
                "Device bound to user"
            );
        }

        let tokens = self.tokens.issue_pair(&user)?;
        Ok(Session { user, tokens })
    }

    /// Issue a reset code for an existing account.
    ///
    /// # Errors
    ///
    /// `UnknownPhone` when there is no account.
    pub async fn forgot_password(&self, phone: &str) -> Result<Registration, AuthError> {
        let phone = Phone::parse(phone)?;

        if self.repos.users.get_by_phone(&phone).await?.is_none() {
            return Err(AuthError::UnknownPhone(phone));
        }

        self.issue_code(phone, RegistrationOutcome::Resent).await
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Set a new password without the current one; the caller proved phone
    /// ownership through an OTP.
    ///
    /// # Errors
    ///
    /// `PasswordMismatch` or `WeakPassword`.
    pub async fn set_password(
        &self,
        user: &User,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), AuthError> {
        if password != password_confirm {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(password)?;

        let hash = hash_password(password.trim())?;
        self.repos.users.set_password_hash(user.id, &hash).await?;
        tracing::info!(user_id = %user.id, "Password set");
        Ok(())
    }

    /// Change the password, proving the current one first.
    ///
    /// # Errors
    ///
    /// In order: `InvalidCurrentPassword`, `PasswordMismatch`,
    /// `WeakPassword`, `SameAsOld`.
    pub async fn update_password(
        &self,
        user: &User,
        current: &str,
        new_password: &str,
        new_password_confirm: &str,
    ) -> Result<(), AuthError> {
        if !verify_password(current.trim(), &user.password_hash) {
            tracing::warn!(user_id = %user.id, "Password change with wrong current password");
            return Err(AuthError::InvalidCurrentPassword);
        }
        if new_password != new_password_confirm {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(new_password)?;
        if new_password.trim() == current.trim() {
            return Err(AuthError::SameAsOld);
        }

        let hash = hash_password(new_password.trim())?;
        self.repos.users.set_password_hash(user.id, &hash).await?;
        tracing::info!(user_id = %user.id, "Password updated");
        Ok(())
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Revoke `refresh_token` and log out `device` if given.
    ///
    /// # Errors
    ///
    /// `Token` when the refresh token does not verify or belongs to someone else.
    pub async fn logout(
        &self,
        user: &User,
        refresh_token: &str,
        device: Option<&Device>,
    ) -> Result<(), AuthError> {
        let claims = self.tokens.decode(refresh_token.trim(), TokenType::Refresh)?;
        if claims.sub != user.id {
            return Err(TokenError::Invalid.into());
        }
        let expires_at = claims.expires_at().ok_or(TokenError::Invalid)?;

        self.repos.revoked_tokens.revoke(claims.jti, expires_at).await?;

        if let Some(device) = device {
            self.repos.devices.logout(device.id, self.clock.utc()).await?;
        }

        tracing::info!(
            user_id = %user.id,
            device_id = ?device.map(|d| d.id),
            "User logged out"
        );
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// `Token` for revoked, expired or wrong-type tokens, `UserNotFound` if the
    /// subject is gone, `UserInactive` if it is not activated.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.tokens.decode(refresh_token.trim(), TokenType::Refresh)?;

        if self.repos.revoked_tokens.is_revoked(claims.jti).await? {
            tracing::warn!(user_id = %claims.sub, "Revoked refresh token presented");
            return Err(TokenError::Invalid.into());
        }

        let user = self
            .repos
            .users
            .get_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Refresh for inactive user");
            return Err(AuthError::UserInactive);
        }

        Ok(self.tokens.issue_access(&user)?)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    #[must_use]
    pub fn profile(&self, user: &User) -> UserProfile {
        UserProfile::from(user)
    }

    /// Apply profile changes.
    ///
    /// # Errors
    ///
    /// `Validation` for over-long names or a birthday in the future.
    pub async fn update_profile(
        &self,
        user: &User,
        patch: ProfilePatch,
    ) -> Result<UserProfile, AuthError> {
        let mut errors = ValidationErrors::new();

        let mut name = |field: &str, value: Option<String>| {
            value.map(|v| {
                let v = v.trim().to_owned();
                check_length(&mut errors, field, &v, 0, NAME_MAX_LENGTH);
                v
            })
        };
        let update = ProfileUpdate {
            first_name: name("first_name", patch.first_name),
            last_name: name("last_name", patch.last_name),
            surname: name("surname", patch.surname),
            gender: patch.gender,
            birthday: patch.birthday,
        };

        if let Some(birthday) = update.birthday
            && birthday > self.clock.utc().date_naive()
        {
            errors.add("birthday", "must not be in the future");
        }
        errors.into_result().map_err(AuthError::Validation)?;

        if update.is_empty() {
            return Ok(UserProfile::from(user));
        }

        let user = self.repos.users.update_profile(user.id, &update).await?;
        Ok(UserProfile::from(&user))
    }
}

/// `user_` plus six random lowercase alphanumerics.
pub(crate) fn generate_username() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(USERNAME_SUFFIX_LENGTH)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{USERNAME_PREFIX}{suffix}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::services::otp::OtpError;
    use crate::test_support::{MutableClock, jwt_config, register_device};

    const PHONE: &str = "+998901234567";
    const PASSWORD: &str = "TestPass123!";

    struct Fixture {
        repos: Repositories,
        tokens: TokenService,
        clock: MutableClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                repos: Repositories::memory(&Arc::new(MemoryStore::new())),
                tokens: TokenService::new(&jwt_config()),
                clock: MutableClock::new(Utc::now()),
            }
        }

        fn binder(&self) -> IdentityBinder<'_> {
            IdentityBinder::new(&self.repos, &self.tokens, &self.clock)
        }

        async fn verified_user(&self) -> User {
            let binder = self.binder();
            let registration = binder.register(PHONE, PASSWORD).await.unwrap();
            binder
                .verify_and_bind(PHONE, &registration.code, None)
                .await
                .unwrap()
                .user
        }
    }

    #[test]
    fn usernames_have_prefix_and_lowercase_suffix() {
        let name = generate_username();
        let suffix = name.strip_prefix(USERNAME_PREFIX).unwrap();
        assert_eq!(suffix.len(), USERNAME_SUFFIX_LENGTH);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[tokio::test]
    async fn register_creates_inactive_user_with_code() {
        let fx = Fixture::new();

        let registration = fx.binder().register(PHONE, PASSWORD).await.unwrap();

        assert_eq!(registration.outcome, RegistrationOutcome::Created);
        assert_eq!(registration.code.len(), 6);
        assert_eq!(registration.expires_in_minutes, EXPIRATION_MINUTES);
        let phone = Phone::parse(PHONE).unwrap();
        let user = fx.repos.users.get_by_phone(&phone).await.unwrap().unwrap();
        assert!(!user.is_active);
        assert!(user.username.starts_with(USERNAME_PREFIX));
    }

    #[tokio::test]
    async fn register_checks_phone_and_password_first() {
        let fx = Fixture::new();

        assert!(matches!(
            fx.binder().register("998901234567", PASSWORD).await,
            Err(AuthError::InvalidPhone(_))
        ));
        assert!(matches!(
            fx.binder().register(PHONE, "12345678").await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn re_register_resends_and_keeps_password() {
        let fx = Fixture::new();
        let binder = fx.binder();
        binder.register(PHONE, PASSWORD).await.unwrap();

        let again = binder.register(PHONE, "OtherPass456!").await.unwrap();
        assert_eq!(again.outcome, RegistrationOutcome::Resent);

        assert!(binder.login(PHONE, PASSWORD, None).await.is_ok());
        assert!(matches!(
            binder.login(PHONE, "OtherPass456!", None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn verify_activates_and_binds_device() {
        let fx = Fixture::new();
        let binder = fx.binder();
        let device = register_device(&fx.repos, "hw-1").await.unwrap();
        let registration = binder.register(PHONE, PASSWORD).await.unwrap();

        let session = binder
            .verify_and_bind(PHONE, &registration.code, Some(&device))
            .await
            .unwrap();

        assert!(session.user.is_active);
        let claims = fx
            .tokens
            .decode(&session.tokens.access, TokenType::Access)
            .unwrap();
        assert_eq!(claims.sub, session.user.id);

        let bound = fx.repos.devices.get_by_id(device.id).await.unwrap().unwrap();
        assert_eq!(bound.user_id, Some(session.user.id));
    }

    #[tokio::test]
    async fn verify_failure_carries_phone() {
        let fx = Fixture::new();

        let Err(AuthError::Otp { phone, source }) =
            fx.binder().verify_and_bind(PHONE, "123456", None).await
        else {
            panic!("expected otp error");
        };
        assert_eq!(phone.as_str(), PHONE);
        assert!(matches!(source, OtpError::CodeNotFound));
    }

    #[tokio::test]
    async fn rebinding_moves_device_to_latest_user() {
        let fx = Fixture::new();
        let binder = fx.binder();
        let device = register_device(&fx.repos, "hw-1").await.unwrap();

        let first = binder.register(PHONE, PASSWORD).await.unwrap();
        binder
            .verify_and_bind(PHONE, &first.code, Some(&device))
            .await
            .unwrap();

        let other_phone = "+998907654321";
        let second = binder.register(other_phone, PASSWORD).await.unwrap();
        let session = binder
            .verify_and_bind(other_phone, &second.code, Some(&device))
            .await
            .unwrap();

        let bound = fx.repos.devices.get_by_id(device.id).await.unwrap().unwrap();
        assert_eq!(bound.user_id, Some(session.user.id));
    }

    #[tokio::test]
    async fn login_unknown_phone_and_inactive_user() {
        let fx = Fixture::new();
        let binder = fx.binder();

        assert!(matches!(
            binder.login(PHONE, PASSWORD, None).await,
            Err(AuthError::UnknownPhone(_))
        ));

        binder.register(PHONE, PASSWORD).await.unwrap();
        let session = binder.login(PHONE, PASSWORD, None).await.unwrap();
        assert!(session.user.is_active);
        assert!(session.user.last_login.is_some());
    }

    #[tokio::test]
    async fn forgot_password_requires_account() {
        let fx = Fixture::new();
        let binder = fx.binder();

        assert!(matches!(
            binder.forgot_password(PHONE).await,
            Err(AuthError::UnknownPhone(_))
        ));

        binder.register(PHONE, PASSWORD).await.unwrap();
        let reset = binder.forgot_password(PHONE).await.unwrap();
        assert_eq!(reset.outcome, RegistrationOutcome::Resent);
    }

    #[tokio::test]
    async fn set_password_needs_matching_pair() {
        let fx = Fixture::new();
        let user = fx.verified_user().await;
        let binder = fx.binder();

        assert!(matches!(
            binder.set_password(&user, "NewPass123!", "NewPass124!").await,
            Err(AuthError::PasswordMismatch)
        ));

        binder
            .set_password(&user, "NewPass123!", "NewPass123!")
            .await
            .unwrap();
        assert!(binder.login(PHONE, "NewPass123!", None).await.is_ok());
    }

    #[tokio::test]
    async fn update_password_checks_in_order_without_mutating() {
        let fx = Fixture::new();
        let user = fx.verified_user().await;
        let binder = fx.binder();

        assert!(matches!(
            binder
                .update_password(&user, "WrongPass1!", "NewPass123!", "NewPass123!")
                .await,
            Err(AuthError::InvalidCurrentPassword)
        ));
        assert!(matches!(
            binder
                .update_password(&user, PASSWORD, "NewPass123!", "NewPass124!")
                .await,
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            binder
                .update_password(&user, PASSWORD, "abcdefgh", "abcdefgh")
                .await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            binder
                .update_password(&user, PASSWORD, PASSWORD, PASSWORD)
                .await,
            Err(AuthError::SameAsOld)
        ));

        let stored = fx.repos.users.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, user.password_hash);

        binder
            .update_password(&user, PASSWORD, "NewPass123!", "NewPass123!")
            .await
            .unwrap();
        assert!(binder.login(PHONE, "NewPass123!", None).await.is_ok());
    }

    #[tokio::test]
    async fn logout_revokes_refresh_and_device() {
        let fx = Fixture::new();
        let binder = fx.binder();
        let device = register_device(&fx.repos, "hw-1").await.unwrap();
        let registration = binder.register(PHONE, PASSWORD).await.unwrap();
        let session = binder
            .verify_and_bind(PHONE, &registration.code, Some(&device))
            .await
            .unwrap();

        assert!(binder.refresh(&session.tokens.refresh).await.is_ok());

        binder
            .logout(&session.user, &session.tokens.refresh, Some(&device))
            .await
            .unwrap();

        assert!(matches!(
            binder.refresh(&session.tokens.refresh).await,
            Err(AuthError::Token(TokenError::Invalid))
        ));
        let device = fx.repos.devices.get_by_id(device.id).await.unwrap().unwrap();
        assert!(!device.is_active);
        assert!(device.logged_out_at.is_some());
    }

    #[tokio::test]
    async fn refresh_requires_an_active_user() {
        let fx = Fixture::new();
        fx.binder().register(PHONE, PASSWORD).await.unwrap();
        let phone = Phone::parse(PHONE).unwrap();
        let pending = fx.repos.users.get_by_phone(&phone).await.unwrap().unwrap();
        let pair = fx.tokens.issue_pair(&pending).unwrap();

        assert!(matches!(
            fx.binder().refresh(&pair.refresh).await,
            Err(AuthError::UserInactive)
        ));
    }

    #[tokio::test]
    async fn logout_rejects_foreign_refresh_token() {
        let fx = Fixture::new();
        let user = fx.verified_user().await;
        let binder = fx.binder();
        let other = binder.register("+998907654321", PASSWORD).await.unwrap();
        let other_session = binder
            .verify_and_bind("+998907654321", &other.code, None)
            .await
            .unwrap();

        assert!(matches!(
            binder
                .logout(&user, &other_session.tokens.refresh, None)
                .await,
            Err(AuthError::Token(TokenError::Invalid))
        ));
    }

    #[tokio::test]
    async fn profile_rejects_future_birthday() {
        let fx = Fixture::new();
        let user = fx.verified_user().await;
        let binder = fx.binder();
        let tomorrow = (fx.clock.utc() + Duration::days(1)).date_naive();

        let Err(AuthError::Validation(errors)) = binder
            .update_profile(
                &user,
                ProfilePatch {
                    birthday: Some(tomorrow),
                    ..ProfilePatch::default()
                },
            )
            .await
        else {
            panic!("expected validation error");
        };
        assert!(errors.get("birthday").is_some());

        let profile = binder
            .update_profile(
                &user,
                ProfilePatch {
                    first_name: Some("  Aziz ".to_owned()),
                    gender: Some(Gender::Male),
                    ..ProfilePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.first_name, "Aziz");
        assert_eq!(profile.gender, Some(Gender::Male));
    }
}
