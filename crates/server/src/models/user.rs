//! User domain types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use pantry_core::{Gender, Phone, UserId};

/// An account identified by phone number.
///
/// Created inactive by registration, activated once an OTP is verified or a
/// password login succeeds.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub phone: Phone,
    /// System generated (`user_xxxxxx`) for phone sign-ups.
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub surname: String,
    pub gender: Option<Gender>,
    pub birthday: Option<NaiveDate>,
    pub is_active: bool,
    pub is_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone: Phone,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
}

/// Validated profile changes. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub surname: Option<String>,
    pub gender: Option<Gender>,
    pub birthday: Option<NaiveDate>,
}

impl ProfileUpdate {
    /// True when nothing would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.surname.is_none()
            && self.gender.is_none()
            && self.birthday.is_none()
    }
}

/// Public projection of a [`User`].
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub phone: Phone,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub surname: String,
    pub gender: Option<Gender>,
    pub birthday: Option<NaiveDate>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            surname: user.surname.clone(),
            gender: user.gender,
            birthday: user.birthday,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}
