//! Identity binder error types.

use thiserror::Error;

use pantry_core::{PasswordError, Phone, PhoneError};

use crate::db::RepositoryError;
use crate::services::otp::OtpError;
use crate::services::passwords::PasswordHashError;
use crate::services::tokens::TokenError;
use crate::services::validation::ValidationErrors;

/// Errors that can occur while registering, verifying or authenticating a user.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid phone: {0}")]
    InvalidPhone(#[from] PhoneError),

    #[error("weak password: {0}")]
    WeakPassword(#[from] PasswordError),

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("new password equals the current one")]
    SameAsOld,

    #[error("current password is incorrect")]
    InvalidCurrentPassword,

    #[error("invalid credentials")]
    InvalidCredentials,

    /// No account for this phone.
    #[error("no user with phone {0}")]
    UnknownPhone(Phone),

    /// Token subject no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// Token subject has not been activated.
    #[error("user inactive")]
    UserInactive,

    /// OTP failure, tagged with the phone it was for.
    #[error("verification failed for {phone}: {source}")]
    Otp {
        phone: Phone,
        #[source]
        source: OtpError,
    },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
