//! Password strength policy.
//!
//! Applied on registration and on every password change. Hashing lives in
//! the server; this module only decides whether a candidate is acceptable.

/// Minimum password length, counted after trimming.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Reasons a password is rejected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordError {
    /// Fewer than [`MIN_PASSWORD_LENGTH`] characters after trimming.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,
    /// Only digits.
    #[error("password cannot be entirely numeric")]
    AllNumeric,
    /// Only letters.
    #[error("password cannot be entirely alphabetic")]
    AllAlphabetic,
}

/// Check a candidate password against the policy.
///
/// # Errors
///
/// Returns the first rule the password breaks.
///
/// ```
/// use pantry_core::{PasswordError, validate_password};
///
/// assert!(validate_password("TestPass123!").is_ok());
/// assert_eq!(validate_password("12345678"), Err(PasswordError::AllNumeric));
/// ```
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let trimmed = password.trim();

    if trimmed.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if trimmed.chars().all(char::is_numeric) {
        return Err(PasswordError::AllNumeric);
    }
    if trimmed.chars().all(char::is_alphabetic) {
        return Err(PasswordError::AllAlphabetic);
    }

    Ok(())
}
