//! Opaque device identity token.

use core::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind a token.
const TOKEN_BYTES: usize = 32;

/// Errors from [`DeviceToken::parse`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceTokenError {
    /// Wrong number of characters.
    #[error("device token must be {expected} characters")]
    InvalidLength {
        /// Expected length.
        expected: usize,
    },
    /// Contains something other than lowercase hex.
    #[error("device token must be lowercase hex")]
    InvalidCharacter,
}

/// The opaque token a mobile installation presents in the `Token` header.
///
/// Generated once when the device registers and never changed afterwards.
/// 32 bytes from the thread-local CSPRNG, hex encoded.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct DeviceToken(String);

impl DeviceToken {
    /// Length of the hex encoding.
    pub const LENGTH: usize = TOKEN_BYTES * 2;

    /// Generate a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Parse a token produced by [`DeviceToken::generate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not 64 lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self, DeviceTokenError> {
        if s.len() != Self::LENGTH {
            return Err(DeviceTokenError::InvalidLength {
                expected: Self::LENGTH,
            });
        }
        if !s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(DeviceTokenError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are bearer credentials; keep them out of logs.
impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.0.get(..8).unwrap_or_default();
        write!(f, "DeviceToken({prefix}…)")
    }
}

impl AsRef<str> for DeviceToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for DeviceToken {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for DeviceToken {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for DeviceToken {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
