//! Phone verification code.

use chrono::{DateTime, Utc};

use pantry_core::{OtpId, Phone};

/// A one-time code sent to a phone.
#[derive(Debug, Clone)]
pub struct PhoneOtp {
    pub id: OtpId,
    pub phone: Phone,
    /// Six zero-padded digits.
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub used: bool,
}

impl PhoneOtp {
    /// Whether the code is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
