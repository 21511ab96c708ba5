//! One-time phone verification codes.
//!
//! Issuing supersedes every unused code for the phone. Verification checks,
//! in order: a live code exists, it has not expired, the attempt budget is
//! not spent, and only then compares the code. Every comparison first
//! reserves an attempt in storage, so concurrent guesses never exceed
//! [`MAX_ATTEMPTS`]. A match gives its attempt back.

use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use rand::Rng;
use thiserror::Error;

use pantry_core::Phone;

use crate::db::{OtpRepository, RepositoryError};

/// Minutes a code stays valid.
pub const EXPIRATION_MINUTES: i64 = 2;
/// Failed comparisons allowed before the code locks.
pub const MAX_ATTEMPTS: i32 = 10;
/// Digits per code.
pub const CODE_LENGTH: usize = 6;

/// Concurrent issues for one phone can trip the unique index; retry a few times.
const ISSUE_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("no verification code pending")]
    CodeNotFound,

    #[error("verification code expired")]
    CodeExpired,

    #[error("too many attempts")]
    TooManyAttempts,

    #[error("invalid code, {remaining_attempts} attempts left")]
    InvalidCode { remaining_attempts: i32 },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A freshly issued code.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies phone OTPs.
pub struct OtpLedger<'a> {
    otps: &'a dyn OtpRepository,
    clock: &'a dyn Clock,
}

impl<'a> OtpLedger<'a> {
    #[must_use]
    pub const fn new(otps: &'a dyn OtpRepository, clock: &'a dyn Clock) -> Self {
        Self { otps, clock }
    }

    /// Replace any unused code for `phone` with a new one.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::Repository` if storage fails.
    pub async fn issue(&self, phone: &Phone) -> Result<IssuedCode, OtpError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = generate_code();
            let created_at = self.clock.utc();
            let expires_at = created_at + Duration::minutes(EXPIRATION_MINUTES);

            match self
                .otps
                .replace_unused(phone, &code, created_at, expires_at)
                .await
            {
                Ok(otp) => {
                    tracing::info!(phone = %phone, expires_at = %otp.expires_at, "OTP issued");
                    tracing::debug!(phone = %phone, code = %otp.code, "OTP code");
                    return Ok(IssuedCode {
                        code: otp.code,
                        expires_at: otp.expires_at,
                    });
                }
                Err(RepositoryError::Conflict(_)) if attempt < ISSUE_RETRIES => {
                    tracing::debug!(phone = %phone, attempt, "OTP issue raced, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Check `code` against the latest unused code for `phone` and consume it.
    ///
    /// # Errors
    ///
    /// See [`OtpError`]; the variant reflects the first failing check.
    pub async fn verify(&self, phone: &Phone, code: &str) -> Result<(), OtpError> {
        let otp = self
            .otps
            .latest_unused(phone)
            .await?
            .ok_or(OtpError::CodeNotFound)?;

        if otp.is_expired_at(self.clock.utc()) {
            self.otps.delete(otp.id).await?;
            tracing::info!(phone = %phone, "OTP expired");
            return Err(OtpError::CodeExpired);
        }

        let Some(attempts) = self.otps.reserve_attempt(otp.id, MAX_ATTEMPTS).await? else {
            tracing::warn!(phone = %phone, "OTP attempts exhausted");
            return Err(OtpError::TooManyAttempts);
        };

        if !constant_time_eq(otp.code.as_bytes(), code.as_bytes()) {
            let remaining_attempts = MAX_ATTEMPTS - attempts;
            tracing::warn!(phone = %phone, remaining_attempts, "OTP mismatch");
            return Err(OtpError::InvalidCode { remaining_attempts });
        }

        if !self.otps.mark_used(otp.id).await? {
            // Consumed by a concurrent verify
            return Err(OtpError::CodeNotFound);
        }
        Ok(())
    }
}

/// Uniform over `000000..=999999`, zero-padded.
fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use pantry_core::OtpId;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::PhoneOtp;
    use crate::test_support::MutableClock;

    /// Yields after every read, like a database round trip, so concurrent
    /// verifications interleave between the lookup and the attempt update.
    struct YieldingOtps(Arc<MemoryStore>);

    #[async_trait]
    impl OtpRepository for YieldingOtps {
        async fn replace_unused(
            &self,
            phone: &Phone,
            code: &str,
            created_at: DateTime<Utc>,
            expires_at: DateTime<Utc>,
        ) -> Result<PhoneOtp, RepositoryError> {
            self.0
                .replace_unused(phone, code, created_at, expires_at)
                .await
        }

        async fn latest_unused(&self, phone: &Phone) -> Result<Option<PhoneOtp>, RepositoryError> {
            let otp = self.0.latest_unused(phone).await;
            tokio::task::yield_now().await;
            otp
        }

        async fn delete(&self, id: OtpId) -> Result<(), RepositoryError> {
            self.0.delete(id).await
        }

        async fn reserve_attempt(
            &self,
            id: OtpId,
            max_attempts: i32,
        ) -> Result<Option<i32>, RepositoryError> {
            self.0.reserve_attempt(id, max_attempts).await
        }

        async fn mark_used(&self, id: OtpId) -> Result<bool, RepositoryError> {
            self.0.mark_used(id).await
        }
    }

    fn phone() -> Phone {
        Phone::parse("+998901234567").unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, MutableClock) {
        (Arc::new(MemoryStore::new()), MutableClock::new(Utc::now()))
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn constant_time_eq_matches_plain_eq() {
        assert!(constant_time_eq(b"012345", b"012345"));
        assert!(!constant_time_eq(b"012345", b"012346"));
        assert!(!constant_time_eq(b"012345", b"01234"));
    }

    #[tokio::test]
    async fn issue_twice_leaves_one_unused_code() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);

        ledger.issue(&phone()).await.unwrap();
        let second = ledger.issue(&phone()).await.unwrap();

        assert_eq!(store.unused_otp_count(&phone()), 1);
        assert_eq!(
            store.otps_for(&phone())[0].code,
            second.code,
            "last issued code wins"
        );
    }

    #[tokio::test]
    async fn issue_sets_fixed_expiry() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);

        let issued = ledger.issue(&phone()).await.unwrap();
        assert_eq!(
            issued.expires_at,
            clock.utc() + Duration::minutes(EXPIRATION_MINUTES)
        );
    }

    #[tokio::test]
    async fn verify_without_code_is_not_found() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);

        assert!(matches!(
            ledger.verify(&phone(), "000000").await,
            Err(OtpError::CodeNotFound)
        ));
    }

    #[tokio::test]
    async fn wrong_code_increments_attempts_once() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);
        let issued = ledger.issue(&phone()).await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };

        let err = ledger.verify(&phone(), wrong).await.unwrap_err();
        assert!(matches!(
            err,
            OtpError::InvalidCode {
                remaining_attempts: 9
            }
        ));

        let otps = store.otps_for(&phone());
        let otp = &otps[0];
        assert_eq!(otp.attempts, 1);
        assert!(!otp.used);
    }

    #[tokio::test]
    async fn correct_code_is_consumed_without_counting_an_attempt() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);
        let issued = ledger.issue(&phone()).await.unwrap();

        ledger.verify(&phone(), &issued.code).await.unwrap();

        let otps = store.otps_for(&phone());
        let otp = &otps[0];
        assert!(otp.used);
        assert_eq!(otp.attempts, 0);
        assert!(matches!(
            ledger.verify(&phone(), &issued.code).await,
            Err(OtpError::CodeNotFound)
        ));
    }

    #[tokio::test]
    async fn exhausted_attempts_block_the_right_code() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);
        let issued = ledger.issue(&phone()).await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };

        for _ in 0..MAX_ATTEMPTS {
            let _ = ledger.verify(&phone(), wrong).await;
        }

        assert!(matches!(
            ledger.verify(&phone(), &issued.code).await,
            Err(OtpError::TooManyAttempts)
        ));
        assert!(!store.otps_for(&phone())[0].used);
    }

    #[tokio::test]
    async fn expired_code_is_deleted() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);
        let issued = ledger.issue(&phone()).await.unwrap();

        clock.advance_seconds(EXPIRATION_MINUTES * 60 + 1);

        assert!(matches!(
            ledger.verify(&phone(), &issued.code).await,
            Err(OtpError::CodeExpired)
        ));
        assert!(store.otps_for(&phone()).is_empty());
    }

    #[tokio::test]
    async fn expiry_is_checked_before_attempts() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);
        let issued = ledger.issue(&phone()).await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };
        for _ in 0..MAX_ATTEMPTS {
            let _ = ledger.verify(&phone(), wrong).await;
        }

        clock.advance_seconds(EXPIRATION_MINUTES * 60 + 1);

        assert!(matches!(
            ledger.verify(&phone(), &issued.code).await,
            Err(OtpError::CodeExpired)
        ));
    }

    #[tokio::test]
    async fn concurrent_wrong_guesses_stay_within_the_budget() {
        let (store, clock) = setup();
        let otps = YieldingOtps(Arc::clone(&store));
        let ledger = OtpLedger::new(&otps, &clock);
        let issued = ledger.issue(&phone()).await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };
        let phone = phone();

        let results =
            futures::future::join_all((0..15).map(|_| ledger.verify(&phone, wrong))).await;

        let compared = results
            .iter()
            .filter(|r| matches!(r, Err(OtpError::InvalidCode { .. })))
            .count();
        let locked = results
            .iter()
            .filter(|r| matches!(r, Err(OtpError::TooManyAttempts)))
            .count();
        assert_eq!(compared, 10);
        assert_eq!(locked, 5);
        assert_eq!(store.otps_for(&phone)[0].attempts, MAX_ATTEMPTS);
        assert!(matches!(
            ledger.verify(&phone, &issued.code).await,
            Err(OtpError::TooManyAttempts)
        ));
    }

    #[tokio::test]
    async fn last_attempt_reports_zero_remaining() {
        let (store, clock) = setup();
        let ledger = OtpLedger::new(store.as_ref(), &clock);
        let issued = ledger.issue(&phone()).await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };

        for _ in 1..MAX_ATTEMPTS {
            let _ = ledger.verify(&phone(), wrong).await;
        }

        assert!(matches!(
            ledger.verify(&phone(), wrong).await,
            Err(OtpError::InvalidCode {
                remaining_attempts: 0
            })
        ));
    }
}
