use rand::rngs::OsRng;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

use crate::error::AppError;
use crate::store::EphemeralStore;

/// Number of digits in a one-time code.
pub const OTP_LENGTH: usize = 6;

/// The flow a one-time code was issued for.
///
/// Codes are stored under purpose-prefixed keys, so a password-reset code
/// can never satisfy an email-verification check and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    /// Proving ownership of an address: registration and email change.
    EmailVerify,
    /// Authorizing a password reset.
    PasswordReset,
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OtpPurpose::EmailVerify => write!(f, "email-verify"),
            OtpPurpose::PasswordReset => write!(f, "password-reset"),
        }
    }
}

/// Generates, stores and validates single-use one-time codes.
///
/// At most one code is live per (purpose, email): storing a new code
/// overwrites the previous one, so a resend invalidates what it replaces.
#[derive(Clone)]
pub struct OtpManager {
    store: Arc<dyn EphemeralStore>,
    ttl: chrono::Duration,
}

impl OtpManager {
    pub fn new(store: Arc<dyn EphemeralStore>, ttl: chrono::Duration) -> Self {
        Self { store, ttl }
    }

    /// Produces a fixed-length, zero-padded numeric code from the OS RNG.
    pub fn generate() -> String {
        let code: u32 = OsRng.gen_range(0..1_000_000);
        format!("{:0width$}", code, width = OTP_LENGTH)
    }

    /// Persists `code` for the address under the purpose-scoped key,
    /// discarding any previously stored code for the same key.
    pub async fn store(
        &self,
        purpose: OtpPurpose,
        email: &str,
        code: &str,
    ) -> Result<(), AppError> {
        self.store.set(&key(purpose, email), code, self.ttl).await
    }

    /// Validates a submitted code.
    ///
    /// Returns false if no code is stored, the code mismatches, or it has
    /// expired. A successful validation deletes the record, enforcing
    /// single use.
    pub async fn verify(
        &self,
        purpose: OtpPurpose,
        email: &str,
        submitted: &str,
    ) -> Result<bool, AppError> {
        let key = key(purpose, email);
        match self.store.get(&key).await? {
            Some(stored) if stored == submitted => {
                self.store.delete(&key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn key(purpose: OtpPurpose, email: &str) -> String {
    format!("{}:{}", purpose, email)
}
