use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::otp::{OtpManager, OtpPurpose};
use crate::auth::password::hash_password_blocking;
use crate::error::AppError;
use crate::mail::Mailer;
use crate::store::{EphemeralStore, UserStore};

/// A registration awaiting email verification.
///
/// Held only in the ephemeral store, never in the user table; it either
/// becomes a `User` on successful verification or vanishes when its TTL
/// runs out. At most one entry exists per email; concurrent registrations
/// for a never-seen address resolve by last write wins, and the loser's
/// code simply stops validating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Holds not-yet-persisted registrations in a time-limited staging area.
#[derive(Clone)]
pub struct RegistrationStager {
    users: Arc<dyn UserStore>,
    store: Arc<dyn EphemeralStore>,
    otp: OtpManager,
    mailer: Arc<dyn Mailer>,
    pending_ttl: chrono::Duration,
}

impl RegistrationStager {
    pub fn new(
        users: Arc<dyn UserStore>,
        store: Arc<dyn EphemeralStore>,
        otp: OtpManager,
        mailer: Arc<dyn Mailer>,
        pending_ttl: chrono::Duration,
    ) -> Self {
        Self {
            users,
            store,
            otp,
            mailer,
            pending_ttl,
        }
    }

    /// Stages a registration and sends the verification code.
    ///
    /// No tokens are issued here: the account does not exist until the
    /// address is verified, which closes the takeover window between
    /// sign-up and proof of ownership.
    pub async fn stage(&self, email: &str, password: &str, name: &str) -> Result<(), AppError> {
        if self.users.exists_by_email(email).await? {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        if self.store.get(&key(email)).await?.is_some() {
            return Err(AppError::Conflict(
                "A registration for this email is already awaiting verification".into(),
            ));
        }

        let password_hash = hash_password_blocking(password).await?;
        let pending = PendingRegistration {
            email: email.to_string(),
            password_hash,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.store
            .set(&key(email), &serde_json::to_string(&pending)?, self.pending_ttl)
            .await?;

        let code = OtpManager::generate();
        self.otp.store(OtpPurpose::EmailVerify, email, &code).await?;
        self.mailer.send(email, &code, OtpPurpose::EmailVerify).await?;

        Ok(())
    }

    /// Returns the staged registration for `email` without consuming it.
    pub async fn peek(&self, email: &str) -> Result<Option<PendingRegistration>, AppError> {
        match self.store.get(&key(email)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Reads and deletes the staged registration for `email`.
    pub async fn consume(&self, email: &str) -> Result<Option<PendingRegistration>, AppError> {
        let pending = self.peek(email).await?;
        if pending.is_some() {
            self.store.delete(&key(email)).await?;
        }
        Ok(pending)
    }
}

fn key(email: &str) -> String {
    format!("pending:{}", email)
}
