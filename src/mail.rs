//! Email delivery seam.
//!
//! Delivery is awaited by the flows that trigger it: a provider failure
//! surfaces to the caller of register/resend/reset-request as an internal
//! error rather than leaving a staged state with no code in flight.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::auth::otp::OtpPurpose;
use crate::error::AppError;

/// Sends a one-time code to an email address.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError>;
}

/// Development mailer: logs the delivery instead of sending it.
///
/// The code itself is only emitted at debug level.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError> {
        log::info!("sending {} code to {}", purpose, to);
        log::debug!("{} code for {}: {}", purpose, to, code);
        Ok(())
    }
}

/// Test double that records every delivery instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

/// A single recorded delivery.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub code: String,
    pub purpose: OtpPurpose,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All deliveries recorded so far, oldest first.
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }

    /// The most recent code sent to `to`, if any.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .map(|m| m.code.clone())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError> {
        self.sent
            .lock()
            .map_err(|_| AppError::InternalServerError("Mailer lock poisoned".into()))?
            .push(SentMail {
                to: to.to_string(),
                code: code.to_string(),
                purpose,
            });
        Ok(())
    }
}
