use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::EphemeralStore;

/// Tracks the single current refresh token per user.
///
/// `put` overwrites unconditionally, which is the whole mechanism behind
/// single-session-per-identity: the instant a new pair is issued, the
/// previous refresh token stops being current and is rejected on use, even
/// though it remains cryptographically valid until its own expiry.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn EphemeralStore>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(store: Arc<dyn EphemeralStore>, ttl: chrono::Duration) -> Self {
        Self { store, ttl }
    }

    /// Records `refresh_token` as the current session for the user,
    /// replacing whatever was stored before.
    pub async fn put(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AppError> {
        self.store
            .set(&key(user_id), refresh_token, self.ttl)
            .await
    }

    /// Whether `token` is the most recently issued refresh token for the user.
    pub async fn is_current(&self, user_id: Uuid, token: &str) -> Result<bool, AppError> {
        Ok(self
            .store
            .get(&key(user_id))
            .await?
            .is_some_and(|current| current == token))
    }

    /// Drops the user's session. Used on logout, password change and password reset.
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.delete(&key(user_id)).await
    }
}

fn key(user_id: Uuid) -> String {
    format!("session:{}", user_id)
}
