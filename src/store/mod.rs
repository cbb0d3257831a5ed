//!
//! # Storage Collaborators
//!
//! The identity flows never talk to a concrete database or cache directly.
//! They are written against the two traits in this module, injected as
//! `Arc<dyn ...>` so tests can substitute in-memory doubles and so the
//! backing store can be swapped (e.g. Redis for the ephemeral store)
//! without touching the orchestrator.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, MemoryUserStore};
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;

/// Persistent store of verified user accounts.
///
/// Email lookups are case-insensitive; callers normalize addresses to
/// lowercase before they reach the store, and backends compare lowercased.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    /// Finds the user whose in-flight email change targets `email`, if any.
    async fn find_by_pending_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn create(&self, user: &User) -> Result<(), AppError>;
    async fn save(&self, user: &User) -> Result<(), AppError>;
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError>;
}

/// Keyed store with per-key expiry, backing OTP codes, staged registrations
/// and sessions.
///
/// `set` must atomically overwrite any prior value for the key; the
/// one-code-per-key and one-session-per-user invariants rest on that, not
/// on application-level locking.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;
    /// Returns the live value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}
