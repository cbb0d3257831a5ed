//! In-memory store backends.
//!
//! `MemoryStore` is the default ephemeral backend for single-node
//! deployments and the test suite; `MemoryUserStore` replaces Postgres in
//! tests. Both guard their maps with a `Mutex` that is never held across
//! an await, so per-key overwrite stays atomic under concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{EphemeralStore, UserStore};
use crate::error::AppError;
use crate::models::User;

/// Keyed store with per-key expiry. Expired entries are evicted lazily on read.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (String, DateTime<Utc>)>>, AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::InternalServerError("Ephemeral store lock poisoned".into()))
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let deadline = Utc::now() + ttl;
        self.lock()?
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Utc::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// In-memory user store, keyed by id.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, User>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::InternalServerError("User store lock poisoned".into()))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.lock()?;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_by_pending_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.lock()?;
        Ok(users
            .values()
            .find(|u| {
                u.pending_email
                    .as_deref()
                    .is_some_and(|p| p.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<(), AppError> {
        self.lock()?.insert(user.id, user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<(), AppError> {
        self.lock()?.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.lock()?.remove(&id);
        Ok(())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        let users = self.lock()?;
        Ok(users.values().any(|u| u.email.eq_ignore_ascii_case(email)))
    }
}
