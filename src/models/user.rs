use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Represents a user account as stored in the database and returned by the API.
///
/// A row only ever exists for verified identities: registration keeps the
/// account in the ephemeral staging area until the email OTP is confirmed,
/// at which point the record is created with `is_email_verified` already set.
/// An in-flight email change is tracked via `pending_email` until the new
/// address is verified in turn.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique identifier for the user (UUID v4).
    pub id: Uuid,
    /// The user's email address, stored lowercased. Unique among verified users.
    pub email: String,
    /// The bcrypt hash of the user's password. Never serialized into responses.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// The user's display name.
    pub name: String,
    /// Whether the email address has been verified. Always true for persisted rows.
    pub is_email_verified: bool,
    /// Timestamp of the most recent successful email verification.
    pub email_verified_at: Option<DateTime<Utc>>,
    /// A new address awaiting OTP confirmation, set by an email-change request.
    pub pending_email: Option<String>,
    /// Timestamp of when the account was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update to the account.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds a verified account from a consumed staged registration.
    pub fn new_verified(email: String, password_hash: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            name,
            is_email_verified: true,
            email_verified_at: Some(now),
            pending_email: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_verified_user() {
        let user = User::new_verified(
            "test@example.com".to_string(),
            "$2b$12$hash".to_string(),
            "Test User".to_string(),
        );

        assert!(user.is_email_verified);
        assert!(user.email_verified_at.is_some());
        assert_eq!(user.pending_email, None);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new_verified(
            "test@example.com".to_string(),
            "$2b$12$hash".to_string(),
            "Test User".to_string(),
        );

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "test@example.com");
    }
}
