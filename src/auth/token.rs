use crate::config::Config;
use crate::error::AppError;
use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Distinguishes the two token kinds.
///
/// Each kind is signed with its own secret *and* carries its kind as an
/// explicit `purpose` claim, so a secret-reuse misconfiguration cannot let
/// a refresh token pass where an access token is expected.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the user's unique identifier.
    pub sub: Uuid,
    /// The email address the token was issued for.
    pub email: String,
    /// The kind of token these claims belong to.
    pub purpose: TokenKind,
    /// Expiration timestamp (seconds since epoch) for the token.
    pub exp: usize,
}

/// An access/refresh token pair as returned by login, verification and refresh.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints and verifies signed bearer tokens.
///
/// Stateless: verifying an access token never consults the user store.
/// Whether a *refresh* token is still the current one for its user is a
/// separate question answered by the session store.
#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    fn secret(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Issues a token of the given kind for a user.
    pub fn issue(&self, kind: TokenKind, user_id: Uuid, email: &str) -> Result<String, AppError> {
        let expiration = chrono::Utc::now()
            .checked_add_signed(self.ttl(kind))
            .ok_or_else(|| AppError::InternalServerError("Token expiry out of range".into()))?
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            purpose: kind,
            exp: expiration,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind).as_bytes()),
        )
        .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Issues a fresh access/refresh pair for a user.
    pub fn issue_pair(&self, user_id: Uuid, email: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue(TokenKind::Access, user_id, email)?,
            refresh_token: self.issue(TokenKind::Refresh, user_id, email)?,
        })
    }

    /// Verifies a token against the secret for `kind` and decodes its claims.
    ///
    /// Fails `Unauthorized` on a bad signature, expiry, or a purpose claim
    /// that does not match the expected kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind).as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        if claims.purpose != kind {
            return Err(AppError::Unauthorized(format!(
                "Invalid token: expected {} token",
                kind
            )));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> Config {
        Config {
            database_url: None,
            server_port: 8080,
            server_host: "127.0.0.1".to_string(),
            access_token_secret: "access-secret-for-tests".to_string(),
            refresh_token_secret: "refresh-secret-for-tests".to_string(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            otp_ttl: Duration::minutes(10),
            pending_ttl: Duration::hours(1),
        }
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let issuer = TokenIssuer::new(&test_config());
        let user_id = Uuid::new_v4();

        let pair = issuer.issue_pair(user_id, "test@example.com").unwrap();

        let access = issuer.verify(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(access.sub, user_id);
        assert_eq!(access.email, "test@example.com");
        assert_eq!(access.purpose, TokenKind::Access);

        let refresh = issuer
            .verify(&pair.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert_eq!(refresh.sub, user_id);
        assert_eq!(refresh.purpose, TokenKind::Refresh);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let issuer = TokenIssuer::new(&test_config());
        let pair = issuer
            .issue_pair(Uuid::new_v4(), "test@example.com")
            .unwrap();

        // Signed with the refresh secret, so it fails signature validation
        // against the access secret.
        match issuer.verify(&pair.refresh_token, TokenKind::Access) {
            Err(AppError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_purpose_claim_checked_even_with_shared_secret() {
        // A misconfigured deployment might reuse the same secret for both
        // kinds; the purpose claim must still keep them apart.
        let mut config = test_config();
        config.refresh_token_secret = config.access_token_secret.clone();
        let issuer = TokenIssuer::new(&config);

        let refresh = issuer
            .issue(TokenKind::Refresh, Uuid::new_v4(), "test@example.com")
            .unwrap();

        match issuer.verify(&refresh, TokenKind::Access) {
            Err(AppError::Unauthorized(msg)) => {
                assert!(msg.contains("expected access token"), "got: {}", msg)
            }
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = test_config();
        config.access_token_ttl = Duration::seconds(-120);
        let issuer = TokenIssuer::new(&config);

        let token = issuer
            .issue(TokenKind::Access, Uuid::new_v4(), "test@example.com")
            .unwrap();

        match issuer.verify(&token, TokenKind::Access) {
            Err(AppError::Unauthorized(msg)) => {
                assert!(msg.contains("ExpiredSignature"), "got: {}", msg)
            }
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }
}
