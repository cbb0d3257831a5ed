use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::otp::{OtpManager, OtpPurpose};
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::session::SessionStore;
use crate::auth::staging::RegistrationStager;
use crate::auth::token::{TokenIssuer, TokenKind, TokenPair};
use crate::config::Config;
use crate::error::AppError;
use crate::mail::Mailer;
use crate::models::User;
use crate::store::{EphemeralStore, UserStore};

/// Who a submitted email-verification code belongs to.
///
/// Registration and email change share the `email-verify:` OTP namespace,
/// so verification has to resolve which flow the address is in before it
/// can act. When both hold for the same address at once, the staged
/// registration wins.
enum VerificationTarget {
    /// A staged registration exists for the address.
    NewAccount,
    /// A verified user has this address staged as their `pending_email`.
    EmailChange(User),
}

/// Composes staging, OTP validation, credential checks, token issuance and
/// session tracking into the identity flows, and enforces the per-email
/// state machine (none / pending-unverified / verified).
///
/// All collaborators are injected; request handlers hold this behind
/// `web::Data` and call one method per operation.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    stager: RegistrationStager,
    otp: OtpManager,
    tokens: TokenIssuer,
    sessions: SessionStore,
    mailer: Arc<dyn Mailer>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        ephemeral: Arc<dyn EphemeralStore>,
        mailer: Arc<dyn Mailer>,
        config: &Config,
    ) -> Self {
        let otp = OtpManager::new(ephemeral.clone(), config.otp_ttl);
        let tokens = TokenIssuer::new(config);
        let sessions = SessionStore::new(ephemeral.clone(), config.refresh_token_ttl);
        let stager = RegistrationStager::new(
            users.clone(),
            ephemeral,
            otp.clone(),
            mailer.clone(),
            config.pending_ttl,
        );
        Self {
            users,
            stager,
            otp,
            tokens,
            sessions,
            mailer,
        }
    }

    /// The token issuer, shared with the bearer-auth middleware.
    pub fn token_issuer(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Stages a registration and sends a verification code.
    ///
    /// Fails `Conflict` if the address belongs to a verified user or is
    /// already staged. Returns no tokens.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        self.stager.stage(&email, password, name).await
    }

    /// Completes email verification for either a staged registration or an
    /// in-flight email change.
    ///
    /// On success the verified user and a fresh token pair are returned and
    /// the session is (re)started. Fails `NotFound` if nothing is awaiting
    /// verification for the address, `Unauthorized` if the code is wrong or
    /// expired.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(User, TokenPair), AppError> {
        let email = normalize_email(email);
        let target = match self.resolve_verification(&email).await? {
            Some(target) => target,
            None => {
                return Err(AppError::NotFound(
                    "No pending verification for this email".into(),
                ))
            }
        };

        // Check the code only after the target resolved: a wrong or stale
        // submission must not consume the staged state.
        if !self.otp.verify(OtpPurpose::EmailVerify, &email, code).await? {
            return Err(AppError::Unauthorized(
                "Invalid or expired verification code".into(),
            ));
        }

        match target {
            VerificationTarget::NewAccount => {
                let pending = self.stager.consume(&email).await?.ok_or_else(|| {
                    AppError::NotFound("No pending verification for this email".into())
                })?;
                let user =
                    User::new_verified(pending.email, pending.password_hash, pending.name);
                self.users.create(&user).await?;
                let pair = self.start_session(&user).await?;
                Ok((user, pair))
            }
            VerificationTarget::EmailChange(mut user) => {
                user.email = email;
                user.pending_email = None;
                user.email_verified_at = Some(Utc::now());
                user.updated_at = Utc::now();
                self.users.save(&user).await?;
                // Tokens embed the email address, so the session rotates and
                // the caller gets a pair minted for the new one.
                let pair = self.start_session(&user).await?;
                Ok((user, pair))
            }
        }
    }

    /// Regenerates and resends the verification code for a staged registration.
    ///
    /// Fails `Conflict` if the address is already verified, `NotFound` if
    /// nothing is staged for it.
    pub async fn resend_otp(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        if self.stager.peek(&email).await?.is_none() {
            if self.users.exists_by_email(&email).await? {
                return Err(AppError::Conflict("Email already verified".into()));
            }
            return Err(AppError::NotFound(
                "No pending registration for this email".into(),
            ));
        }

        let code = OtpManager::generate();
        self.otp.store(OtpPurpose::EmailVerify, &email, &code).await?;
        self.mailer.send(&email, &code, OtpPurpose::EmailVerify).await?;
        Ok(())
    }

    /// Authenticates credentials and starts a session.
    ///
    /// Unknown address and wrong password produce the identical error, so
    /// the response cannot be used to probe which accounts exist.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AppError> {
        let email = normalize_email(email);
        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => return Err(AppError::Unauthorized("Invalid credentials".into())),
        };

        if !verify_password_blocking(password, &user.password_hash).await? {
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }

        let pair = self.start_session(&user).await?;
        Ok((user, pair))
    }

    /// Exchanges a current refresh token for a fresh pair, rotating the session.
    ///
    /// The presented token must both carry a valid signature/expiry and be
    /// the most recently issued one for its user; a token superseded by an
    /// earlier rotation is rejected even while cryptographically valid.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        if !self.sessions.is_current(claims.sub, refresh_token).await? {
            return Err(AppError::Unauthorized(
                "Refresh token is no longer valid".into(),
            ));
        }

        let pair = self.tokens.issue_pair(claims.sub, &claims.email)?;
        self.sessions.put(claims.sub, &pair.refresh_token).await?;
        Ok(pair)
    }

    /// Revokes the user's session.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.sessions.revoke(user_id).await
    }

    /// Sends a password-reset code if the address belongs to a user.
    ///
    /// An unknown address succeeds silently with no delivery; the caller
    /// sees the same outcome either way.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        if self.users.find_by_email(&email).await?.is_none() {
            return Ok(());
        }

        let code = OtpManager::generate();
        self.otp
            .store(OtpPurpose::PasswordReset, &email, &code)
            .await?;
        self.mailer
            .send(&email, &code, OtpPurpose::PasswordReset)
            .await?;
        Ok(())
    }

    /// Sets a new password after validating the reset code, and kills the
    /// user's session.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let email = normalize_email(email);
        if !self
            .otp
            .verify(OtpPurpose::PasswordReset, &email, code)
            .await?
        {
            return Err(AppError::Unauthorized("Invalid or expired reset code".into()));
        }

        let mut user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => return Err(AppError::NotFound("User not found".into())),
        };

        user.password_hash = hash_password_blocking(new_password).await?;
        user.updated_at = Utc::now();
        self.users.save(&user).await?;
        self.sessions.revoke(user.id).await?;
        Ok(())
    }

    /// Changes the caller's password and rotates their session.
    ///
    /// The old session is revoked and a fresh pair is issued to the caller.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<TokenPair, AppError> {
        let mut user = match self.users.find_by_id(user_id).await? {
            Some(user) => user,
            None => return Err(AppError::NotFound("User not found".into())),
        };

        if !verify_password_blocking(current_password, &user.password_hash).await? {
            return Err(AppError::Unauthorized("Current password is incorrect".into()));
        }

        user.password_hash = hash_password_blocking(new_password).await?;
        user.updated_at = Utc::now();
        self.users.save(&user).await?;

        self.sessions.revoke(user.id).await?;
        let pair = self.start_session(&user).await?;
        Ok(pair)
    }

    /// Stages an email change and sends a verification code to the new address.
    ///
    /// Fails `Conflict` if the new address is already in use by a verified
    /// user (including the caller's own current address).
    pub async fn request_email_change(
        &self,
        user_id: Uuid,
        new_email: &str,
    ) -> Result<(), AppError> {
        let new_email = normalize_email(new_email);
        let mut user = match self.users.find_by_id(user_id).await? {
            Some(user) => user,
            None => return Err(AppError::NotFound("User not found".into())),
        };

        if self.users.exists_by_email(&new_email).await? {
            return Err(AppError::Conflict("Email already in use".into()));
        }

        user.pending_email = Some(new_email.clone());
        user.updated_at = Utc::now();
        self.users.save(&user).await?;

        let code = OtpManager::generate();
        self.otp
            .store(OtpPurpose::EmailVerify, &new_email, &code)
            .await?;
        self.mailer
            .send(&new_email, &code, OtpPurpose::EmailVerify)
            .await?;
        Ok(())
    }

    /// Looks up the calling user. The one access-token path that touches
    /// the persistent store.
    pub async fn me(&self, user_id: Uuid) -> Result<User, AppError> {
        match self.users.find_by_id(user_id).await? {
            Some(user) => Ok(user),
            None => Err(AppError::NotFound("User not found".into())),
        }
    }

    /// Resolves which flow an `email-verify` code for `email` belongs to.
    /// Staged registrations take precedence over email changes.
    async fn resolve_verification(
        &self,
        email: &str,
    ) -> Result<Option<VerificationTarget>, AppError> {
        if self.stager.peek(email).await?.is_some() {
            return Ok(Some(VerificationTarget::NewAccount));
        }
        if let Some(user) = self.users.find_by_pending_email(email).await? {
            return Ok(Some(VerificationTarget::EmailChange(user)));
        }
        Ok(None)
    }

    /// Issues a pair and records its refresh token as the user's current
    /// session, replacing any previous one.
    async fn start_session(&self, user: &User) -> Result<TokenPair, AppError> {
        let pair = self.tokens.issue_pair(user.id, &user.email)?;
        self.sessions.put(user.id, &pair.refresh_token).await?;
        Ok(pair)
    }
}

/// Email addresses are compared case-insensitively everywhere; normalize
/// once at the boundary.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::RecordingMailer;
    use crate::store::{MemoryStore, MemoryUserStore};
    use chrono::Duration;

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

    fn service() -> (AuthService, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::new());
        let service = AuthService::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryStore::new()),
            mailer.clone(),
            &test_config(),
        );
        (service, mailer)
    }

    async fn register_and_verify(
        service: &AuthService,
        mailer: &RecordingMailer,
        email: &str,
        password: &str,
        name: &str,
    ) -> (User, TokenPair) {
        service.register(email, password, name).await.unwrap();
        let code = mailer.last_code_for(email).unwrap();
        service.verify_email(email, &code).await.unwrap()
    }

    #[actix_rt::test]
    async fn test_register_twice_conflicts() {
        let (service, _mailer) = service();
        service.register("a@x.com", "Pw12345", "A").await.unwrap();

        match service.register("a@x.com", "Pw12345", "A").await {
            Err(AppError::Conflict(_)) => {}
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_verify_email_transitions_pending_to_verified_once() {
        let (service, mailer) = service();
        service.register("a@x.com", "Pw12345", "A").await.unwrap();
        let code = mailer.last_code_for("a@x.com").unwrap();

        // Wrong code first: staged state survives.
        let wrong = if code == "000000" { "000001" } else { "000000" };
        match service.verify_email("a@x.com", wrong).await {
            Err(AppError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }

        let (user, _pair) = service.verify_email("a@x.com", &code).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert!(user.is_email_verified);

        // The staging entry was consumed, so a repeat is NotFound even
        // though the code's TTL window has not passed.
        match service.verify_email("a@x.com", &code).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_login_failures_are_indistinguishable() {
        let (service, mailer) = service();
        register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        let wrong_password = service.login("a@x.com", "WrongPw1").await.unwrap_err();
        let unknown_user = service.login("ghost@x.com", "Pw12345").await.unwrap_err();

        match (&wrong_password, &unknown_user) {
            (AppError::Unauthorized(a), AppError::Unauthorized(b)) => assert_eq!(a, b),
            other => panic!("Expected two Unauthorized errors, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_login_is_case_insensitive_on_email() {
        let (service, mailer) = service();
        register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        assert!(service.login("A@X.COM", "Pw12345").await.is_ok());
    }

    #[actix_rt::test]
    async fn test_refresh_rotates_and_rejects_superseded_token() {
        let (service, mailer) = service();
        let (_user, first) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        let second = service.refresh(&first.refresh_token).await.unwrap();

        // The rotated-out token is rejected even though it has not expired.
        match service.refresh(&first.refresh_token).await {
            Err(AppError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
        assert!(service.refresh(&second.refresh_token).await.is_ok());
    }

    #[actix_rt::test]
    async fn test_login_elsewhere_invalidates_previous_session() {
        let (service, mailer) = service();
        let (_user, first) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        let (_user, _second) = service.login("a@x.com", "Pw12345").await.unwrap();

        match service.refresh(&first.refresh_token).await {
            Err(AppError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_access_token_rejected_as_refresh() {
        let (service, mailer) = service();
        let (_user, pair) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        match service.refresh(&pair.access_token).await {
            Err(AppError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_resend_otp_states() {
        let (service, mailer) = service();

        // Nothing staged, nothing verified.
        match service.resend_otp("ghost@x.com").await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }

        service.register("a@x.com", "Pw12345", "A").await.unwrap();
        let first_code = mailer.last_code_for("a@x.com").unwrap();

        service.resend_otp("a@x.com").await.unwrap();
        let second_code = mailer.last_code_for("a@x.com").unwrap();

        // The replaced code no longer validates; only the resent one does.
        if first_code != second_code {
            match service.verify_email("a@x.com", &first_code).await {
                Err(AppError::Unauthorized(_)) => {}
                other => panic!("Expected Unauthorized, got {:?}", other),
            }
        }
        service.verify_email("a@x.com", &second_code).await.unwrap();

        match service.resend_otp("a@x.com").await {
            Err(AppError::Conflict(_)) => {}
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_password_reset_flow_revokes_session() {
        let (service, mailer) = service();
        let (_user, pair) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        service.request_password_reset("a@x.com").await.unwrap();
        let code = mailer.last_code_for("a@x.com").unwrap();
        service
            .reset_password("a@x.com", &code, "NewPw123")
            .await
            .unwrap();

        // The refresh token that was current before the reset is dead.
        match service.refresh(&pair.refresh_token).await {
            Err(AppError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }

        // The old password no longer works, the new one does.
        assert!(service.login("a@x.com", "Pw12345").await.is_err());
        assert!(service.login("a@x.com", "NewPw123").await.is_ok());
    }

    #[actix_rt::test]
    async fn test_password_reset_for_unknown_email_is_silent() {
        let (service, mailer) = service();

        service
            .request_password_reset("unknown@x.com")
            .await
            .unwrap();

        assert!(mailer.sent().is_empty());
    }

    #[actix_rt::test]
    async fn test_reset_code_cannot_verify_email() {
        let (service, mailer) = service();
        register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        service.request_password_reset("a@x.com").await.unwrap();
        let reset_code = mailer.last_code_for("a@x.com").unwrap();

        // Stage an email change toward a fresh address, then try to verify
        // it with the reset code: the namespaces must not cross.
        let (user, _pair) = service.login("a@x.com", "Pw12345").await.unwrap();
        service
            .request_email_change(user.id, "new@x.com")
            .await
            .unwrap();
        match service.verify_email("new@x.com", &reset_code).await {
            Err(AppError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_change_password_rotates_session() {
        let (service, mailer) = service();
        let (user, pair) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        match service
            .change_password(user.id, "WrongPw1", "NewPw123")
            .await
        {
            Err(AppError::Unauthorized(msg)) => {
                assert_eq!(msg, "Current password is incorrect")
            }
            other => panic!("Expected Unauthorized, got {:?}", other),
        }

        let fresh = service
            .change_password(user.id, "Pw12345", "NewPw123")
            .await
            .unwrap();

        // The pre-change session is gone; the freshly issued pair works.
        assert!(service.refresh(&pair.refresh_token).await.is_err());
        assert!(service.refresh(&fresh.refresh_token).await.is_ok());
        assert!(service.login("a@x.com", "NewPw123").await.is_ok());
    }

    #[actix_rt::test]
    async fn test_email_change_flow() {
        let (service, mailer) = service();
        let (user, old_pair) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        service
            .request_email_change(user.id, "b@x.com")
            .await
            .unwrap();
        let code = mailer.last_code_for("b@x.com").unwrap();

        let (updated, new_pair) = service.verify_email("b@x.com", &code).await.unwrap();
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.email, "b@x.com");
        assert_eq!(updated.pending_email, None);

        // The session rotated with the address: old pair dead, new one live.
        assert!(service.refresh(&old_pair.refresh_token).await.is_err());
        assert!(service.refresh(&new_pair.refresh_token).await.is_ok());

        // Credentials now live under the new address only.
        assert!(service.login("b@x.com", "Pw12345").await.is_ok());
        assert!(service.login("a@x.com", "Pw12345").await.is_err());
    }

    #[actix_rt::test]
    async fn test_email_change_conflicts_with_taken_address() {
        let (service, mailer) = service();
        let (alice, _) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;
        register_and_verify(&service, &mailer, "b@x.com", "Pw12345", "B").await;

        match service.request_email_change(alice.id, "b@x.com").await {
            Err(AppError::Conflict(_)) => {}
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_verify_prefers_pending_registration_over_email_change() {
        let (service, mailer) = service();
        let (bob, _) = register_and_verify(&service, &mailer, "b@x.com", "Pw12345", "B").await;

        // Bob stages a change toward the contested address, and a stranger
        // registers it outright. Both flows now wait on `email-verify:c@x.com`.
        service
            .request_email_change(bob.id, "c@x.com")
            .await
            .unwrap();
        service.register("c@x.com", "Other123", "C").await.unwrap();
        let code = mailer.last_code_for("c@x.com").unwrap();

        let (winner, _pair) = service.verify_email("c@x.com", &code).await.unwrap();

        // The staged registration resolves; Bob's change stays pending.
        assert_ne!(winner.id, bob.id);
        assert_eq!(winner.email, "c@x.com");
        let bob_now = service.me(bob.id).await.unwrap();
        assert_eq!(bob_now.email, "b@x.com");
        assert_eq!(bob_now.pending_email.as_deref(), Some("c@x.com"));
    }

    #[actix_rt::test]
    async fn test_logout_revokes_session() {
        let (service, mailer) = service();
        let (user, pair) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        service.logout(user.id).await.unwrap();

        match service.refresh(&pair.refresh_token).await {
            Err(AppError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_me_returns_current_user() {
        let (service, mailer) = service();
        let (user, _pair) =
            register_and_verify(&service, &mailer, "a@x.com", "Pw12345", "A").await;

        let me = service.me(user.id).await.unwrap();
        assert_eq!(me.id, user.id);
        assert_eq!(me.email, "a@x.com");

        match service.me(Uuid::new_v4()).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}
