pub mod extractors;
pub mod flows;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod session;
pub mod staging;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::User;

// Re-export necessary items
pub use flows::AuthService;
pub use middleware::AuthMiddleware;
pub use token::{Claims, TokenKind, TokenPair};

lazy_static! {
    // One-time codes are exactly six digits
    static ref OTP_REGEX: regex::Regex = regex::Regex::new(r"^[0-9]{6}$").unwrap();
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address for the new account.
    /// Must be a valid email format.
    #[validate(email)]
    pub email: String,
    /// Password for the new account.
    /// Must be at least 6 characters long.
    #[validate(length(min = 6))]
    pub password: String,
    /// Display name for the new account.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Represents the payload for submitting an email-verification code.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(email)]
    pub email: String,
    /// The six-digit code from the verification email.
    #[validate(regex(path = "OTP_REGEX", message = "Code must be exactly six digits"))]
    pub otp: String,
}

/// Represents the payload for requesting a fresh verification code.
#[derive(Debug, Deserialize, Validate)]
pub struct ResendOtpRequest {
    #[validate(email)]
    pub email: String,
}

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// User's email address.
    /// Must be a valid email format.
    #[validate(email)]
    pub email: String,
    /// User's password.
    /// Must be at least 6 characters long.
    #[validate(length(min = 6))]
    pub password: String,
}

/// Represents the payload for rotating a refresh token.
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Represents the payload for requesting a password-reset code.
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// Represents the payload for completing a password reset.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(regex(path = "OTP_REGEX", message = "Code must be exactly six digits"))]
    pub otp: String,
    #[validate(length(min = 6))]
    pub new_password: String,
}

/// Represents the payload for changing the caller's password.
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 6))]
    pub current_password: String,
    #[validate(length(min = 6))]
    pub new_password: String,
}

/// Represents the payload for staging an email change.
#[derive(Debug, Deserialize, Validate)]
pub struct ChangeEmailRequest {
    #[validate(email)]
    pub new_email: String,
}

/// Response structure after successful authentication (verification, login
/// or email change). Contains the user and a fresh token pair.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// A bare confirmation message, used by the flows that must not return
/// tokens or reveal account state.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
