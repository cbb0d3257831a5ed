use crate::{
    auth::{
        extractors::AuthenticatedUser, AuthResponse, AuthService, ChangeEmailRequest,
        ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
        RefreshRequest, RegisterRequest, ResendOtpRequest, ResetPasswordRequest,
        VerifyEmailRequest,
    },
    error::AppError,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use validator::Validate;

/// Register a new user
///
/// Stages the registration and emails a verification code. No account is
/// created and no tokens are issued until the code is confirmed.
#[post("/register")]
pub async fn register(
    service: web::Data<AuthService>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    // Validate input
    register_data.validate()?;

    service
        .register(
            &register_data.email,
            &register_data.password,
            &register_data.name,
        )
        .await?;

    Ok(HttpResponse::Created().json(MessageResponse {
        message: "Verification code sent. Check your inbox to complete registration.".into(),
    }))
}

/// Verify an email address
///
/// Confirms a staged registration or an in-flight email change and returns
/// the verified user with a fresh token pair.
#[post("/verify-email")]
pub async fn verify_email(
    service: web::Data<AuthService>,
    verify_data: web::Json<VerifyEmailRequest>,
) -> Result<impl Responder, AppError> {
    verify_data.validate()?;

    let (user, tokens) = service
        .verify_email(&verify_data.email, &verify_data.otp)
        .await?;

    Ok(HttpResponse::Ok().json(AuthResponse { user, tokens }))
}

/// Resend the verification code for a staged registration.
#[post("/resend-otp")]
pub async fn resend_otp(
    service: web::Data<AuthService>,
    resend_data: web::Json<ResendOtpRequest>,
) -> Result<impl Responder, AppError> {
    resend_data.validate()?;

    service.resend_otp(&resend_data.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Verification code resent.".into(),
    }))
}

/// Login user
///
/// Authenticates a user and returns a fresh token pair, replacing any
/// previously active session.
#[post("/login")]
pub async fn login(
    service: web::Data<AuthService>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    // Validate input
    login_data.validate()?;

    let (user, tokens) = service
        .login(&login_data.email, &login_data.password)
        .await?;

    Ok(HttpResponse::Ok().json(AuthResponse { user, tokens }))
}

/// Rotate a refresh token
///
/// Exchanges the current refresh token for a fresh pair; the presented
/// token stops being accepted the moment the exchange succeeds.
#[post("/refresh")]
pub async fn refresh(
    service: web::Data<AuthService>,
    refresh_data: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    refresh_data.validate()?;

    let tokens = service.refresh(&refresh_data.refresh_token).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Log out the calling user, revoking their session.
#[post("/logout")]
pub async fn logout(
    service: web::Data<AuthService>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    service.logout(user.id).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Request a password-reset code.
///
/// Responds identically whether or not the address belongs to an account.
#[post("/password/forgot")]
pub async fn forgot_password(
    service: web::Data<AuthService>,
    forgot_data: web::Json<ForgotPasswordRequest>,
) -> Result<impl Responder, AppError> {
    forgot_data.validate()?;

    service.request_password_reset(&forgot_data.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "If that email is registered, a reset code has been sent.".into(),
    }))
}

/// Complete a password reset with an emailed code.
#[post("/password/reset")]
pub async fn reset_password(
    service: web::Data<AuthService>,
    reset_data: web::Json<ResetPasswordRequest>,
) -> Result<impl Responder, AppError> {
    reset_data.validate()?;

    service
        .reset_password(&reset_data.email, &reset_data.otp, &reset_data.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Password has been reset. Please log in with your new password.".into(),
    }))
}

/// Change the calling user's password.
///
/// Returns a fresh token pair; the pre-change session is revoked.
#[post("/password/change")]
pub async fn change_password(
    service: web::Data<AuthService>,
    user: AuthenticatedUser,
    change_data: web::Json<ChangePasswordRequest>,
) -> Result<impl Responder, AppError> {
    change_data.validate()?;

    let tokens = service
        .change_password(
            user.id,
            &change_data.current_password,
            &change_data.new_password,
        )
        .await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Stage an email change for the calling user.
///
/// A verification code goes to the new address; the account keeps its
/// current email until the code is confirmed.
#[post("/email/change")]
pub async fn change_email(
    service: web::Data<AuthService>,
    user: AuthenticatedUser,
    change_data: web::Json<ChangeEmailRequest>,
) -> Result<impl Responder, AppError> {
    change_data.validate()?;

    service
        .request_email_change(user.id, &change_data.new_email)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Verification code sent to the new address.".into(),
    }))
}

/// Return the calling user's account.
#[get("/me")]
pub async fn me(
    service: web::Data<AuthService>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = service.me(user.id).await?;

    Ok(HttpResponse::Ok().json(user))
}
