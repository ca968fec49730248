// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login, and credential management endpoints.
//!
//! Every successful login or registration creates a session in the
//! [`crate::session::SessionRegistry`], which evicts the principal's
//! previous session. One-time codes are stored as keyed digests and
//! passwords and passcodes as Argon2id hashes; hashing runs on the blocking
//! pool.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header::USER_AGENT, request::Parts},
    Json,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{
        password::{hash_password, verify_password},
        secrets::{new_session_id, numeric_code},
        Auth, Role,
    },
    error::{ApiError, ApiResponse, ApiResult},
    session::SessionMetadata,
    state::AppState,
    storage::{NewPrincipal, Principal},
};

/// Digits in email verification and password reset codes.
pub const CODE_DIGITS: u32 = 6;
/// Lifetime of email verification and password reset codes.
pub const CODE_TTL_MINUTES: i64 = 15;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_USERNAME_LEN: usize = 4;

const INCORRECT_CREDENTIALS: &str = "Incorrect Email or Password";
const SUPERSEDED_MESSAGE: &str =
    "Welcome, authentication successful. You have been logged out of your previous device.";
const WELCOME_MESSAGE: &str = "Authentication Successful. Welcome!!!";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Client device descriptor sent at login.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DeviceInfo {
    pub ua: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
}

impl DeviceInfo {
    fn describe(&self) -> Option<String> {
        if let Some(ua) = self.ua.as_ref().filter(|ua| !ua.is_empty()) {
            return Some(ua.clone());
        }
        let parts: Vec<&str> = [&self.kind, &self.os, &self.browser]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" / "))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    #[serde(alias = "userName")]
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub device: Option<DeviceInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub access_token: String,
    pub id: String,
    pub account_handle: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub device: Option<DeviceInfo>,
}

/// Where the client should send the user after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoginRedirect {
    Verification,
    Passphrase,
    Dashboard,
}

impl LoginRedirect {
    fn for_principal(principal: &Principal) -> Self {
        if !principal.is_verified {
            LoginRedirect::Verification
        } else if principal.passcode_hash.is_none() {
            LoginRedirect::Passphrase
        } else {
            LoginRedirect::Dashboard
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub redirect: LoginRedirect,
    pub id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminLoginResponse {
    pub access_token: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub verification_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetPasscodeRequest {
    /// 4 to 6 digits
    pub passcode: String,
    /// Required when replacing an existing passcode
    #[serde(default)]
    pub current_passcode: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasscodeVerificationRequest {
    pub passcode: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepUpResponse {
    /// Send as `X-Step-Up-Token` on passcode-protected operations.
    pub step_up_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPasswordResetRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// =============================================================================
// Request context
// =============================================================================

/// Best-effort client address: first `X-Forwarded-For` hop, else the peer
/// address when the server was started with connect info.
pub struct ClientContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ClientContext {
            ip: forwarded.or(peer).map(canonical_ip),
            user_agent,
        })
    }
}

/// Unwrap IPv4-mapped IPv6 addresses.
fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn hash_secret(secret: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&secret))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)
}

async fn check_secret(secret: String, encoded: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&secret, &encoded))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password too short - should be {MIN_PASSWORD_LEN} chars minimum"
        )));
    }
    Ok(())
}

fn validate_passcode(passcode: &str) -> Result<(), ApiError> {
    if !(4..=6).contains(&passcode.len()) || !passcode.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("Passcode must be 4 to 6 digits"));
    }
    Ok(())
}

fn code_expiry() -> DateTime<Utc> {
    Utc::now() + TimeDelta::minutes(CODE_TTL_MINUTES)
}

pub(crate) async fn load_principal(state: &AppState, principal_id: &str) -> Result<Principal, ApiError> {
    state
        .principals
        .find_by_id(principal_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Create a session for `principal` and mint its access token.
///
/// Returns the token and whether a previous session was evicted.
async fn start_session(
    state: &AppState,
    principal: &Principal,
    client: &ClientContext,
    device: Option<DeviceInfo>,
) -> Result<(String, bool), ApiError> {
    let superseded = state.sessions.has_active(&principal.id).await?.is_some();
    let session_id = new_session_id().map_err(ApiError::internal)?;
    let location = state.geo.locate(client.ip).await;

    let metadata = SessionMetadata {
        ip: client.ip.map(|ip| ip.to_string()),
        device: device
            .and_then(|d| d.describe())
            .or_else(|| client.user_agent.clone()),
        location: Some(location),
    };
    state
        .sessions
        .create(&principal.id, &session_id, metadata, state.session_ttl)
        .await?;

    let token = state
        .tokens
        .issue(&principal.id, &session_id, principal.role, state.session_ttl)
        .map_err(ApiError::internal)?;

    tracing::info!(
        principal_id = %principal.id,
        role = %principal.role,
        superseded,
        "Session started"
    );
    Ok((token, superseded))
}

/// Look up a principal by email and check the password. Unknown email and
/// wrong password are indistinguishable.
async fn authenticate_credentials(state: &AppState, email: &str, password: &str) -> Result<Principal, ApiError> {
    let Some(principal) = state.principals.find_by_email(email).await? else {
        return Err(ApiError::bad_request(INCORRECT_CREDENTIALS));
    };
    if !check_secret(password.to_string(), principal.password_hash.clone()).await? {
        return Err(ApiError::bad_request(INCORRECT_CREDENTIALS));
    }
    Ok(principal)
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new user account and start its first session.
#[utoipa::path(
    post,
    path = "/v1/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or username already registered"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    client: ClientContext,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<RegisterResponse> {
    validate_email(&request.email)?;
    validate_password(&request.password)?;
    if request.username.trim().chars().count() < MIN_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username too short - should be {MIN_USERNAME_LEN} chars minimum"
        )));
    }

    let code = numeric_code(CODE_DIGITS).map_err(ApiError::internal)?;
    let principal = state
        .principals
        .create(NewPrincipal {
            email: request.email,
            username: request.username,
            password_hash: hash_secret(request.password).await?,
            role: Role::User,
            is_verified: false,
            verification_code: Some(state.codes.digest(&code)),
            verification_expires_at: Some(code_expiry()),
        })
        .await?;

    let (access_token, _) = start_session(&state, &principal, &client, request.device).await?;

    state.notifier.send_email(
        &principal.email,
        "Welcome to Cold Asset",
        format!("<p>Hi {}, welcome to Cold Asset.</p>", principal.username),
    );
    state.notifier.send_email(
        &principal.email,
        "Email Verification",
        format!("<p>Your verification code is <strong>{code}</strong>. It expires in {CODE_TTL_MINUTES} minutes.</p>"),
    );

    Ok(ApiResponse::created(
        "Welcome! Your account is ready.",
        RegisterResponse {
            access_token,
            id: principal.id,
            account_handle: principal.account_handle,
        },
    ))
}

/// Authenticate a user. Any previous session of the user is ended.
#[utoipa::path(
    post,
    path = "/v1/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Incorrect email or password"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    client: ClientContext,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let principal = authenticate_credentials(&state, &request.email, &request.password).await?;
    if principal.role.is_admin() {
        return Err(ApiError::bad_request(INCORRECT_CREDENTIALS));
    }

    let (access_token, superseded) = start_session(&state, &principal, &client, request.device).await?;

    let ip = client.ip.map(|ip| ip.to_string()).unwrap_or_else(|| "Unknown".to_string());
    state.notifier.send_email(
        &principal.email,
        "New Login to Your Cold Asset Wallet",
        format!(
            "<p>Hi {}, a new login to your account was detected from {ip} at {}.</p>",
            principal.username,
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ),
    );

    let message = if superseded { SUPERSEDED_MESSAGE } else { WELCOME_MESSAGE };
    Ok(ApiResponse::ok(
        message,
        LoginResponse {
            access_token,
            redirect: LoginRedirect::for_principal(&principal),
            id: principal.id,
        },
    ))
}

/// End the current session.
#[utoipa::path(
    post,
    path = "/v1/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn logout(State(state): State<AppState>, Auth(user): Auth) -> ApiResult<()> {
    state
        .sessions
        .revoke(&user.session_id, Some(&user.principal_id))
        .await?;
    tracing::info!(principal_id = %user.principal_id, "Logged out");
    Ok(ApiResponse::message("You have been logged out."))
}

/// Confirm the email address with the emailed code. An expired code is
/// replaced and re-sent.
#[utoipa::path(
    post,
    path = "/v1/verifyEmail",
    tag = "Auth",
    security(("bearer" = [])),
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Invalid or expired code"),
        (status = 409, description = "Already verified"),
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<VerifyEmailRequest>,
) -> ApiResult<()> {
    let principal = load_principal(&state, &user.principal_id).await?;
    if principal.is_verified {
        return Err(ApiError::conflict("Your Email is already verified"));
    }

    let expired = principal
        .verification_expires_at
        .is_none_or(|expiry| expiry < Utc::now());
    if expired {
        let code = numeric_code(CODE_DIGITS).map_err(ApiError::internal)?;
        let digest = state.codes.digest(&code);
        let expires_at = code_expiry();
        let principal = state
            .principals
            .update(&principal.id, move |p| {
                p.verification_code = Some(digest);
                p.verification_expires_at = Some(expires_at);
            })
            .await?;
        state.notifier.send_email(
            &principal.email,
            "Email Verification",
            format!("<p>Your new verification code is <strong>{code}</strong>.</p>"),
        );
        return Err(ApiError::bad_request(
            "Your verification code has expired. A new code has been sent to your email",
        ));
    }

    let matches = principal
        .verification_code
        .as_deref()
        .is_some_and(|digest| state.codes.verify(request.verification_code.trim(), digest));
    if !matches {
        return Err(ApiError::bad_request("Invalid Verification Code, kindly try again."));
    }

    state
        .principals
        .update(&principal.id, |p| {
            p.is_verified = true;
            p.verification_code = None;
            p.verification_expires_at = None;
        })
        .await?;

    Ok(ApiResponse::message("Your email was verified successfully."))
}

/// Set or replace the transaction passcode.
#[utoipa::path(
    post,
    path = "/v1/passcode",
    tag = "Auth",
    security(("bearer" = [])),
    request_body = SetPasscodeRequest,
    responses(
        (status = 200, description = "Passcode saved"),
        (status = 400, description = "Invalid passcode"),
        (status = 403, description = "Current passcode incorrect"),
    )
)]
pub async fn set_passcode(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<SetPasscodeRequest>,
) -> ApiResult<()> {
    validate_passcode(&request.passcode)?;
    let principal = load_principal(&state, &user.principal_id).await?;

    let replacing = principal.passcode_hash.is_some();
    if let Some(existing) = principal.passcode_hash.clone() {
        let current = request.current_passcode.unwrap_or_default();
        if !check_secret(current, existing).await? {
            return Err(ApiError::forbidden("Incorrect current passcode."));
        }
    }

    let passcode_hash = hash_secret(request.passcode).await?;
    let principal = state
        .principals
        .update(&principal.id, move |p| p.passcode_hash = Some(passcode_hash))
        .await?;

    if replacing {
        state.notifier.emit(
            &principal.id,
            "security",
            "passcode",
            "Passcode changed",
            "Your transaction passcode was changed.",
        );
        state.notifier.send_email(
            &principal.email,
            "Your Passcode Was Changed",
            "<p>Your transaction passcode was changed. Contact support if this was not you.</p>",
        );
    }

    Ok(ApiResponse::message("Your passcode was saved successfully."))
}

/// Re-confirm the passcode and obtain a step-up token.
#[utoipa::path(
    post,
    path = "/v1/verifyPasscode",
    tag = "Auth",
    security(("bearer" = [])),
    request_body = PasscodeVerificationRequest,
    responses(
        (status = 200, description = "Passcode verified", body = StepUpResponse),
        (status = 400, description = "Incorrect passcode"),
    )
)]
pub async fn verify_passcode(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<PasscodeVerificationRequest>,
) -> ApiResult<StepUpResponse> {
    let principal = load_principal(&state, &user.principal_id).await?;
    let Some(encoded) = principal.passcode_hash.clone() else {
        return Err(ApiError::bad_request("Please set a passcode first."));
    };
    if !check_secret(request.passcode, encoded).await? {
        return Err(ApiError::bad_request("Incorrect Passcode."));
    }

    let step_up_token = state
        .tokens
        .issue_step_up(&principal.id, principal.role)
        .map_err(ApiError::internal)?;

    Ok(ApiResponse::ok(
        "Your passcode validation successful",
        StepUpResponse { step_up_token },
    ))
}

/// Email a password reset code.
///
/// Unknown addresses receive the same response as known ones.
#[utoipa::path(
    post,
    path = "/v1/passwordResetVerification",
    tag = "Auth",
    request_body = PasswordResetEmailRequest,
    responses(
        (status = 200, description = "Code sent if the account exists"),
        (status = 403, description = "Account not verified"),
    )
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetEmailRequest>,
) -> ApiResult<()> {
    const SENT: &str = "A verification code will be sent if the email is associated with an account.";

    let Some(principal) = state.principals.find_by_email(&request.email).await? else {
        return Ok(ApiResponse::message(SENT));
    };
    if !principal.is_verified {
        return Err(ApiError::forbidden("Please verify your account before proceeding."));
    }

    let code = numeric_code(CODE_DIGITS).map_err(ApiError::internal)?;
    let digest = state.codes.digest(&code);
    let expires_at = code_expiry();
    let principal = state
        .principals
        .update(&principal.id, move |p| {
            p.reset_code = Some(digest);
            p.reset_code_expires_at = Some(expires_at);
        })
        .await?;

    state.notifier.send_email(
        &principal.email,
        "Reset Password Verification",
        format!("<p>Your password reset code is <strong>{code}</strong>. It expires in {CODE_TTL_MINUTES} minutes.</p>"),
    );

    Ok(ApiResponse::message(SENT))
}

/// Check a password reset code. On success the account may set a new
/// password until the confirmation expires.
#[utoipa::path(
    post,
    path = "/v1/verifyPasswordResetOTP",
    tag = "Auth",
    request_body = VerifyPasswordResetRequest,
    responses(
        (status = 200, description = "Code accepted"),
        (status = 400, description = "Incorrect or expired code"),
    )
)]
pub async fn verify_password_reset(
    State(state): State<AppState>,
    Json(request): Json<VerifyPasswordResetRequest>,
) -> ApiResult<()> {
    let Some(principal) = state.principals.find_by_email(&request.email).await? else {
        return Err(ApiError::bad_request("User does not exist"));
    };

    let live = principal
        .reset_code_expires_at
        .is_some_and(|expiry| expiry >= Utc::now());
    let matches = principal
        .reset_code
        .as_deref()
        .is_some_and(|digest| state.codes.verify(request.otp.trim(), digest));
    if !(live && matches) {
        return Err(ApiError::bad_request("Incorrect OTP"));
    }

    let principal = state
        .principals
        .update(&principal.id, |p| {
            p.reset_code = None;
            p.reset_code_expires_at = None;
        })
        .await?;
    state.reset_confirmations.confirm(&principal.id);

    Ok(ApiResponse::message("Email was verified successfully."))
}

/// Set a new password after a confirmed reset code. Ends any live session.
#[utoipa::path(
    post,
    path = "/v1/resetPassword",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Reset not confirmed or invalid password"),
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<()> {
    validate_password(&request.password)?;
    let Some(principal) = state.principals.find_by_email(&request.email).await? else {
        return Err(ApiError::bad_request("User does not exist"));
    };
    if !state.reset_confirmations.take(&principal.id) {
        return Err(ApiError::bad_request(
            "Something went wrong kindly restart the password reset process.",
        ));
    }

    let password_hash = hash_secret(request.password).await?;
    let principal = state
        .principals
        .update(&principal.id, move |p| p.password_hash = password_hash)
        .await?;

    if let Some(active) = state.sessions.has_active(&principal.id).await? {
        state
            .sessions
            .revoke(&active.session_id, Some(&principal.id))
            .await?;
    }
    tracing::info!(principal_id = %principal.id, "Password reset");

    Ok(ApiResponse::message("Your password was updated successfully."))
}

/// Change the password of the authenticated user.
#[utoipa::path(
    post,
    path = "/v1/changePassword",
    tag = "Auth",
    security(("bearer" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 403, description = "Wrong current password"),
        (status = 409, description = "New password equals the old one"),
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    if request.current_password == request.new_password {
        return Err(ApiError::conflict("Your new password must differ from your old one."));
    }
    validate_password(&request.new_password)?;

    let principal = load_principal(&state, &user.principal_id).await?;
    if !check_secret(request.current_password, principal.password_hash.clone()).await? {
        return Err(ApiError::forbidden("Wrong Password."));
    }

    let password_hash = hash_secret(request.new_password).await?;
    let principal = state
        .principals
        .update(&principal.id, move |p| p.password_hash = password_hash)
        .await?;
    state.notifier.emit(
        &principal.id,
        "security",
        "password",
        "Password changed",
        "Your password was changed.",
    );

    Ok(ApiResponse::message("Your password was updated successfully."))
}

/// Authenticate an administrator.
#[utoipa::path(
    post,
    path = "/v1/adminLogin",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AdminLoginResponse),
        (status = 400, description = "Incorrect email or password"),
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    client: ClientContext,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AdminLoginResponse> {
    let principal = authenticate_credentials(&state, &request.email, &request.password).await?;
    if !principal.role.is_admin() {
        return Err(ApiError::bad_request(INCORRECT_CREDENTIALS));
    }

    let (access_token, superseded) = start_session(&state, &principal, &client, request.device).await?;
    let message = if superseded { SUPERSEDED_MESSAGE } else { WELCOME_MESSAGE };

    Ok(ApiResponse::ok(
        message,
        AdminLoginResponse {
            access_token,
            role: principal.role,
        },
    ))
}
