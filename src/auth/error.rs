// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication and authorization failures.
///
/// Every variant is terminal at the HTTP boundary. Logout, expiry, and
/// supersession by a newer login all surface as `SessionExpired`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Signature, expiry, scope, or shape check failed
    InvalidToken,
    /// Token verified but lacks the principal or session claim
    MalformedClaims,
    /// No live session matches the token
    SessionExpired,
    /// The session registry could not be consulted; fails closed
    SessionUnavailable,
    /// Role not in the allowed set
    InsufficientRole,
    /// Operation needs a step-up token and none was supplied
    StepUpRequired,
    /// Step-up token invalid, expired, or issued to someone else
    InvalidStepUp,
}

#[derive(Serialize)]
struct AuthErrorData {
    code: &'static str,
}

#[derive(Serialize)]
struct AuthErrorBody {
    success: bool,
    message: String,
    data: AuthErrorData,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::InvalidToken => "invalid_token",
            AuthError::MalformedClaims => "malformed_claims",
            AuthError::SessionExpired => "session_expired",
            AuthError::SessionUnavailable => "session_unavailable",
            AuthError::InsufficientRole => "insufficient_role",
            AuthError::StepUpRequired => "step_up_required",
            AuthError::InvalidStepUp => "invalid_step_up",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientRole | AuthError::StepUpRequired | AuthError::InvalidStepUp => {
                StatusCode::FORBIDDEN
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::MalformedClaims => write!(f, "Token is missing required claims"),
            AuthError::SessionExpired => write!(f, "Session expired, please log in again"),
            AuthError::SessionUnavailable => write!(f, "Unable to verify session, please retry"),
            AuthError::InsufficientRole => {
                write!(f, "You do not have permission to perform this action")
            }
            AuthError::StepUpRequired => write!(f, "Passcode verification is required"),
            AuthError::InvalidStepUp => write!(f, "Passcode verification is invalid or expired"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            success: false,
            message: self.to_string(),
            data: AuthErrorData {
                code: self.error_code(),
            },
        });
        (status, body).into_response()
    }
}
