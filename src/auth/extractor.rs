// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated principals.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser, Role};
use crate::state::AppState;

/// Header carrying the step-up token for passcode-protected operations.
pub const STEP_UP_HEADER: &str = "x-step-up-token";

/// Extractor for authenticated principals.
///
/// Validates the bearer token from the Authorization header and confirms
/// its session through the [`super::AuthGate`].
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Already authenticated earlier in this request
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = bearer_token(parts)?;
        let user = state.gate.authenticate(token).await?;
        parts.extensions.insert(user.clone());

        Ok(Auth(user))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Extractor that requires an admin or super-admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.has_any_role(&[Role::Admin, Role::SuperAdmin]) {
            return Err(AuthError::InsufficientRole);
        }

        Ok(AdminOnly(user))
    }
}

/// Extractor that requires the super-admin role.
pub struct SuperAdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for SuperAdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.has_any_role(&[Role::SuperAdmin]) {
            return Err(AuthError::InsufficientRole);
        }

        Ok(SuperAdminOnly(user))
    }
}

/// Raw `X-Step-Up-Token` header, if present. Verification is left to the
/// handler because only some operations require it.
pub struct StepUpHeader(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for StepUpHeader {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(STEP_UP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(StepUpHeader(token))
    }
}
