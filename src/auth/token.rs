// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token minting and verification (HS256).
//!
//! Two token classes share one signing secret and are told apart by the
//! `scope` claim:
//!
//! - `access`: bound to a server-side session through `sid`. Its signature
//!   alone is never enough; the auth gate also requires the session to be
//!   live.
//! - `step_up`: short-lived proof of passcode re-confirmation. Carries no
//!   session and is never accepted where an access token is expected.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::roles::Role;
use crate::config::MIN_SECRET_LEN;

/// Token class carried in the `scope` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    Access,
    StepUp,
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id. Empty when a foreign payload omitted it.
    #[serde(default)]
    pub sub: String,
    /// Session id (`jti`-equivalent); absent on step-up tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub role: Role,
    pub scope: TokenScope,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("signing secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,

    #[error("token has expired")]
    ExpiredToken,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is malformed")]
    MalformedToken,

    #[error("token scope does not match")]
    WrongScope,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Stateless token issuer/verifier built once from the configured secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    step_up_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("step_up_ttl", &self.step_up_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer. Rejects secrets shorter than [`MIN_SECRET_LEN`].
    pub fn new(secret: &str, step_up_ttl: Duration) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            step_up_ttl,
        })
    }

    /// Mint an access token bound to `session_id`.
    pub fn issue(
        &self,
        principal_id: &str,
        session_id: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            sub: principal_id.to_string(),
            sid: Some(session_id.to_string()),
            role,
            scope: TokenScope::Access,
            iat: now,
            exp: now + ttl.as_secs() as i64,
        })
    }

    /// Mint a step-up token after passcode re-confirmation.
    pub fn issue_step_up(&self, principal_id: &str, role: Role) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            sub: principal_id.to_string(),
            sid: None,
            role,
            scope: TokenScope::StepUp,
            iat: now,
            exp: now + self.step_up_ttl.as_secs() as i64,
        })
    }

    /// Verify signature and expiry of an access token.
    ///
    /// Claim presence (`sub`, `sid`) is left to the caller.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.scope != TokenScope::Access {
            return Err(TokenError::WrongScope);
        }
        Ok(claims)
    }

    /// Verify a step-up token.
    pub fn verify_step_up(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.scope != TokenScope::StepUp {
            return Err(TokenError::WrongScope);
        }
        if claims.sub.is_empty() {
            return Err(TokenError::MalformedToken);
        }
        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::MalformedToken,
            })
    }
}
