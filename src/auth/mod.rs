// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Opaque bearer tokens bound to revocable server-side sessions.
//!
//! ## Auth Flow
//!
//! 1. `POST /v1/login` verifies credentials, creates a session in the
//!    [`crate::session::SessionRegistry`] (evicting any previous one) and
//!    returns an HS256 access token carrying `{sub, sid, role}`.
//! 2. Clients send `Authorization: Bearer <token>`.
//! 3. The [`AuthGate`]:
//!    - verifies signature, expiry and scope
//!    - requires `sub` and `sid`
//!    - confirms the session is live and owned by `sub`
//!    - refreshes the session's `last_seen` in the background
//!
//! ## Security
//!
//! - All non-health endpoints except login/registration require a session
//! - Logout, expiry and supersession are indistinguishable to clients
//! - Registry failures fail closed
//! - `sent` transfers additionally require a step-up token obtained by
//!   re-entering the passcode

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod password;
pub mod roles;
pub mod secrets;
pub mod token;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, StepUpHeader, SuperAdminOnly};
pub use gate::AuthGate;
pub use roles::Role;
pub use token::{Claims, TokenError, TokenIssuer};
