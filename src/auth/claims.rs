// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated principal representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Principal attached to a request after the auth gate confirmed its
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub principal_id: String,
    pub role: Role,
    /// Live session backing the access token
    #[serde(skip)]
    pub session_id: String,
}

impl AuthenticatedUser {
    /// Check if the user has at least the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    /// Check membership in an explicit role set.
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
