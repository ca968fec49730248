// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Principal roles.
///
/// ## Role Hierarchy
///
/// - `SuperAdmin` - Everything an admin can do, plus recording, settling and
///   removing transactions
/// - `Admin` - Lists transactions and balances; suspends users
/// - `User` - End user, can only access own account and ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// End user (least privilege)
    #[default]
    User,
    /// Platform administrator
    Admin,
    /// Administrator allowed to change the ledger
    SuperAdmin,
}

impl Role {
    fn rank(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Admin => 1,
            Role::SuperAdmin => 2,
        }
    }

    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn is_admin(&self) -> bool {
        self.has_privilege(Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
