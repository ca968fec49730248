// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential store: principal records and identity indexes.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use super::{
    Store, StorageError, PRINCIPALS, PRINCIPAL_EMAIL_INDEX, PRINCIPAL_HANDLE_INDEX,
    PRINCIPAL_USERNAME_INDEX,
};
use crate::auth::secrets::{account_handle, SecretError};
use crate::auth::Role;

/// Number of handle candidates drawn per registration.
const HANDLE_ATTEMPTS: usize = 8;

/// A user or administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub username: String,
    /// `CA` + 10 upper-case alphanumerics, used to address internal transfers.
    pub account_handle: String,
    pub password_hash: String,
    pub role: Role,
    pub is_suspended: bool,
    pub suspended_at: Option<DateTime<Utc>>,
    pub is_verified: bool,
    /// Keyed digest of the pending email verification code.
    pub verification_code: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub passcode_hash: Option<String>,
    /// Keyed digest of the pending password reset code.
    pub reset_code: Option<String>,
    pub reset_code_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn suspend(&mut self) {
        if !self.is_suspended {
            self.is_suspended = true;
            self.suspended_at = Some(Utc::now());
        }
    }

    pub fn reinstate(&mut self) {
        self.is_suspended = false;
        self.suspended_at = None;
    }
}

/// Registration input. Identity fields are normalized on insert.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub verification_code: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PrincipalError {
    #[error("{0} is already registered")]
    DuplicateIdentity(&'static str),

    #[error("principal not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

fn handle_key(handle: &str) -> String {
    handle.trim().to_uppercase()
}

/// Repository over the `principals` table and its identity indexes.
#[derive(Clone)]
pub struct PrincipalRepository {
    store: Store,
}

impl PrincipalRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert a new principal, enforcing uniqueness of email, username and
    /// account handle in a single write transaction.
    pub async fn create(&self, input: NewPrincipal) -> Result<Principal, PrincipalError> {
        let candidates = (0..HANDLE_ATTEMPTS)
            .map(|_| account_handle())
            .collect::<Result<Vec<_>, _>>()?;

        let outcome = self
            .store
            .run("principals.create", move |db| -> Result<Result<Principal, PrincipalError>, StorageError> {
                let email = normalize_email(&input.email);
                let username = username_key(&input.username);

                let write_txn = db.begin_write()?;
                let principal = {
                    let mut email_idx = write_txn.open_table(PRINCIPAL_EMAIL_INDEX)?;
                    let mut username_idx = write_txn.open_table(PRINCIPAL_USERNAME_INDEX)?;
                    let mut handle_idx = write_txn.open_table(PRINCIPAL_HANDLE_INDEX)?;
                    let mut principals = write_txn.open_table(PRINCIPALS)?;

                    if email_idx.get(email.as_str())?.is_some() {
                        return Ok(Err(PrincipalError::DuplicateIdentity("email")));
                    }
                    if username_idx.get(username.as_str())?.is_some() {
                        return Ok(Err(PrincipalError::DuplicateIdentity("username")));
                    }

                    let mut handle = None;
                    for candidate in candidates {
                        if handle_idx.get(candidate.as_str())?.is_none() {
                            handle = Some(candidate);
                            break;
                        }
                    }
                    let Some(account_handle) = handle else {
                        return Ok(Err(PrincipalError::DuplicateIdentity("account handle")));
                    };

                    let now = Utc::now();
                    let principal = Principal {
                        id: uuid::Uuid::new_v4().to_string(),
                        email,
                        username: input.username.trim().to_string(),
                        account_handle,
                        password_hash: input.password_hash,
                        role: input.role,
                        is_suspended: false,
                        suspended_at: None,
                        is_verified: input.is_verified,
                        verification_code: input.verification_code,
                        verification_expires_at: input.verification_expires_at,
                        passcode_hash: None,
                        reset_code: None,
                        reset_code_expires_at: None,
                        created_at: now,
                        updated_at: now,
                    };

                    let json = serde_json::to_vec(&principal)?;
                    principals.insert(principal.id.as_str(), json.as_slice())?;
                    email_idx.insert(principal.email.as_str(), principal.id.as_str())?;
                    username_idx.insert(username.as_str(), principal.id.as_str())?;
                    handle_idx.insert(principal.account_handle.as_str(), principal.id.as_str())?;
                    principal
                };
                write_txn.commit()?;
                Ok(Ok(principal))
            })
            .await?;

        let principal = outcome?;
        tracing::info!(
            principal_id = %principal.id,
            role = %principal.role,
            "Principal registered"
        );
        Ok(principal)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, PrincipalError> {
        let id = id.to_string();
        Ok(self
            .store
            .run("principals.find_by_id", move |db| {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(PRINCIPALS)?;
                read_principal(&table, &id)
            })
            .await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, PrincipalError> {
        self.find_by_index("principals.find_by_email", PRINCIPAL_EMAIL_INDEX, normalize_email(email))
            .await
    }

    #[cfg(test)]
    pub(crate) async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, PrincipalError> {
        self.find_by_index("principals.find_by_username", PRINCIPAL_USERNAME_INDEX, username_key(username))
            .await
    }

    pub async fn find_by_handle(&self, handle: &str) -> Result<Option<Principal>, PrincipalError> {
        self.find_by_index("principals.find_by_handle", PRINCIPAL_HANDLE_INDEX, handle_key(handle))
            .await
    }

    /// Apply `mutate` to the stored principal and persist the result.
    ///
    /// The read, the mutation and the write share one redb write
    /// transaction, so concurrent updates touching different fields never
    /// overwrite each other. Identity fields (email, username, handle) are
    /// immutable after registration; their indexes are not rewritten here.
    pub async fn update<F>(&self, id: &str, mutate: F) -> Result<Principal, PrincipalError>
    where
        F: FnOnce(&mut Principal) + Send + 'static,
    {
        let id = id.to_string();
        self.store
            .run("principals.update", move |db| -> Result<Result<Principal, PrincipalError>, StorageError> {
                let write_txn = db.begin_write()?;
                let principal = {
                    let mut table = write_txn.open_table(PRINCIPALS)?;
                    let Some(mut principal) = read_principal(&table, &id)? else {
                        return Ok(Err(PrincipalError::NotFound));
                    };
                    mutate(&mut principal);
                    principal.id = id;
                    principal.updated_at = Utc::now();
                    let json = serde_json::to_vec(&principal)?;
                    table.insert(principal.id.as_str(), json.as_slice())?;
                    principal
                };
                write_txn.commit()?;
                Ok(Ok(principal))
            })
            .await?
    }

    async fn find_by_index(
        &self,
        op: &'static str,
        index: redb::TableDefinition<'static, &'static str, &'static str>,
        key: String,
    ) -> Result<Option<Principal>, PrincipalError> {
        Ok(self
            .store
            .run(op, move |db| {
                let read_txn = db.begin_read()?;
                let idx = read_txn.open_table(index)?;
                let Some(id) = idx.get(key.as_str())?.map(|v| v.value().to_string()) else {
                    return Ok(None);
                };
                let table = read_txn.open_table(PRINCIPALS)?;
                read_principal(&table, &id)
            })
            .await?)
    }
}

fn read_principal(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    id: &str,
) -> Result<Option<Principal>, StorageError> {
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}
