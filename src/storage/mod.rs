// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Embedded persistence backed by redb (pure Rust, ACID).
//!
//! Every store call runs on the blocking pool and is bounded by the
//! configured timeout. A timed-out call is an error, never a negative
//! lookup result: callers must not read "absent" into a timeout.
//!
//! ## Table Layout
//!
//! - `sessions`: session_id → serialized SessionRecord
//! - `principal_sessions`: principal_id → serialized SessionPointer
//! - `principals`: principal_id → serialized Principal
//! - `principal_email_index` / `principal_username_index` /
//!   `principal_handle_index`: identity field → principal_id
//! - `transactions`: tx_id → serialized Transaction
//! - `principal_tx_index`: `principal|!timestamp|tx_id` → kind
//! - `pending_tx_index`: `principal|tx_id` → created_at (micros)
//! - `tx_hash_index`: `tx_hash|tx_id` → principal_id
//! - `notifications`: `principal|!timestamp|notification_id` → serialized Notification

pub mod notifications;
pub mod principals;
pub mod reset_codes;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableDatabase, TableDefinition};

pub use notifications::{Notification, NotificationRepository};
pub use principals::{NewPrincipal, Principal, PrincipalError, PrincipalRepository};
pub use reset_codes::ResetConfirmations;

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Pointer: principal_id → current session (id + expiry).
pub(crate) const PRINCIPAL_SESSIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("principal_sessions");

pub(crate) const PRINCIPALS: TableDefinition<&str, &[u8]> = TableDefinition::new("principals");
pub(crate) const PRINCIPAL_EMAIL_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("principal_email_index");
pub(crate) const PRINCIPAL_USERNAME_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("principal_username_index");
pub(crate) const PRINCIPAL_HANDLE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("principal_handle_index");

pub(crate) const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// Index: composite key → kind ("sent"|"received"|"swap").
/// Key format: `principal|!timestamp_be|tx_id` for descending-time range scans.
pub(crate) const PRINCIPAL_TX_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("principal_tx_index");

/// Single-flight guard: one entry per pending transaction, keyed `principal|tx_id`.
pub(crate) const PENDING_TX_INDEX: TableDefinition<&str, i64> =
    TableDefinition::new("pending_tx_index");

pub(crate) const TX_HASH_INDEX: TableDefinition<&str, &str> = TableDefinition::new("tx_hash_index");

pub(crate) const NOTIFICATIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("notifications");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store call `{0}` timed out")]
    Timeout(&'static str),

    #[error("store task failed: {0}")]
    Task(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key `owner | inverted_timestamp_be | id`.
///
/// The inverted timestamp gives newest-first ordering on a forward scan.
pub(crate) fn make_index_key(owner: &str, timestamp_micros: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(owner.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp_micros as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

/// Lower bound for a range scan over every key of `owner`.
pub(crate) fn make_prefix(owner: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(owner.len() + 1);
    prefix.extend_from_slice(owner.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a range scan over every key of `owner`.
pub(crate) fn make_prefix_end(owner: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(owner.len() + 1 + 20);
    end.extend_from_slice(owner.as_bytes());
    end.push(b'|');
    end.extend_from_slice(&[0xFF; 20]);
    end
}

/// Exclusive upper bound for a `&str` range over keys starting with `prefix|`.
pub(crate) fn str_prefix_end(prefix: &str) -> String {
    // '}' sorts immediately after '|'
    format!("{prefix}}}")
}

// =============================================================================
// Store
// =============================================================================

/// Shared handle to the embedded database.
///
/// Cheap to clone; all repositories hold one.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    timeout: Duration,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path, timeout: Duration) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(PRINCIPAL_SESSIONS)?;
            let _ = write_txn.open_table(PRINCIPALS)?;
            let _ = write_txn.open_table(PRINCIPAL_EMAIL_INDEX)?;
            let _ = write_txn.open_table(PRINCIPAL_USERNAME_INDEX)?;
            let _ = write_txn.open_table(PRINCIPAL_HANDLE_INDEX)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(PRINCIPAL_TX_INDEX)?;
            let _ = write_txn.open_table(PENDING_TX_INDEX)?;
            let _ = write_txn.open_table(TX_HASH_INDEX)?;
            let _ = write_txn.open_table(NOTIFICATIONS)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Opened database");

        Ok(Self {
            db: Arc::new(db),
            timeout,
        })
    }

    /// Run a blocking database closure on the blocking pool, bounded by the
    /// store timeout.
    ///
    /// `op` names the call in logs and in the timeout error.
    pub async fn run<T, E, F>(&self, op: &'static str, f: F) -> Result<T, E>
    where
        F: FnOnce(&Database) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let task = tokio::task::spawn_blocking(move || f(&db));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                tracing::error!(op, error = %join_err, "Store task panicked or was cancelled");
                Err(StorageError::Task(join_err.to_string()).into())
            }
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(StorageError::Timeout(op).into())
            }
        }
    }

    /// Cheap liveness probe used by the readiness endpoint.
    pub async fn ping(&self) -> StorageResult<()> {
        self.run("ping", |db| {
            let read_txn = db.begin_read()?;
            let _ = read_txn.open_table(SESSIONS)?;
            Ok(())
        })
        .await
    }
}
