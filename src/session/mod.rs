// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Registry
//!
//! Server-side session state backing every access token.
//!
//! ## Invariant
//!
//! At most one live session per principal. `create` evicts whatever session
//! the principal pointer references and installs the new one in the same
//! write transaction. Two concurrent logins serialize on the store's write
//! lock: the later commit wins, and the loser's token is rejected by the
//! auth gate with `SessionExpired` on its first use.
//!
//! ## Expiry
//!
//! Every record carries an absolute `expires_at` fixed at creation.
//! `touch` refreshes `last_seen` only. Expired records read as absent and
//! are physically removed by the [`sweeper`].

pub mod sweeper;

use std::time::Duration;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::geo::GeoLocation;
use crate::storage::{StorageResult, Store, PRINCIPAL_SESSIONS, SESSIONS};

pub use sweeper::SessionSweeper;

/// Context captured at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionMetadata {
    pub ip: Option<String>,
    pub device: Option<String>,
    pub location: Option<GeoLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub principal_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub metadata: SessionMetadata,
}

impl SessionRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Value of the `principal_sessions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionPointer {
    session_id: String,
    expires_at: DateTime<Utc>,
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Store,
}

impl SessionRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Install a new session for `principal_id`, evicting any prior one.
    pub async fn create(
        &self,
        principal_id: &str,
        session_id: &str,
        metadata: SessionMetadata,
        ttl: Duration,
    ) -> StorageResult<SessionRecord> {
        let now = Utc::now();
        let record = SessionRecord {
            session_id: session_id.to_string(),
            principal_id: principal_id.to_string(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(ttl.as_secs() as i64),
            last_seen: now,
            metadata,
        };

        let stored = record.clone();
        let evicted = self
            .store
            .run("sessions.create", move |db| {
                let pointer = SessionPointer {
                    session_id: stored.session_id.clone(),
                    expires_at: stored.expires_at,
                };
                let record_json = serde_json::to_vec(&stored)?;
                let pointer_json = serde_json::to_vec(&pointer)?;

                let write_txn = db.begin_write()?;
                let evicted = {
                    let mut sessions = write_txn.open_table(SESSIONS)?;
                    let mut pointers = write_txn.open_table(PRINCIPAL_SESSIONS)?;

                    let prior = match pointers.get(stored.principal_id.as_str())? {
                        Some(value) => Some(decode::<SessionPointer>(value.value())?.session_id),
                        None => None,
                    };
                    let evicted = match prior {
                        Some(prior_id) if prior_id != stored.session_id => {
                            sessions.remove(prior_id.as_str())?;
                            Some(prior_id)
                        }
                        _ => None,
                    };

                    sessions.insert(stored.session_id.as_str(), record_json.as_slice())?;
                    pointers.insert(stored.principal_id.as_str(), pointer_json.as_slice())?;
                    evicted
                };
                write_txn.commit()?;
                Ok::<_, crate::storage::StorageError>(evicted)
            })
            .await?;

        if evicted.is_some() {
            tracing::info!(principal_id, "Prior session evicted by new login");
        }
        tracing::debug!(principal_id, expires_at = %record.expires_at, "Session created");
        Ok(record)
    }

    /// Read a live session. Never mutates state.
    pub async fn get(&self, session_id: &str) -> StorageResult<Option<SessionRecord>> {
        let session_id = session_id.to_string();
        self.store
            .run("sessions.get", move |db| {
                let read_txn = db.begin_read()?;
                let sessions = read_txn.open_table(SESSIONS)?;
                let record = match sessions.get(session_id.as_str())? {
                    Some(value) => decode::<SessionRecord>(value.value())?,
                    None => return Ok(None),
                };
                Ok(record.is_live(Utc::now()).then_some(record))
            })
            .await
    }

    /// Refresh `last_seen`. The absolute expiry is left untouched.
    ///
    /// Returns `false` when the session is gone or expired.
    pub async fn touch(&self, session_id: &str) -> StorageResult<bool> {
        let session_id = session_id.to_string();
        self.store
            .run("sessions.touch", move |db| {
                let now = Utc::now();
                let write_txn = db.begin_write()?;
                let touched = {
                    let mut sessions = write_txn.open_table(SESSIONS)?;
                    let existing = match sessions.get(session_id.as_str())? {
                        Some(value) => Some(decode::<SessionRecord>(value.value())?),
                        None => None,
                    };
                    match existing {
                        Some(mut record) if record.is_live(now) => {
                            record.last_seen = now;
                            let json = serde_json::to_vec(&record)?;
                            sessions.insert(session_id.as_str(), json.as_slice())?;
                            true
                        }
                        _ => false,
                    }
                };
                write_txn.commit()?;
                Ok(touched)
            })
            .await
    }

    /// Delete a session. When `principal_id` is given, also clear the
    /// principal pointer if it still references this session.
    pub async fn revoke(&self, session_id: &str, principal_id: Option<&str>) -> StorageResult<()> {
        let session_id = session_id.to_string();
        let principal_id = principal_id.map(str::to_string);
        self.store
            .run("sessions.revoke", move |db| {
                let write_txn = db.begin_write()?;
                {
                    let mut sessions = write_txn.open_table(SESSIONS)?;
                    sessions.remove(session_id.as_str())?;

                    if let Some(principal_id) = principal_id {
                        let mut pointers = write_txn.open_table(PRINCIPAL_SESSIONS)?;
                        let current = match pointers.get(principal_id.as_str())? {
                            Some(value) => Some(decode::<SessionPointer>(value.value())?),
                            None => None,
                        };
                        if current.is_some_and(|p| p.session_id == session_id) {
                            pointers.remove(principal_id.as_str())?;
                        }
                    }
                }
                write_txn.commit()?;
                Ok(())
            })
            .await
    }

    /// The principal's current live session, if any.
    ///
    /// A pointer whose target is missing or expired is deleted on sight.
    /// Only used for the "logged out elsewhere" notice, never to authorize.
    pub async fn has_active(&self, principal_id: &str) -> StorageResult<Option<SessionRecord>> {
        let principal_id = principal_id.to_string();
        self.store
            .run("sessions.has_active", move |db| {
                let now = Utc::now();
                let (pointer, live) = {
                    let read_txn = db.begin_read()?;
                    let pointers = read_txn.open_table(PRINCIPAL_SESSIONS)?;
                    let pointer = match pointers.get(principal_id.as_str())? {
                        Some(value) => decode::<SessionPointer>(value.value())?,
                        None => return Ok(None),
                    };
                    let sessions = read_txn.open_table(SESSIONS)?;
                    let live = match sessions.get(pointer.session_id.as_str())? {
                        Some(value) => Some(decode::<SessionRecord>(value.value())?),
                        None => None,
                    }
                    .filter(|record| record.is_live(now));
                    (pointer, live)
                };

                if live.is_some() {
                    return Ok(live);
                }

                // Dangling pointer: clear it unless a newer login replaced it meanwhile
                let write_txn = db.begin_write()?;
                {
                    let mut pointers = write_txn.open_table(PRINCIPAL_SESSIONS)?;
                    let current = match pointers.get(principal_id.as_str())? {
                        Some(value) => Some(decode::<SessionPointer>(value.value())?),
                        None => None,
                    };
                    if current.as_ref() == Some(&pointer) {
                        pointers.remove(principal_id.as_str())?;
                    }
                }
                write_txn.commit()?;
                tracing::debug!(principal_id = %principal_id, "Cleared dangling session pointer");
                Ok(None)
            })
            .await
    }

    /// Remove expired sessions and expired or dangling pointers.
    ///
    /// Returns the number of session records removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        self.store
            .run("sessions.purge_expired", move |db| {
                let write_txn = db.begin_write()?;
                let removed = {
                    let mut sessions = write_txn.open_table(SESSIONS)?;
                    let mut pointers = write_txn.open_table(PRINCIPAL_SESSIONS)?;

                    let mut expired = Vec::new();
                    for entry in sessions.iter()? {
                        let (key, value) = entry?;
                        let record = decode::<SessionRecord>(value.value())?;
                        if !record.is_live(now) {
                            expired.push(key.value().to_string());
                        }
                    }
                    for session_id in &expired {
                        sessions.remove(session_id.as_str())?;
                    }

                    let mut stale_pointers = Vec::new();
                    for entry in pointers.iter()? {
                        let (key, value) = entry?;
                        let pointer = decode::<SessionPointer>(value.value())?;
                        let dangling = sessions.get(pointer.session_id.as_str())?.is_none();
                        if pointer.expires_at <= now || dangling {
                            stale_pointers.push(key.value().to_string());
                        }
                    }
                    for principal_id in &stale_pointers {
                        pointers.remove(principal_id.as_str())?;
                    }

                    expired.len()
                };
                write_txn.commit()?;
                Ok(removed)
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::test_support::temp_store;

    const TTL: Duration = Duration::from_secs(3600);

    pub(crate) fn registry() -> (SessionRegistry, tempfile::TempDir) {
        let (store, dir) = temp_store();
        (SessionRegistry::new(store), dir)
    }

    fn metadata() -> SessionMetadata {
        SessionMetadata {
            ip: Some("203.0.113.7".to_string()),
            device: Some("Firefox on Linux".to_string()),
            location: Some(GeoLocation::unknown()),
        }
    }

    #[tokio::test]
    async fn sequential_logins_leave_exactly_one_live_session() {
        let (registry, _dir) = registry();
        let ids: Vec<String> = (0..5).map(|i| format!("sess-{i}")).collect();

        for id in &ids {
            registry.create("p1", id, metadata(), TTL).await.unwrap();
        }

        for id in &ids[..4] {
            assert!(registry.get(id).await.unwrap().is_none(), "{id} should be evicted");
        }
        let live = registry.get("sess-4").await.unwrap().unwrap();
        assert_eq!(live.principal_id, "p1");
        assert_eq!(
            registry.has_active("p1").await.unwrap().map(|r| r.session_id),
            Some("sess-4".to_string())
        );
    }

    #[tokio::test]
    async fn sessions_of_different_principals_are_independent() {
        let (registry, _dir) = registry();
        registry.create("p1", "a", metadata(), TTL).await.unwrap();
        registry.create("p2", "b", metadata(), TTL).await.unwrap();

        assert!(registry.get("a").await.unwrap().is_some());
        assert!(registry.get("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn get_is_idempotent_and_read_only() {
        let (registry, _dir) = registry();
        registry.create("p1", "sess", metadata(), TTL).await.unwrap();

        let first = registry.get("sess").await.unwrap();
        let second = registry.get("sess").await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[tokio::test]
    async fn touch_updates_last_seen_but_not_expiry() {
        let (registry, _dir) = registry();
        let created = registry.create("p1", "sess", metadata(), TTL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.touch("sess").await.unwrap());

        let after = registry.get("sess").await.unwrap().unwrap();
        assert!(after.last_seen > created.last_seen);
        assert_eq!(after.expires_at, created.expires_at);
        assert_eq!(after.issued_at, created.issued_at);

        assert!(!registry.touch("missing").await.unwrap());
    }

    #[tokio::test]
    async fn expired_session_reads_as_absent() {
        let (registry, _dir) = registry();
        registry
            .create("p1", "sess", metadata(), Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(registry.get("sess").await.unwrap().is_none());
        assert!(!registry.touch("sess").await.unwrap());
        assert!(registry.has_active("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_clears_pointer_only_for_same_session() {
        let (registry, _dir) = registry();
        registry.create("p1", "old", metadata(), TTL).await.unwrap();
        registry.create("p1", "new", metadata(), TTL).await.unwrap();

        // Stale logout from the superseded device
        registry.revoke("old", Some("p1")).await.unwrap();
        assert!(registry.has_active("p1").await.unwrap().is_some());

        registry.revoke("new", Some("p1")).await.unwrap();
        assert!(registry.get("new").await.unwrap().is_none());
        assert!(registry.has_active("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn has_active_self_heals_dangling_pointer() {
        let (registry, _dir) = registry();
        registry.create("p1", "sess", metadata(), TTL).await.unwrap();

        // Remove the record but leave the pointer behind
        registry.revoke("sess", None).await.unwrap();
        assert!(registry.has_active("p1").await.unwrap().is_none());

        // Pointer is gone: a new session is installed without eviction noise
        registry.create("p1", "next", metadata(), TTL).await.unwrap();
        assert!(registry.get("next").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_sessions() {
        let (registry, _dir) = registry();
        registry
            .create("p1", "short", metadata(), Duration::from_secs(60))
            .await
            .unwrap();
        registry.create("p2", "long", metadata(), TTL).await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(120);
        let removed = registry.purge_expired(later).await.unwrap();
        assert_eq!(removed, 1);

        assert!(registry.get("long").await.unwrap().is_some());
        assert!(registry.has_active("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_logins_produce_single_winner() {
        let (registry, _dir) = registry();
        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .create("p1", &format!("race-{i}"), SessionMetadata::default(), TTL)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut live = 0;
        for i in 0..8 {
            if registry.get(&format!("race-{i}")).await.unwrap().is_some() {
                live += 1;
            }
        }
        assert_eq!(live, 1);
    }
}
