// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted in-app notifications, newest first per principal.

use chrono::{DateTime, Utc};
use redb::ReadableDatabase;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{make_index_key, make_prefix, make_prefix_end, StorageResult, Store, NOTIFICATIONS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: String,
    pub principal_id: String,
    /// e.g. `transaction`, `security`
    pub category: String,
    /// e.g. `debit`, `credit`, `status`
    pub subcategory: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct NotificationRepository {
    store: Store,
}

impl NotificationRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn insert(&self, notification: Notification) -> StorageResult<()> {
        self.store
            .run("notifications.insert", move |db| {
                let key = make_index_key(
                    &notification.principal_id,
                    notification.created_at.timestamp_micros(),
                    &notification.id,
                );
                let json = serde_json::to_vec(&notification)?;
                let write_txn = db.begin_write()?;
                {
                    let mut table = write_txn.open_table(NOTIFICATIONS)?;
                    table.insert(key.as_slice(), json.as_slice())?;
                }
                write_txn.commit()?;
                Ok(())
            })
            .await
    }

    /// Most recent notifications for a principal, up to `limit`.
    pub async fn list_for(&self, principal_id: &str, limit: usize) -> StorageResult<Vec<Notification>> {
        let prefix = make_prefix(principal_id);
        let prefix_end = make_prefix_end(principal_id);
        self.store
            .run("notifications.list_for", move |db| {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(NOTIFICATIONS)?;
                let mut results = Vec::new();
                for entry in table.range(prefix.as_slice()..prefix_end.as_slice())? {
                    let (_, value) = entry?;
                    results.push(serde_json::from_slice(value.value())?);
                    if results.len() >= limit {
                        break;
                    }
                }
                Ok(results)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_store;

    fn notification(principal: &str, title: &str, offset_secs: i64) -> Notification {
        Notification {
            id: uuid::Uuid::new_v4().to_string(),
            principal_id: principal.to_string(),
            category: "transaction".to_string(),
            subcategory: "credit".to_string(),
            title: title.to_string(),
            message: "You received 1 bitcoin".to_string(),
            created_at: Utc::now() + chrono::Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_and_scoped_to_principal() {
        let (store, _dir) = temp_store();
        let repo = NotificationRepository::new(store);

        repo.insert(notification("p1", "old", 0)).await.unwrap();
        repo.insert(notification("p1", "new", 10)).await.unwrap();
        repo.insert(notification("p2", "other", 5)).await.unwrap();

        let listed = repo.list_for("p1", 10).await.unwrap();
        let titles: Vec<_> = listed.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "old"]);

        let limited = repo.list_for("p1", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].title, "new");
    }
}
