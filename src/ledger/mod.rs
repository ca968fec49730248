// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Ledger
//!
//! Append-only transfer records with per-principal single-flight
//! submission and receiver-side mirroring of internal transfers.
//!
//! ## Atomicity
//!
//! A submission runs in one redb write transaction:
//!
//! 1. Scan `pending_tx_index` for the submitter. Any entry rejects the
//!    submission with [`LedgerError::PendingTransactionExists`].
//! 2. Insert the sender record, and for an internal `sent` the mirrored
//!    `received` record for the counterparty, with all index entries.
//!
//! redb serializes write transactions, so the pending check and the insert
//! cannot interleave with a concurrent submission, and the mirror is never
//! observed without its sender record.
//!
//! Notifications and email are queued only after commit.
//!
//! Only the submitter's record occupies the pending guard. Settlement
//! moves a transfer and its mirror together.

pub mod amount;
pub mod balance;
pub mod hash;
pub mod types;

use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use utoipa::ToSchema;

pub use amount::{Amount, AmountError};
pub use balance::{fold_balances, Balances};
pub use types::{
    Asset, NewTransaction, StatusOutcome, SwapInput, SwapLegs, Transaction, TxKind, TxStatus,
};

use crate::notify::Notifier;
use crate::storage::{
    make_index_key, make_prefix, make_prefix_end, str_prefix_end, PrincipalError,
    PrincipalRepository, StorageError, Store, PENDING_TX_INDEX, PRINCIPAL_TX_INDEX,
    TRANSACTIONS, TX_HASH_INDEX,
};

/// Largest page size accepted by listings.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("account not found")]
    UnknownPrincipal,

    #[error("receiver account not found")]
    CounterpartyNotFound,

    #[error("account is suspended")]
    AccountSuspended,

    #[error("you have a pending transaction")]
    PendingTransactionExists,

    #[error("transaction not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Principal(#[from] PrincipalError),
}

impl LedgerError {
    fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Validated offset pagination (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> LedgerResult<Self> {
        if page == 0 || page_size == 0 {
            return Err(LedgerError::validation("page and pageSize must be positive integers"));
        }
        if page_size > MAX_PAGE_SIZE {
            return Err(LedgerError::validation(format!(
                "pageSize must not exceed {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, page_size })
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

/// Sender record plus the optional receiver mirror.
struct Submission {
    primary: Transaction,
    mirror: Option<Transaction>,
}

#[derive(Clone)]
pub struct TransactionLedger {
    store: Store,
    principals: PrincipalRepository,
    notifier: Notifier,
}

impl TransactionLedger {
    pub fn new(store: Store, principals: PrincipalRepository, notifier: Notifier) -> Self {
        Self {
            store,
            principals,
            notifier,
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit a transaction on behalf of its owner.
    ///
    /// Suspension is checked before the pending guard, so a suspended
    /// principal always sees [`LedgerError::AccountSuspended`].
    pub async fn create_transaction(&self, input: NewTransaction) -> LedgerResult<Transaction> {
        let submitter = self
            .principals
            .find_by_id(&input.principal_id)
            .await?
            .ok_or(LedgerError::UnknownPrincipal)?;
        if submitter.is_suspended {
            return Err(LedgerError::AccountSuspended);
        }

        let submission = self.build(input, TxStatus::Pending).await?;
        let submission = self.persist(submission, true).await?;

        tracing::info!(
            tx_id = %submission.primary.id,
            principal_id = %submission.primary.principal_id,
            kind = submission.primary.kind.as_str(),
            asset = submission.primary.asset.as_str(),
            mirrored = submission.mirror.is_some(),
            "Transaction submitted"
        );
        self.announce(&submission).await;
        Ok(submission.primary)
    }

    /// Record a transaction for a user with an explicit status.
    ///
    /// Administrative path: skips the suspension gate and the single-flight
    /// guard. Internal `sent` records are still mirrored.
    pub async fn admin_create(&self, input: NewTransaction, status: TxStatus) -> LedgerResult<Transaction> {
        if self.principals.find_by_id(&input.principal_id).await?.is_none() {
            return Err(LedgerError::UnknownPrincipal);
        }

        let submission = self.build(input, status).await?;
        let submission = self.persist(submission, false).await?;

        tracing::info!(
            tx_id = %submission.primary.id,
            principal_id = %submission.primary.principal_id,
            status = ?status,
            "Transaction recorded by administrator"
        );
        self.announce(&submission).await;
        Ok(submission.primary)
    }

    /// Validate input and assemble the records to persist.
    async fn build(&self, input: NewTransaction, status: TxStatus) -> LedgerResult<Submission> {
        let now = Utc::now();
        let mut primary = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            principal_id: input.principal_id.clone(),
            counterparty_id: None,
            kind: input.kind,
            asset: Asset::Bitcoin,
            amount: Amount::ZERO,
            swap: None,
            network: non_empty(input.network),
            wallet_address: non_empty(input.wallet_address),
            tx_hash: String::new(),
            status,
            created_at: now,
            updated_at: now,
        };

        match input.kind {
            TxKind::Swap => {
                let legs = validate_swap(input.swap.unwrap_or_default())?;
                primary.asset = legs.to_asset;
                primary.amount = legs.to_amount;
                primary.swap = Some(legs);
            }
            TxKind::Sent | TxKind::Received => {
                primary.asset = input
                    .asset
                    .ok_or_else(|| LedgerError::validation("coin is required"))?;
                primary.amount = positive(input.amount, "amount")?;
            }
        }

        let handle = non_empty(input.counterparty_handle);
        let counterparty = match (input.kind, handle) {
            (TxKind::Sent, Some(handle)) => {
                let receiver = self
                    .principals
                    .find_by_handle(&handle)
                    .await?
                    .ok_or(LedgerError::CounterpartyNotFound)?;
                if receiver.id == primary.principal_id {
                    return Err(LedgerError::validation("cannot send to your own account"));
                }
                Some(receiver.id)
            }
            (TxKind::Sent, None) if primary.wallet_address.is_none() => {
                return Err(LedgerError::validation(
                    "a receiver accountId or walletAddress is required",
                ));
            }
            _ => None,
        };
        primary.counterparty_id = counterparty.clone();
        primary.tx_hash = hash::transaction_hash(&primary);

        let mirror = counterparty.map(|receiver_id| Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            principal_id: receiver_id,
            counterparty_id: Some(primary.principal_id.clone()),
            kind: TxKind::Received,
            swap: None,
            ..primary.clone()
        });

        Ok(Submission { primary, mirror })
    }

    /// Write the submission atomically, optionally behind the pending guard.
    async fn persist(&self, submission: Submission, guarded: bool) -> LedgerResult<Submission> {
        self.store
            .run("ledger.persist", move |db| -> Result<LedgerResult<Submission>, StorageError> {
                let write_txn = db.begin_write()?;
                {
                    if guarded && has_pending_in(&write_txn, &submission.primary.principal_id)? {
                        return Ok(Err(LedgerError::PendingTransactionExists));
                    }
                    insert_record(&write_txn, &submission.primary, true)?;
                    if let Some(mirror) = &submission.mirror {
                        insert_record(&write_txn, mirror, false)?;
                    }
                }
                write_txn.commit()?;
                Ok(Ok(submission))
            })
            .await?
    }

    /// Queue notifications and emails for a committed submission.
    async fn announce(&self, submission: &Submission) {
        let tx = &submission.primary;
        let coin = tx.asset.display_name();
        let (subcategory, message) = match (&tx.kind, &tx.swap) {
            (TxKind::Swap, Some(legs)) => (
                "swap",
                format!(
                    "You swapped {} {} for {} {}",
                    legs.from_amount,
                    legs.from_asset.display_name(),
                    legs.to_amount,
                    legs.to_asset.display_name()
                ),
            ),
            (TxKind::Received, _) => ("credit", format!("You received {} {coin}", tx.amount)),
            _ => ("debit", format!("You {} {} {coin}", tx.kind.as_str(), tx.amount)),
        };
        let title = format!("{coin} {}", tx.kind.as_str());
        self.notifier
            .emit(&tx.principal_id, "transaction", subcategory, title.clone(), message.clone());
        self.email_principal(&tx.principal_id, &title, &message).await;

        if let Some(mirror) = &submission.mirror {
            let message = format!("You received {} {coin}", mirror.amount);
            let title = format!("{coin} received");
            self.notifier
                .emit(&mirror.principal_id, "transaction", "credit", title.clone(), message.clone());
            self.email_principal(&mirror.principal_id, &title, &message).await;
        }
    }

    async fn email_principal(&self, principal_id: &str, subject: &str, message: &str) {
        match self.principals.find_by_id(principal_id).await {
            Ok(Some(principal)) => {
                self.notifier
                    .send_email(&principal.email, subject, format!("<p>{message}</p>"));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(principal_id, error = %e, "Skipping email: principal lookup failed");
            }
        }
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Move a pending transaction to `successful` or `failed`.
    ///
    /// Any other transition leaves the record unchanged and reports
    /// `success: false`. An internal transfer settles as a unit: the
    /// sender record and its mirror (same `tx_hash`) move together in one
    /// write transaction, whichever of the two is addressed.
    pub async fn update_status(&self, id: &str, new_status: TxStatus) -> LedgerResult<StatusOutcome> {
        if new_status == TxStatus::Pending {
            return Ok(StatusOutcome::rejected(
                "status can only be changed to successful or failed",
            ));
        }

        let id_owned = id.to_string();
        let (outcome, settled) = self
            .store
            .run("ledger.update_status", move |db| -> Result<LedgerResult<(StatusOutcome, Vec<Transaction>)>, StorageError> {
                let write_txn = db.begin_write()?;
                let result = {
                    let mut table = write_txn.open_table(TRANSACTIONS)?;
                    let existing = match table.get(id_owned.as_str())? {
                        Some(value) => serde_json::from_slice::<Transaction>(value.value())?,
                        None => return Ok(Err(LedgerError::NotFound)),
                    };

                    if existing.status.is_terminal() {
                        let reason = format!("transaction is already {}", existing.status.as_str());
                        (StatusOutcome::rejected(reason), Vec::new())
                    } else {
                        let mut linked = vec![existing.clone()];
                        let hashes = write_txn.open_table(TX_HASH_INDEX)?;
                        let start = format!("{}|", existing.tx_hash);
                        let end = str_prefix_end(&existing.tx_hash);
                        for entry in hashes.range(start.as_str()..end.as_str())? {
                            let (key, _) = entry?;
                            let Some((_, sibling_id)) = key.value().split_once('|') else {
                                continue;
                            };
                            if sibling_id == existing.id {
                                continue;
                            }
                            if let Some(value) = table.get(sibling_id)? {
                                let sibling = serde_json::from_slice::<Transaction>(value.value())?;
                                if !sibling.status.is_terminal() {
                                    linked.push(sibling);
                                }
                            }
                        }

                        let now = Utc::now();
                        let mut pending = write_txn.open_table(PENDING_TX_INDEX)?;
                        let mut settled = Vec::with_capacity(linked.len());
                        for mut tx in linked {
                            tx.status = new_status;
                            tx.updated_at = now;
                            let json = serde_json::to_vec(&tx)?;
                            table.insert(tx.id.as_str(), json.as_slice())?;
                            pending.remove(pending_key(&tx.principal_id, &tx.id).as_str())?;
                            settled.push(tx);
                        }
                        (StatusOutcome::ok("transaction status updated"), settled)
                    }
                };
                write_txn.commit()?;
                Ok(Ok(result))
            })
            .await??;

        for tx in settled {
            tracing::info!(tx_id = %tx.id, tx_hash = %tx.tx_hash, status = ?tx.status, "Transaction settled");
            let message = format!(
                "Your {} {} of {} is now {}",
                tx.asset.display_name(),
                tx.kind.as_str(),
                tx.amount,
                tx.status.as_str()
            );
            self.notifier
                .emit(&tx.principal_id, "transaction", "status", "Transaction update", message.clone());
            self.email_principal(&tx.principal_id, "Transaction update", &message).await;
        }
        Ok(outcome)
    }

    /// Remove a transaction and its index entries.
    pub async fn delete_by_id(&self, id: &str) -> LedgerResult<Transaction> {
        let id = id.to_string();
        let removed = self
            .store
            .run("ledger.delete_by_id", move |db| -> Result<LedgerResult<Transaction>, StorageError> {
                let write_txn = db.begin_write()?;
                let removed = {
                    let mut table = write_txn.open_table(TRANSACTIONS)?;
                    let tx = match table.remove(id.as_str())? {
                        Some(value) => serde_json::from_slice::<Transaction>(value.value())?,
                        None => return Ok(Err(LedgerError::NotFound)),
                    };

                    let mut index = write_txn.open_table(PRINCIPAL_TX_INDEX)?;
                    let key = make_index_key(&tx.principal_id, tx.created_at.timestamp_micros(), &tx.id);
                    index.remove(key.as_slice())?;

                    let mut pending = write_txn.open_table(PENDING_TX_INDEX)?;
                    pending.remove(pending_key(&tx.principal_id, &tx.id).as_str())?;

                    let mut hashes = write_txn.open_table(TX_HASH_INDEX)?;
                    hashes.remove(hash_key(&tx.tx_hash, &tx.id).as_str())?;
                    tx
                };
                write_txn.commit()?;
                Ok(Ok(removed))
            })
            .await??;

        tracing::info!(tx_id = %removed.id, principal_id = %removed.principal_id, "Transaction deleted");
        Ok(removed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<Transaction>> {
        let id = id.to_string();
        Ok(self
            .store
            .run("ledger.get_by_id", move |db| {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(TRANSACTIONS)?;
                match table.get(id.as_str())? {
                    Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
                    None => Ok::<_, StorageError>(None),
                }
            })
            .await?)
    }

    /// Whether the principal has an unsettled transaction.
    pub async fn has_pending(&self, principal_id: &str) -> LedgerResult<bool> {
        let principal_id = principal_id.to_string();
        Ok(self
            .store
            .run("ledger.has_pending", move |db| {
                let read_txn = db.begin_read()?;
                let pending = read_txn.open_table(PENDING_TX_INDEX)?;
                let start = format!("{principal_id}|");
                let end = str_prefix_end(&principal_id);
                let mut range = pending.range(start.as_str()..end.as_str())?;
                let found = range.next().transpose()?.is_some();
                Ok::<_, StorageError>(found)
            })
            .await?)
    }

    /// One page of a principal's transactions, newest first.
    pub async fn list_by_principal(
        &self,
        principal_id: &str,
        page: PageRequest,
        kind: Option<TxKind>,
    ) -> LedgerResult<TransactionPage> {
        let principal_id = principal_id.to_string();
        let (items, total) = self
            .store
            .run("ledger.list_by_principal", move |db| {
                let read_txn = db.begin_read()?;
                let index = read_txn.open_table(PRINCIPAL_TX_INDEX)?;
                let table = read_txn.open_table(TRANSACTIONS)?;

                let prefix = make_prefix(&principal_id);
                let prefix_end = make_prefix_end(&principal_id);

                let mut total = 0usize;
                let mut items = Vec::with_capacity(page.page_size);
                for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
                    let (key, entry_kind) = entry?;
                    if let Some(kind) = kind {
                        if entry_kind.value() != kind.as_str() {
                            continue;
                        }
                    }
                    total += 1;
                    if total <= page.offset() || items.len() >= page.page_size {
                        continue;
                    }
                    let Some(tx_id) = id_from_index_key(key.value()) else {
                        continue;
                    };
                    if let Some(value) = table.get(tx_id.as_str())? {
                        items.push(serde_json::from_slice::<Transaction>(value.value())?);
                    }
                }
                Ok::<_, StorageError>((items, total))
            })
            .await?;

        Ok(TransactionPage {
            items,
            page: page.page,
            page_size: page.page_size,
            total,
        })
    }

    /// The `n` most recent transactions of a principal.
    pub async fn recent(&self, principal_id: &str, n: usize) -> LedgerResult<Vec<Transaction>> {
        let page = PageRequest::new(1, n.clamp(1, MAX_PAGE_SIZE))?;
        Ok(self.list_by_principal(principal_id, page, None).await?.items)
    }

    /// Every transaction of a principal in one asset, newest first.
    pub async fn list_by_principal_and_asset(
        &self,
        principal_id: &str,
        asset: Asset,
    ) -> LedgerResult<Vec<Transaction>> {
        let all = self.load_all_for(principal_id).await?;
        Ok(all
            .into_iter()
            .filter(|tx| tx.asset == asset || tx.swap.as_ref().is_some_and(|s| s.from_asset == asset))
            .collect())
    }

    /// Every transaction on the platform, newest first.
    pub async fn list_all(&self, page: PageRequest, kind: Option<TxKind>) -> LedgerResult<TransactionPage> {
        let mut all: Vec<Transaction> = self
            .store
            .run("ledger.list_all", |db| {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(TRANSACTIONS)?;
                let mut all = Vec::new();
                for entry in table.iter()? {
                    let (_, value) = entry?;
                    all.push(serde_json::from_slice::<Transaction>(value.value())?);
                }
                Ok::<_, StorageError>(all)
            })
            .await?;

        if let Some(kind) = kind {
            all.retain(|tx| tx.kind == kind);
        }
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = all.len();
        let items = all
            .into_iter()
            .skip(page.offset())
            .take(page.page_size)
            .collect();
        Ok(TransactionPage {
            items,
            page: page.page,
            page_size: page.page_size,
            total,
        })
    }

    /// Records sharing a transaction hash (a transfer and its mirror).
    pub async fn find_by_hash(&self, tx_hash: &str) -> LedgerResult<Vec<Transaction>> {
        let tx_hash = tx_hash.to_string();
        Ok(self
            .store
            .run("ledger.find_by_hash", move |db| {
                let read_txn = db.begin_read()?;
                let hashes = read_txn.open_table(TX_HASH_INDEX)?;
                let table = read_txn.open_table(TRANSACTIONS)?;
                let start = format!("{tx_hash}|");
                let end = str_prefix_end(&tx_hash);

                let mut results = Vec::new();
                for entry in hashes.range(start.as_str()..end.as_str())? {
                    let (key, _) = entry?;
                    let Some((_, tx_id)) = key.value().split_once('|') else {
                        continue;
                    };
                    if let Some(value) = table.get(tx_id)? {
                        results.push(serde_json::from_slice::<Transaction>(value.value())?);
                    }
                }
                Ok::<_, StorageError>(results)
            })
            .await?)
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Per-asset balances, recomputed from history on every call.
    pub async fn balances_of(&self, principal_id: &str) -> LedgerResult<Balances> {
        let history = self.load_all_for(principal_id).await?;
        Ok(fold_balances(&history))
    }

    async fn load_all_for(&self, principal_id: &str) -> LedgerResult<Vec<Transaction>> {
        let principal_id = principal_id.to_string();
        Ok(self
            .store
            .run("ledger.load_all_for", move |db| {
                let read_txn = db.begin_read()?;
                let index = read_txn.open_table(PRINCIPAL_TX_INDEX)?;
                let table = read_txn.open_table(TRANSACTIONS)?;
                let prefix = make_prefix(&principal_id);
                let prefix_end = make_prefix_end(&principal_id);

                let mut results = Vec::new();
                for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
                    let (key, _) = entry?;
                    let Some(tx_id) = id_from_index_key(key.value()) else {
                        continue;
                    };
                    if let Some(value) = table.get(tx_id.as_str())? {
                        results.push(serde_json::from_slice::<Transaction>(value.value())?);
                    }
                }
                Ok::<_, StorageError>(results)
            })
            .await?)
    }
}

// =============================================================================
// Write helpers (inside an open write transaction)
// =============================================================================

fn pending_key(principal_id: &str, tx_id: &str) -> String {
    format!("{principal_id}|{tx_id}")
}

fn hash_key(tx_hash: &str, tx_id: &str) -> String {
    format!("{tx_hash}|{tx_id}")
}

fn has_pending_in(write_txn: &WriteTransaction, principal_id: &str) -> Result<bool, StorageError> {
    let pending = write_txn.open_table(PENDING_TX_INDEX)?;
    let start = format!("{principal_id}|");
    let end = str_prefix_end(principal_id);
    let mut range = pending.range(start.as_str()..end.as_str())?;
    let found = range.next().transpose()?.is_some();
    Ok(found)
}

/// Insert a record and its indexes. Only the submitter's own record
/// (`single_flight`) occupies the pending guard; a mirror never does.
fn insert_record(write_txn: &WriteTransaction, tx: &Transaction, single_flight: bool) -> Result<(), StorageError> {
    let json = serde_json::to_vec(tx)?;
    let timestamp = tx.created_at.timestamp_micros();

    let mut table = write_txn.open_table(TRANSACTIONS)?;
    table.insert(tx.id.as_str(), json.as_slice())?;

    let mut index = write_txn.open_table(PRINCIPAL_TX_INDEX)?;
    let key = make_index_key(&tx.principal_id, timestamp, &tx.id);
    index.insert(key.as_slice(), tx.kind.as_str())?;

    if single_flight && tx.status == TxStatus::Pending {
        let mut pending = write_txn.open_table(PENDING_TX_INDEX)?;
        pending.insert(pending_key(&tx.principal_id, &tx.id).as_str(), timestamp)?;
    }

    let mut hashes = write_txn.open_table(TX_HASH_INDEX)?;
    hashes.insert(hash_key(&tx.tx_hash, &tx.id).as_str(), tx.principal_id.as_str())?;
    Ok(())
}

/// Extract the transaction id from `principal|ts(8 bytes)|id`.
fn id_from_index_key(key: &[u8]) -> Option<String> {
    let sep = key.iter().position(|b| *b == b'|')?;
    let id_start = sep + 1 + 8 + 1;
    key.get(id_start..)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .map(str::to_string)
}

// =============================================================================
// Validation
// =============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn positive(amount: Option<Amount>, field: &str) -> LedgerResult<Amount> {
    match amount {
        Some(a) if a.is_positive() => Ok(a),
        Some(_) => Err(LedgerError::validation(format!("{field} must be greater than zero"))),
        None => Err(LedgerError::validation(format!("{field} is required"))),
    }
}

fn validate_swap(input: SwapInput) -> LedgerResult<SwapLegs> {
    let (Some(from_asset), Some(to_asset)) = (input.from_asset, input.to_asset) else {
        return Err(LedgerError::validation("fromCoin and toCoin are required for a swap"));
    };
    if from_asset == to_asset {
        return Err(LedgerError::validation("fromCoin and toCoin must differ"));
    }
    Ok(SwapLegs {
        from_asset,
        to_asset,
        from_amount: positive(input.from_amount, "fromAmount")?,
        to_amount: positive(input.to_amount, "toAmount")?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::notify::Outbound;
    use crate::storage::principals::tests::new_user;
    use crate::storage::test_support::temp_store;
    use crate::storage::Principal;
    use tokio::sync::mpsc;

    pub(crate) struct Harness {
        pub ledger: TransactionLedger,
        pub principals: PrincipalRepository,
        pub outbox: mpsc::Receiver<Outbound>,
        pub alice: Principal,
        pub bob: Principal,
        _dir: tempfile::TempDir,
    }

    pub(crate) async fn harness() -> Harness {
        let (store, dir) = temp_store();
        let principals = PrincipalRepository::new(store.clone());
        let (notifier, outbox) = Notifier::channel(256);
        let ledger = TransactionLedger::new(store, principals.clone(), notifier);
        let alice = principals.create(new_user("alice@example.com", "alice")).await.unwrap();
        let bob = principals.create(new_user("bob@example.com", "bob")).await.unwrap();
        Harness {
            ledger,
            principals,
            outbox,
            alice,
            bob,
            _dir: dir,
        }
    }

    pub(crate) fn send(from: &Principal, to: &Principal, amount: &str) -> NewTransaction {
        NewTransaction {
            principal_id: from.id.clone(),
            kind: TxKind::Sent,
            asset: Some(Asset::Bitcoin),
            amount: Some(amount.parse().unwrap()),
            counterparty_handle: Some(to.account_handle.clone()),
            swap: None,
            network: None,
            wallet_address: None,
        }
    }

    fn swap(from: &Principal) -> NewTransaction {
        NewTransaction {
            principal_id: from.id.clone(),
            kind: TxKind::Swap,
            asset: None,
            amount: None,
            counterparty_handle: None,
            swap: Some(SwapInput {
                from_asset: Some(Asset::Bitcoin),
                to_asset: Some(Asset::Ethereum),
                from_amount: Some("1".parse().unwrap()),
                to_amount: Some("20".parse().unwrap()),
            }),
            network: None,
            wallet_address: None,
        }
    }

    #[tokio::test]
    async fn internal_send_is_mirrored_with_same_hash() {
        let h = harness().await;
        let sent = h.ledger.create_transaction(send(&h.alice, &h.bob, "0.5")).await.unwrap();

        assert_eq!(sent.kind, TxKind::Sent);
        assert_eq!(sent.status, TxStatus::Pending);
        assert_eq!(sent.counterparty_id.as_deref(), Some(h.bob.id.as_str()));

        let records = h.ledger.find_by_hash(&sent.tx_hash).await.unwrap();
        assert_eq!(records.len(), 2);
        let mirror = records.iter().find(|tx| tx.kind == TxKind::Received).unwrap();
        assert_eq!(mirror.principal_id, h.bob.id);
        assert_eq!(mirror.counterparty_id.as_deref(), Some(h.alice.id.as_str()));
        assert_eq!(mirror.asset, sent.asset);
        assert_eq!(mirror.amount, sent.amount);
        assert_eq!(mirror.tx_hash, sent.tx_hash);
        assert_ne!(mirror.id, sent.id);
    }

    #[tokio::test]
    async fn second_submission_while_pending_is_rejected_without_writing() {
        let h = harness().await;
        h.ledger.create_transaction(send(&h.alice, &h.bob, "0.5")).await.unwrap();
        assert!(h.ledger.has_pending(&h.alice.id).await.unwrap());

        let err = h.ledger.create_transaction(swap(&h.alice)).await.unwrap_err();
        assert!(matches!(err, LedgerError::PendingTransactionExists));

        let page = h
            .ledger
            .list_by_principal(&h.alice.id, PageRequest::new(1, 10).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn concurrent_submissions_admit_exactly_one() {
        let h = harness().await;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = h.ledger.clone();
            let input = swap(&h.alice);
            handles.push(tokio::spawn(async move { ledger.create_transaction(input).await }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(LedgerError::PendingTransactionExists) => {}
                Err(other) => panic!("unexpected error {other}"),
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn settling_frees_the_guard() {
        let h = harness().await;
        let tx = h.ledger.create_transaction(swap(&h.alice)).await.unwrap();

        let outcome = h.ledger.update_status(&tx.id, TxStatus::Successful).await.unwrap();
        assert!(outcome.success);
        assert!(!h.ledger.has_pending(&h.alice.id).await.unwrap());

        h.ledger.create_transaction(swap(&h.alice)).await.unwrap();
    }

    #[tokio::test]
    async fn suspended_principal_is_rejected_regardless_of_pending_state() {
        let h = harness().await;
        h.ledger.create_transaction(swap(&h.alice)).await.unwrap();

        h.principals.update(&h.alice.id, |p| p.suspend()).await.unwrap();

        let err = h.ledger.create_transaction(swap(&h.alice)).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountSuspended));

        h.principals.update(&h.bob.id, |p| p.suspend()).await.unwrap();
        let err = h.ledger.create_transaction(swap(&h.bob)).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountSuspended));
    }

    #[tokio::test]
    async fn status_transitions_only_from_pending() {
        let h = harness().await;
        let tx = h.ledger.create_transaction(swap(&h.alice)).await.unwrap();

        assert!(h.ledger.update_status(&tx.id, TxStatus::Failed).await.unwrap().success);
        let settled = h.ledger.get_by_id(&tx.id).await.unwrap().unwrap();

        for next in [TxStatus::Successful, TxStatus::Failed, TxStatus::Pending] {
            let outcome = h.ledger.update_status(&tx.id, next).await.unwrap();
            assert!(!outcome.success);
        }
        assert_eq!(h.ledger.get_by_id(&tx.id).await.unwrap().unwrap(), settled);

        let missing = h.ledger.update_status("nope", TxStatus::Successful).await;
        assert!(matches!(missing, Err(LedgerError::NotFound)));
    }

    #[tokio::test]
    async fn balances_reflect_only_successful_history() {
        let h = harness().await;

        let incoming = h
            .ledger
            .admin_create(send(&h.bob, &h.alice, "2"), TxStatus::Successful)
            .await
            .unwrap();
        assert_eq!(incoming.status, TxStatus::Successful);

        let outgoing = h.ledger.create_transaction(send(&h.alice, &h.bob, "0.5")).await.unwrap();
        let pending = h.ledger.balances_of(&h.alice.id).await.unwrap();
        assert_eq!(pending[&Asset::Bitcoin].to_string(), "2");

        h.ledger.update_status(&outgoing.id, TxStatus::Successful).await.unwrap();
        let balances = h.ledger.balances_of(&h.alice.id).await.unwrap();
        assert_eq!(balances[&Asset::Bitcoin].to_string(), "1.5");
    }

    #[tokio::test]
    async fn all_pending_history_yields_zero_balances() {
        let h = harness().await;
        h.ledger.create_transaction(send(&h.alice, &h.bob, "3")).await.unwrap();

        for balances in [
            h.ledger.balances_of(&h.alice.id).await.unwrap(),
            h.ledger.balances_of(&h.bob.id).await.unwrap(),
        ] {
            assert!(balances.values().all(|b| *b == Amount::ZERO));
        }
    }

    #[tokio::test]
    async fn validation_failures() {
        let h = harness().await;

        let mut to_self = send(&h.alice, &h.alice, "1");
        to_self.counterparty_handle = Some(h.alice.account_handle.clone());
        assert!(matches!(
            h.ledger.create_transaction(to_self).await,
            Err(LedgerError::Validation(_))
        ));

        let mut unknown = send(&h.alice, &h.bob, "1");
        unknown.counterparty_handle = Some("CAZZZZZZZZZZ".to_string());
        assert!(matches!(
            h.ledger.create_transaction(unknown).await,
            Err(LedgerError::CounterpartyNotFound)
        ));

        let mut zero = send(&h.alice, &h.bob, "0");
        zero.amount = Some(Amount::ZERO);
        assert!(matches!(
            h.ledger.create_transaction(zero).await,
            Err(LedgerError::Validation(_))
        ));

        let mut partial_swap = swap(&h.alice);
        partial_swap.swap = Some(SwapInput {
            to_amount: None,
            ..partial_swap.swap.clone().unwrap()
        });
        assert!(matches!(
            h.ledger.create_transaction(partial_swap).await,
            Err(LedgerError::Validation(_))
        ));

        assert!(!h.ledger.has_pending(&h.alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn swap_stores_destination_leg_as_canonical() {
        let h = harness().await;
        let tx = h.ledger.create_transaction(swap(&h.alice)).await.unwrap();
        assert_eq!(tx.asset, Asset::Ethereum);
        assert_eq!(tx.amount.to_string(), "20");
        assert_eq!(tx.swap.as_ref().unwrap().from_asset, Asset::Bitcoin);
        assert!(h.ledger.find_by_hash(&tx.tx_hash).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn listing_is_paginated_newest_first_with_kind_filter() {
        let h = harness().await;
        let mut ids = Vec::new();
        for amount in ["1", "2", "3"] {
            let tx = h
                .ledger
                .admin_create(send(&h.alice, &h.bob, amount), TxStatus::Successful)
                .await
                .unwrap();
            ids.push(tx.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        h.ledger
            .admin_create(swap(&h.alice), TxStatus::Successful)
            .await
            .unwrap();

        let first = h
            .ledger
            .list_by_principal(&h.alice.id, PageRequest::new(1, 2).unwrap(), Some(TxKind::Sent))
            .await
            .unwrap();
        assert_eq!(first.total, 3);
        let first_ids: Vec<_> = first.items.iter().map(|t| t.id.clone()).collect();
        assert_eq!(first_ids, vec![ids[2].clone(), ids[1].clone()]);

        let second = h
            .ledger
            .list_by_principal(&h.alice.id, PageRequest::new(2, 2).unwrap(), Some(TxKind::Sent))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].id, ids[0]);

        let recent = h.ledger.recent(&h.alice.id, 1).await.unwrap();
        assert_eq!(recent[0].kind, TxKind::Swap);

        let all = h.ledger.list_all(PageRequest::new(1, 50).unwrap(), None).await.unwrap();
        // Three sends, their three mirrors, and one swap
        assert_eq!(all.total, 7);

        let bitcoin = h
            .ledger
            .list_by_principal_and_asset(&h.alice.id, Asset::Bitcoin)
            .await
            .unwrap();
        assert_eq!(bitcoin.len(), 4);
    }

    #[tokio::test]
    async fn delete_removes_record_and_indexes() {
        let h = harness().await;
        let tx = h.ledger.create_transaction(swap(&h.alice)).await.unwrap();

        let removed = h.ledger.delete_by_id(&tx.id).await.unwrap();
        assert_eq!(removed.id, tx.id);
        assert!(h.ledger.get_by_id(&tx.id).await.unwrap().is_none());
        assert!(!h.ledger.has_pending(&h.alice.id).await.unwrap());
        assert!(h.ledger.find_by_hash(&tx.tx_hash).await.unwrap().is_empty());
        assert!(matches!(h.ledger.delete_by_id(&tx.id).await, Err(LedgerError::NotFound)));
    }

    #[tokio::test]
    async fn submission_queues_notifications_for_both_parties() {
        let mut h = harness().await;
        h.ledger.create_transaction(send(&h.alice, &h.bob, "0.5")).await.unwrap();

        let mut notified = Vec::new();
        while let Ok(message) = h.outbox.try_recv() {
            if let Outbound::Notification(n) = message {
                notified.push((n.principal_id, n.subcategory, n.message));
            }
        }
        assert!(notified.contains(&(h.alice.id.clone(), "debit".to_string(), "You sent 0.5 Bitcoin".to_string())));
        assert!(notified.contains(&(h.bob.id.clone(), "credit".to_string(), "You received 0.5 Bitcoin".to_string())));
    }

    #[tokio::test]
    async fn incoming_transfer_does_not_block_the_receiver() {
        let h = harness().await;
        h.ledger.create_transaction(send(&h.alice, &h.bob, "0.5")).await.unwrap();

        assert!(!h.ledger.has_pending(&h.bob.id).await.unwrap());
        h.ledger.create_transaction(swap(&h.bob)).await.unwrap();
    }

    #[tokio::test]
    async fn settling_a_transfer_settles_its_mirror() {
        let h = harness().await;
        h.ledger
            .admin_create(send(&h.bob, &h.alice, "2"), TxStatus::Successful)
            .await
            .unwrap();
        let sent = h.ledger.create_transaction(send(&h.alice, &h.bob, "0.5")).await.unwrap();

        let outcome = h.ledger.update_status(&sent.id, TxStatus::Successful).await.unwrap();
        assert!(outcome.success);

        let records = h.ledger.find_by_hash(&sent.tx_hash).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|tx| tx.status == TxStatus::Successful));

        let alice = h.ledger.balances_of(&h.alice.id).await.unwrap();
        let bob = h.ledger.balances_of(&h.bob.id).await.unwrap();
        assert_eq!(alice[&Asset::Bitcoin].to_string(), "1.5");
        assert_eq!(bob[&Asset::Bitcoin].to_string(), "-1.5");

        let mirror = records.iter().find(|tx| tx.principal_id == h.bob.id).unwrap();
        let again = h.ledger.update_status(&mirror.id, TxStatus::Failed).await.unwrap();
        assert!(!again.success);
    }

    #[tokio::test]
    async fn failing_via_the_mirror_fails_the_sender_too() {
        let h = harness().await;
        let sent = h.ledger.create_transaction(send(&h.alice, &h.bob, "1")).await.unwrap();
        let mirror = h
            .ledger
            .find_by_hash(&sent.tx_hash)
            .await
            .unwrap()
            .into_iter()
            .find(|tx| tx.principal_id == h.bob.id)
            .unwrap();

        assert!(h.ledger.update_status(&mirror.id, TxStatus::Failed).await.unwrap().success);
        let sender = h.ledger.get_by_id(&sent.id).await.unwrap().unwrap();
        assert_eq!(sender.status, TxStatus::Failed);
        assert!(!h.ledger.has_pending(&h.alice.id).await.unwrap());
    }

    #[test]
    fn page_request_rejects_non_positive() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, MAX_PAGE_SIZE + 1).is_err());
        assert_eq!(PageRequest::new(3, 10).unwrap().offset(), 20);
    }
}
