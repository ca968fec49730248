// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content-derived transaction hashes.

use sha2::{Digest, Sha256};

use super::types::Transaction;

/// SHA-256 over the submission content, `0x`-prefixed lowercase hex.
///
/// The record id and creation time are folded in so that two identical
/// submissions still get distinct hashes. Status and `updated_at` are not
/// part of the content and never change the hash.
pub fn transaction_hash(tx: &Transaction) -> String {
    let mut hasher = Sha256::new();
    let mut field = |name: &str, value: &str| {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    };

    field("id", &tx.id);
    field("principal", &tx.principal_id);
    field("counterparty", tx.counterparty_id.as_deref().unwrap_or(""));
    field("kind", tx.kind.as_str());
    field("asset", tx.asset.as_str());
    field("amount", &tx.amount.to_string());
    if let Some(swap) = &tx.swap {
        field("from_asset", swap.from_asset.as_str());
        field("from_amount", &swap.from_amount.to_string());
        field("to_asset", swap.to_asset.as_str());
        field("to_amount", &swap.to_amount.to_string());
    }
    field("network", tx.network.as_deref().unwrap_or(""));
    field("wallet_address", tx.wallet_address.as_deref().unwrap_or(""));
    field("created_at", &tx.created_at.timestamp_micros().to_string());

    format!("0x{:x}", hasher.finalize())
}
