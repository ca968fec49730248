// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance derivation from ledger history.

use std::collections::BTreeMap;

use super::amount::Amount;
use super::types::{Asset, Transaction, TxKind, TxStatus};

/// Signed per-asset totals. Every supported asset is present.
pub type Balances = BTreeMap<Asset, Amount>;

/// Fold a principal's transactions into per-asset balances.
///
/// Only `successful` records count. `received` credits its asset and
/// `sent` debits it. A `swap` credits the destination leg and debits the
/// source leg; a swap recorded without legs credits its canonical
/// asset only.
pub fn fold_balances<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Balances {
    let mut balances: Balances = Asset::ALL.into_iter().map(|a| (a, Amount::ZERO)).collect();
    let mut apply = |asset: Asset, delta: Amount| {
        let entry = balances.entry(asset).or_default();
        *entry = *entry + delta;
    };

    for tx in transactions {
        if tx.status != TxStatus::Successful {
            continue;
        }
        match tx.kind {
            TxKind::Received => apply(tx.asset, tx.amount),
            TxKind::Sent => apply(tx.asset, -tx.amount),
            TxKind::Swap => match &tx.swap {
                Some(legs) => {
                    apply(legs.to_asset, legs.to_amount);
                    apply(legs.from_asset, -legs.from_amount);
                }
                None => apply(tx.asset, tx.amount),
            },
        }
    }

    balances
}
