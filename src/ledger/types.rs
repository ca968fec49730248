// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::amount::Amount;

/// Supported assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Bitcoin,
    Ethereum,
    BinanceCoin,
    Tron,
    UsdtTrc20,
    UsdtErc20,
    Solana,
    Litecoin,
    Dogecoin,
    Dash,
    BitcoinCash,
    Polkadot,
    Polygon,
    Stellar,
}

impl Asset {
    pub const ALL: [Asset; 14] = [
        Asset::Bitcoin,
        Asset::Ethereum,
        Asset::BinanceCoin,
        Asset::Tron,
        Asset::UsdtTrc20,
        Asset::UsdtErc20,
        Asset::Solana,
        Asset::Litecoin,
        Asset::Dogecoin,
        Asset::Dash,
        Asset::BitcoinCash,
        Asset::Polkadot,
        Asset::Polygon,
        Asset::Stellar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Asset::Bitcoin => "bitcoin",
            Asset::Ethereum => "ethereum",
            Asset::BinanceCoin => "binance_coin",
            Asset::Tron => "tron",
            Asset::UsdtTrc20 => "usdt_trc20",
            Asset::UsdtErc20 => "usdt_erc20",
            Asset::Solana => "solana",
            Asset::Litecoin => "litecoin",
            Asset::Dogecoin => "dogecoin",
            Asset::Dash => "dash",
            Asset::BitcoinCash => "bitcoin_cash",
            Asset::Polkadot => "polkadot",
            Asset::Polygon => "polygon",
            Asset::Stellar => "stellar",
        }
    }

    /// Human-readable name used in notification text.
    pub fn display_name(&self) -> &'static str {
        match self {
            Asset::Bitcoin => "Bitcoin",
            Asset::Ethereum => "Ethereum",
            Asset::BinanceCoin => "Binance Coin",
            Asset::Tron => "Tron",
            Asset::UsdtTrc20 => "USDT TRC20",
            Asset::UsdtErc20 => "USDT ERC20",
            Asset::Solana => "Solana",
            Asset::Litecoin => "Litecoin",
            Asset::Dogecoin => "Dogecoin",
            Asset::Dash => "Dash",
            Asset::BitcoinCash => "Bitcoin Cash",
            Asset::Polkadot => "Polkadot",
            Asset::Polygon => "Polygon",
            Asset::Stellar => "Stellar",
        }
    }

    /// Parse an asset id, tolerating spaces, hyphens and case
    /// (`"Binance Coin"`, `"usdt-trc20"`).
    pub fn parse(s: &str) -> Option<Asset> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Asset::ALL.into_iter().find(|a| a.as_str() == normalized)
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Sent,
    Received,
    Swap,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Sent => "sent",
            TxKind::Received => "received",
            TxKind::Swap => "swap",
        }
    }

    pub fn parse(s: &str) -> Option<TxKind> {
        match s.trim().to_lowercase().as_str() {
            "sent" => Some(TxKind::Sent),
            "received" => Some(TxKind::Received),
            "swap" => Some(TxKind::Swap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Successful,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Successful => "successful",
            TxStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<TxStatus> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(TxStatus::Pending),
            "successful" => Some(TxStatus::Successful),
            "failed" => Some(TxStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

/// Source and destination of a swap. The destination is also recorded as
/// the transaction's canonical asset and amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwapLegs {
    pub from_asset: Asset,
    pub to_asset: Asset,
    pub from_amount: Amount,
    pub to_amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub principal_id: String,
    /// The other side of an internal transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_id: Option<String>,
    pub kind: TxKind,
    pub asset: Asset,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<SwapLegs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    pub tx_hash: String,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submission input for [`super::TransactionLedger::create_transaction`].
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub principal_id: String,
    pub kind: TxKind,
    pub asset: Option<Asset>,
    pub amount: Option<Amount>,
    /// Account handle of the internal receiver for `sent`.
    pub counterparty_handle: Option<String>,
    pub swap: Option<SwapInput>,
    pub network: Option<String>,
    pub wallet_address: Option<String>,
}

/// Swap legs as submitted; all four are required.
#[derive(Debug, Clone, Default)]
pub struct SwapInput {
    pub from_asset: Option<Asset>,
    pub to_asset: Option<Asset>,
    pub from_amount: Option<Amount>,
    pub to_amount: Option<Amount>,
}

/// Result of a status update. Invalid transitions are reported here rather
/// than as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusOutcome {
    pub success: bool,
    pub reason: String,
}

impl StatusOutcome {
    pub fn ok(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
        }
    }
}
