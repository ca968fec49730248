// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cold Asset - Custodial Wallet Core Service
//!
//! Single-session authentication and the internal transfer ledger behind
//! the Cold Asset custodial wallet.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session-bound JWT authentication, roles and step-up tokens
//! - `session` - Session registry and expiry sweeper
//! - `ledger` - Transaction ledger, swaps and balance derivation
//! - `notify` - Notification and email outbox
//! - `storage` - Embedded redb store and principal records

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod geo;
pub mod ledger;
pub mod logging;
pub mod notify;
pub mod session;
pub mod state;
pub mod storage;
