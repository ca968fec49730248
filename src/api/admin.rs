// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the Admin role and provide:
//! - Ledger-wide transaction listing
//! - Per-user transaction history and balances
//! - Account suspension
//!
//! Recording, settling and deleting transactions requires SuperAdmin.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::auth::load_principal;
use super::transactions::{kind_filter, page_request, BalanceResponse, CreateTransactionRequest};
use crate::{
    auth::{AdminOnly, SuperAdminOnly},
    error::{ApiError, ApiResponse, ApiResult},
    ledger::{PageRequest, StatusOutcome, Transaction, TransactionPage, TxStatus},
    state::AppState,
    storage::Principal,
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Record a transaction on behalf of a user.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateTransactionRequest {
    /// Owner of the new record
    pub user_id: String,
    /// Initial status (default: "pending")
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub transaction: CreateTransactionRequest,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// "successful" or "failed"
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SuspensionRequest {
    pub suspended: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuspensionResponse {
    pub user_id: String,
    pub is_suspended: bool,
}

/// Query parameters for the admin listing.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct AdminListQuery {
    #[param(default = 1)]
    pub page: Option<usize>,
    #[param(default = 10)]
    pub page_size: Option<usize>,
    #[serde(rename = "type")]
    #[param(rename = "type")]
    pub kind: Option<String>,
}

fn parse_status(raw: &str) -> Result<TxStatus, ApiError> {
    TxStatus::parse(raw)
        .ok_or_else(|| ApiError::bad_request("status must be one of pending, successful or failed"))
}

// ============================================================================
// Handlers
// ============================================================================

/// Record a transaction for a user with an explicit status.
///
/// Bypasses the pending-transaction guard and the suspension check.
#[utoipa::path(
    post,
    path = "/v1/admin/transactions",
    tag = "Admin",
    security(("bearer" = [])),
    request_body = AdminCreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction recorded", body = Transaction),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "SuperAdmin role required"),
        (status = 404, description = "User or receiver not found"),
    )
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    SuperAdminOnly(admin): SuperAdminOnly,
    Json(request): Json<AdminCreateTransactionRequest>,
) -> ApiResult<Transaction> {
    let status = match request.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => TxStatus::Pending,
    };
    let input = request.transaction.into_new_transaction(&request.user_id)?;
    let transaction = state.ledger.admin_create(input, status).await?;

    tracing::info!(
        admin_id = %admin.principal_id,
        tx_id = %transaction.id,
        user_id = %transaction.principal_id,
        "Admin recorded transaction"
    );
    Ok(ApiResponse::created("Transaction created successfully", transaction))
}

/// List all transactions, newest first.
#[utoipa::path(
    get,
    path = "/v1/admin/transactions",
    tag = "Admin",
    security(("bearer" = [])),
    params(AdminListQuery),
    responses(
        (status = 200, description = "Page of transactions", body = TransactionPage),
        (status = 403, description = "Admin role required"),
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Query(query): Query<AdminListQuery>,
) -> ApiResult<TransactionPage> {
    let page: PageRequest = page_request(query.page, query.page_size)?;
    let kind = kind_filter(query.kind.as_deref())?;
    let result = state.ledger.list_all(page, kind).await?;
    Ok(ApiResponse::ok("Transactions fetched successfully", result))
}

/// Settle a pending transaction.
///
/// Only `pending -> successful` and `pending -> failed` are accepted; any
/// other transition is rejected with 400 and the record is unchanged.
/// Settling either side of a transfer settles both records.
#[utoipa::path(
    patch,
    path = "/v1/admin/transactions/{id}/status",
    tag = "Admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Transaction id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = StatusOutcome),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "SuperAdmin role required"),
        (status = 404, description = "Transaction not found"),
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    SuperAdminOnly(admin): SuperAdminOnly,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<StatusOutcome> {
    let status = parse_status(&request.status)?;
    let outcome = state.ledger.update_status(&id, status).await?;
    if !outcome.success {
        return Err(ApiError::bad_request(outcome.reason));
    }

    tracing::info!(admin_id = %admin.principal_id, tx_id = %id, status = status.as_str(), "Admin settled transaction");
    Ok(ApiResponse::ok("Transaction status updated successfully", outcome))
}

/// Delete a transaction record.
#[utoipa::path(
    delete,
    path = "/v1/admin/transactions/{id}",
    tag = "Admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Deleted transaction", body = Transaction),
        (status = 403, description = "SuperAdmin role required"),
        (status = 404, description = "Transaction not found"),
    )
)]
pub async fn delete_transaction(
    State(state): State<AppState>,
    SuperAdminOnly(admin): SuperAdminOnly,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let removed = state.ledger.delete_by_id(&id).await?;
    tracing::info!(admin_id = %admin.principal_id, tx_id = %id, "Admin deleted transaction");
    Ok(ApiResponse::ok("Transaction deleted successfully", removed))
}

/// A user's transactions, newest first.
#[utoipa::path(
    get,
    path = "/v1/admin/users/{id}/transactions",
    tag = "Admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id"), AdminListQuery),
    responses(
        (status = 200, description = "Page of transactions", body = TransactionPage),
        (status = 404, description = "User not found"),
    )
)]
pub async fn user_transactions(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(user_id): Path<String>,
    Query(query): Query<AdminListQuery>,
) -> ApiResult<TransactionPage> {
    load_principal(&state, &user_id).await?;
    let page = page_request(query.page, query.page_size)?;
    let kind = kind_filter(query.kind.as_deref())?;
    let result = state.ledger.list_by_principal(&user_id, page, kind).await?;
    Ok(ApiResponse::ok("Transactions fetched successfully", result))
}

/// A user's balances.
#[utoipa::path(
    get,
    path = "/v1/admin/users/{id}/balance",
    tag = "Admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Balances", body = BalanceResponse),
        (status = 404, description = "User not found"),
    )
)]
pub async fn user_balance(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(user_id): Path<String>,
) -> ApiResult<BalanceResponse> {
    load_principal(&state, &user_id).await?;
    let balances = state.ledger.balances_of(&user_id).await?;
    Ok(ApiResponse::ok("Balance fetched successfully", BalanceResponse { balances }))
}

/// Suspend or reinstate a user.
///
/// Suspended users keep read access but cannot submit transactions.
#[utoipa::path(
    put,
    path = "/v1/admin/users/{id}/suspension",
    tag = "Admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body = SuspensionRequest,
    responses(
        (status = 200, description = "Suspension updated", body = SuspensionResponse),
        (status = 403, description = "Admin role required or target is an administrator"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn set_suspension(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Path(user_id): Path<String>,
    Json(request): Json<SuspensionRequest>,
) -> ApiResult<SuspensionResponse> {
    let current = load_principal(&state, &user_id).await?;
    if current.role.is_admin() {
        return Err(ApiError::forbidden("Administrators cannot be suspended"));
    }

    let mutate: fn(&mut Principal) = if request.suspended {
        Principal::suspend
    } else {
        Principal::reinstate
    };
    let principal = state.principals.update(&current.id, mutate).await?;
    let changed = current.is_suspended != principal.is_suspended;

    if changed {
        let (title, message, subject) = if principal.is_suspended {
            (
                "Account suspended",
                "Your account has been suspended. Please contact support.",
                "Your Account Was Suspended",
            )
        } else {
            (
                "Account reinstated",
                "Your account has been reinstated.",
                "Your Account Was Reinstated",
            )
        };
        state.notifier.emit(&principal.id, "account", "suspension", title, message);
        state
            .notifier
            .send_email(&principal.email, subject, format!("<p>{message}</p>"));
        tracing::info!(
            admin_id = %admin.principal_id,
            user_id = %principal.id,
            suspended = principal.is_suspended,
            "Admin changed suspension"
        );
    }

    Ok(ApiResponse::ok(
        "Suspension updated successfully",
        SuspensionResponse {
            user_id: principal.id,
            is_suspended: principal.is_suspended,
        },
    ))
}
