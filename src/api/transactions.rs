// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction endpoints for submitting transfers and reading ledger
//! history and balances.

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{Auth, StepUpHeader},
    error::{ApiError, ApiResponse, ApiResult},
    ledger::{
        Amount, Asset, Balances, NewTransaction, PageRequest, SwapInput, Transaction,
        TransactionPage, TxKind,
    },
    state::AppState,
};

const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_RECENT: usize = 5;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to submit a transaction.
///
/// `sent` needs `coin`, `amount` and either `receiverHandle` (internal
/// transfer) or `walletAddress`. `swap` needs all four swap fields.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    /// "sent", "received" or "swap"
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    /// Asset id, e.g. "bitcoin" or "usdt_trc20"
    pub coin: Option<String>,
    pub amount: Option<Amount>,
    /// Account handle of an internal receiver
    #[serde(alias = "accountId")]
    pub receiver_handle: Option<String>,
    pub network: Option<String>,
    pub wallet_address: Option<String>,
    pub from_coin: Option<String>,
    pub to_coin: Option<String>,
    pub from_amount: Option<Amount>,
    pub to_amount: Option<Amount>,
}

/// Query parameters for transaction listings.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct TransactionListQuery {
    /// 1-based page (default: 1)
    #[param(default = 1)]
    pub page: Option<usize>,
    /// Page size (default: 10, max: 100)
    #[param(default = 10)]
    pub page_size: Option<usize>,
    /// Filter by kind: "sent", "received" or "swap"
    #[serde(rename = "type")]
    #[param(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentQuery {
    /// Number of transactions (default: 5)
    #[param(default = 5)]
    pub limit: Option<usize>,
}

/// Per-asset balances derived from successful transactions.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Asset id to signed decimal amount
    #[schema(value_type = Object)]
    pub balances: Balances,
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(crate) fn parse_kind(raw: &str) -> Result<TxKind, ApiError> {
    TxKind::parse(raw).ok_or_else(|| ApiError::bad_request("type must be one of sent, received or swap"))
}

pub(crate) fn parse_asset(raw: &str) -> Result<Asset, ApiError> {
    Asset::parse(raw).ok_or_else(|| ApiError::bad_request(format!("Unsupported coin: {raw}")))
}

fn parse_optional_asset(raw: Option<&str>) -> Result<Option<Asset>, ApiError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_asset)
        .transpose()
}

impl CreateTransactionRequest {
    pub(crate) fn into_new_transaction(self, principal_id: &str) -> Result<NewTransaction, ApiError> {
        let kind = parse_kind(&self.kind)?;
        let swap = match kind {
            TxKind::Swap => Some(SwapInput {
                from_asset: parse_optional_asset(self.from_coin.as_deref())?,
                to_asset: parse_optional_asset(self.to_coin.as_deref())?,
                from_amount: self.from_amount,
                to_amount: self.to_amount,
            }),
            _ => None,
        };

        Ok(NewTransaction {
            principal_id: principal_id.to_string(),
            kind,
            asset: parse_optional_asset(self.coin.as_deref())?,
            amount: self.amount,
            counterparty_handle: self.receiver_handle,
            swap,
            network: self.network,
            wallet_address: self.wallet_address,
        })
    }
}

pub(crate) fn page_request(page: Option<usize>, page_size: Option<usize>) -> Result<PageRequest, ApiError> {
    Ok(PageRequest::new(page.unwrap_or(1), page_size.unwrap_or(DEFAULT_PAGE_SIZE))?)
}

pub(crate) fn kind_filter(raw: Option<&str>) -> Result<Option<TxKind>, ApiError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_kind)
        .transpose()
}

// =============================================================================
// Handlers
// =============================================================================

/// Submit a transaction.
///
/// A principal may have only one pending transaction at a time. Sending
/// requires a step-up token in `X-Step-Up-Token`.
#[utoipa::path(
    post,
    path = "/v1/transactions",
    tag = "Transactions",
    security(("bearer" = [])),
    request_body = CreateTransactionRequest,
    params(
        ("X-Step-Up-Token" = Option<String>, Header, description = "Required for sent transactions")
    ),
    responses(
        (status = 201, description = "Transaction recorded as pending", body = Transaction),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Account suspended or step-up missing"),
        (status = 404, description = "Receiver not found"),
        (status = 409, description = "A pending transaction already exists"),
    )
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Auth(user): Auth,
    StepUpHeader(step_up): StepUpHeader,
    axum::Json(request): axum::Json<CreateTransactionRequest>,
) -> ApiResult<Transaction> {
    let input = request.into_new_transaction(&user.principal_id)?;
    if input.kind == TxKind::Sent {
        state.gate.verify_step_up(&user, step_up.as_deref())?;
    }

    let transaction = state.ledger.create_transaction(input).await?;
    Ok(ApiResponse::created("Transaction submitted successfully", transaction))
}

/// List the caller's transactions, newest first.
#[utoipa::path(
    get,
    path = "/v1/transactions",
    tag = "Transactions",
    security(("bearer" = [])),
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Page of transactions", body = TransactionPage),
        (status = 400, description = "Invalid pagination"),
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<TransactionListQuery>,
) -> ApiResult<TransactionPage> {
    let page = page_request(query.page, query.page_size)?;
    let kind = kind_filter(query.kind.as_deref())?;
    let result = state.ledger.list_by_principal(&user.principal_id, page, kind).await?;
    Ok(ApiResponse::ok("Transactions fetched successfully", result))
}

/// The caller's most recent transactions.
#[utoipa::path(
    get,
    path = "/v1/transactions/recent",
    tag = "Transactions",
    security(("bearer" = [])),
    params(RecentQuery),
    responses(
        (status = 200, description = "Recent transactions", body = [Transaction]),
    )
)]
pub async fn recent_transactions(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Vec<Transaction>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT);
    let items = state.ledger.recent(&user.principal_id, limit).await?;
    Ok(ApiResponse::ok("Recent transactions fetched successfully", items))
}

/// Fetch one transaction. Users only see their own; admins see any.
#[utoipa::path(
    get,
    path = "/v1/transactions/{id}",
    tag = "Transactions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction", body = Transaction),
        (status = 404, description = "Transaction not found"),
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let transaction = state
        .ledger
        .get_by_id(&id)
        .await?
        .filter(|tx| tx.principal_id == user.principal_id || user.is_admin())
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;
    Ok(ApiResponse::ok("Transaction fetched successfully", transaction))
}

/// The caller's transactions in one asset, including swaps out of it.
#[utoipa::path(
    get,
    path = "/v1/transactions/coin/{asset}",
    tag = "Transactions",
    security(("bearer" = [])),
    params(("asset" = String, Path, description = "Asset id, e.g. bitcoin")),
    responses(
        (status = 200, description = "Transactions", body = [Transaction]),
        (status = 400, description = "Unsupported coin"),
    )
)]
pub async fn list_by_coin(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(asset): Path<String>,
) -> ApiResult<Vec<Transaction>> {
    let asset = parse_asset(&asset)?;
    let items = state
        .ledger
        .list_by_principal_and_asset(&user.principal_id, asset)
        .await?;
    Ok(ApiResponse::ok("Transactions fetched successfully", items))
}

/// The caller's balances, recomputed from ledger history.
#[utoipa::path(
    get,
    path = "/v1/balance",
    tag = "Transactions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Balances", body = BalanceResponse),
    )
)]
pub async fn get_balance(State(state): State<AppState>, Auth(user): Auth) -> ApiResult<BalanceResponse> {
    let balances = state.ledger.balances_of(&user.principal_id).await?;
    Ok(ApiResponse::ok("Balance fetched successfully", BalanceResponse { balances }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_client::{call, call_with_headers, register_user, set_passcode_and_step_up, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn handle_of(app: &TestApp, email: &str) -> String {
        app.state
            .principals
            .find_by_email(email)
            .await
            .unwrap()
            .unwrap()
            .account_handle
    }

    #[test]
    fn request_conversion_parses_assets_leniently() {
        let request: CreateTransactionRequest = serde_json::from_value(json!({
            "type": "swap",
            "fromCoin": "Binance Coin",
            "toCoin": "usdt-trc20",
            "fromAmount": "2",
            "toAmount": 600
        }))
        .unwrap();
        let input = request.into_new_transaction("p1").unwrap();
        let swap = input.swap.unwrap();
        assert_eq!(swap.from_asset, Some(Asset::BinanceCoin));
        assert_eq!(swap.to_asset, Some(Asset::UsdtTrc20));
        assert_eq!(swap.to_amount, Some("600".parse().unwrap()));
    }

    #[test]
    fn unknown_kind_or_coin_is_bad_request() {
        let request: CreateTransactionRequest =
            serde_json::from_value(json!({"type": "mint", "coin": "bitcoin", "amount": "1"})).unwrap();
        assert_eq!(
            request.into_new_transaction("p1").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );

        let request: CreateTransactionRequest =
            serde_json::from_value(json!({"type": "sent", "coin": "monero", "amount": "1"})).unwrap();
        assert_eq!(
            request.into_new_transaction("p1").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn sent_requires_step_up() {
        let app = TestApp::new();
        let token = register_user(&app, "alice@example.com", "alice").await;
        register_user(&app, "bob@example.com", "bobby").await;
        let bob_handle = handle_of(&app, "bob@example.com").await;

        let body = json!({"type": "sent", "coin": "bitcoin", "amount": "0.5", "receiverHandle": bob_handle});
        let (status, response) =
            call(&app, Method::POST, "/v1/transactions", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(response["data"]["code"], "step_up_required");
    }

    #[tokio::test]
    async fn internal_send_mirrors_and_blocks_second_submission() {
        let app = TestApp::new();
        register_user(&app, "bob@example.com", "bobby").await;
        let alice = register_user(&app, "alice@example.com", "alice").await;
        let step_up = set_passcode_and_step_up(&app, &alice).await;
        let bob_handle = handle_of(&app, "bob@example.com").await;

        let body = json!({"type": "sent", "coin": "bitcoin", "amount": "0.5", "receiverHandle": bob_handle});
        let (status, response) = call_with_headers(
            &app,
            Method::POST,
            "/v1/transactions",
            Some(&alice),
            &[("X-Step-Up-Token", &step_up)],
            Some(body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{response}");
        assert_eq!(response["data"]["status"], "pending");
        let tx_hash = response["data"]["txHash"].as_str().unwrap().to_string();

        let (status, response) = call_with_headers(
            &app,
            Method::POST,
            "/v1/transactions",
            Some(&alice),
            &[("X-Step-Up-Token", &step_up)],
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT, "{response}");

        let mirrors = app.state.ledger.find_by_hash(&tx_hash).await.unwrap();
        assert_eq!(mirrors.len(), 2);

        let bob = app.state.principals.find_by_email("bob@example.com").await.unwrap().unwrap();
        let received = mirrors.iter().find(|tx| tx.principal_id == bob.id).unwrap();
        assert_eq!(received.kind, TxKind::Received);
    }

    #[tokio::test]
    async fn listing_and_ownership() {
        let app = TestApp::new();
        let alice = register_user(&app, "alice@example.com", "alice").await;
        let bob = register_user(&app, "bob@example.com", "bobby").await;

        let (status, created) = call(
            &app,
            Method::POST,
            "/v1/transactions",
            Some(&alice),
            Some(json!({"type": "received", "coin": "ethereum", "amount": "2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, page) = call(&app, Method::GET, "/v1/transactions?page=1&pageSize=5", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["data"]["total"], 1);
        assert_eq!(page["data"]["pageSize"], 5);

        let (status, _) = call(&app, Method::GET, "/v1/transactions?page=0", Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, filtered) = call(&app, Method::GET, "/v1/transactions?type=sent", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(filtered["data"]["total"], 0);

        let uri = format!("/v1/transactions/{id}");
        let (status, _) = call(&app, Method::GET, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, by_coin) = call(&app, Method::GET, "/v1/transactions/coin/ethereum", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_coin["data"].as_array().unwrap().len(), 1);

        let (status, recent) = call(&app, Method::GET, "/v1/transactions/recent", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recent["data"][0]["id"], id.as_str());
    }

    #[tokio::test]
    async fn balance_ignores_pending() {
        let app = TestApp::new();
        let alice = register_user(&app, "alice@example.com", "alice").await;
        call(
            &app,
            Method::POST,
            "/v1/transactions",
            Some(&alice),
            Some(json!({"type": "received", "coin": "bitcoin", "amount": "1.5"})),
        )
        .await;

        let (status, body) = call(&app, Method::GET, "/v1/balance", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balances"]["bitcoin"], "0");
    }
}
