// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Role,
    ledger::{Asset, StatusOutcome, SwapLegs, Transaction, TransactionPage, TxKind, TxStatus},
    state::AppState,
    storage::Notification,
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod transactions;
pub mod users;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        // Authentication and account lifecycle
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/verifyEmail", post(auth::verify_email))
        .route("/passcode", post(auth::set_passcode))
        .route("/verifyPasscode", post(auth::verify_passcode))
        .route("/passwordResetVerification", post(auth::request_password_reset))
        .route("/verifyPasswordResetOTP", post(auth::verify_password_reset))
        .route("/resetPassword", post(auth::reset_password))
        .route("/changePassword", post(auth::change_password))
        .route("/adminLogin", post(auth::admin_login))
        // Users
        .route("/users/me", get(users::get_current_user))
        .route("/notifications", get(users::list_notifications))
        // Transactions
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route("/transactions/recent", get(transactions::recent_transactions))
        .route("/transactions/coin/{asset}", get(transactions::list_by_coin))
        .route("/transactions/{id}", get(transactions::get_transaction))
        .route("/balance", get(transactions::get_balance))
        // Admin
        .route(
            "/admin/transactions",
            get(admin::list_transactions).post(admin::create_transaction),
        )
        .route("/admin/transactions/{id}", delete(admin::delete_transaction))
        .route("/admin/transactions/{id}/status", patch(admin::update_status))
        .route("/admin/users/{id}/transactions", get(admin::user_transactions))
        .route("/admin/users/{id}/balance", get(admin::user_balance))
        .route("/admin/users/{id}/suspension", put(admin::set_suspension));

    let health_routes = Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Registers the bearer scheme the handlers reference.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        auth::register,
        auth::login,
        auth::logout,
        auth::verify_email,
        auth::set_passcode,
        auth::verify_passcode,
        auth::request_password_reset,
        auth::verify_password_reset,
        auth::reset_password,
        auth::change_password,
        auth::admin_login,
        users::get_current_user,
        users::list_notifications,
        transactions::create_transaction,
        transactions::list_transactions,
        transactions::recent_transactions,
        transactions::get_transaction,
        transactions::list_by_coin,
        transactions::get_balance,
        admin::create_transaction,
        admin::list_transactions,
        admin::update_status,
        admin::delete_transaction,
        admin::user_transactions,
        admin::user_balance,
        admin::set_suspension
    ),
    components(
        schemas(
            Role,
            Asset,
            TxKind,
            TxStatus,
            SwapLegs,
            Transaction,
            TransactionPage,
            StatusOutcome,
            Notification,
            auth::DeviceInfo,
            auth::RegisterRequest,
            auth::RegisterResponse,
            auth::LoginRequest,
            auth::LoginRedirect,
            auth::LoginResponse,
            auth::AdminLoginResponse,
            auth::VerifyEmailRequest,
            auth::SetPasscodeRequest,
            auth::PasscodeVerificationRequest,
            auth::StepUpResponse,
            auth::PasswordResetEmailRequest,
            auth::VerifyPasswordResetRequest,
            auth::ResetPasswordRequest,
            auth::ChangePasswordRequest,
            users::UserMeResponse,
            transactions::CreateTransactionRequest,
            transactions::BalanceResponse,
            admin::AdminCreateTransactionRequest,
            admin::UpdateStatusRequest,
            admin::SuspensionRequest,
            admin::SuspensionResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Registration, sessions and credentials"),
        (name = "Users", description = "Profile and notifications"),
        (name = "Transactions", description = "Transfers, history and balances"),
        (name = "Admin", description = "Ledger settlement and account administration")
    )
)]
struct ApiDoc;

/// In-process client for handler tests.
#[cfg(test)]
pub(crate) mod test_client {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::auth::{password::hash_password, Role};
    use crate::state::{tests::test_state, AppState};
    use crate::storage::NewPrincipal;

    pub(crate) const ADMIN_EMAIL: &str = "admin@example.com";
    pub(crate) const ADMIN_PASSWORD: &str = "admin-password";
    pub(crate) const USER_PASSWORD: &str = "password123";

    pub(crate) struct TestApp {
        pub state: AppState,
        pub router: Router,
        _dir: TempDir,
    }

    impl TestApp {
        pub fn new() -> Self {
            let (state, dir) = test_state();
            Self {
                router: super::router(state.clone()),
                state,
                _dir: dir,
            }
        }
    }

    /// Send a request and decode the JSON body (`Null` when empty).
    pub(crate) async fn call(
        app: &TestApp,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        call_with_headers(app, method, uri, token, &[], body).await
    }

    pub(crate) async fn call_with_headers(
        app: &TestApp,
        method: Method,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Register a user with [`USER_PASSWORD`] and return the access token.
    pub(crate) async fn register_user(app: &TestApp, email: &str, username: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/v1/register",
            None,
            Some(json!({"email": email, "username": username, "password": USER_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["accessToken"].as_str().unwrap().to_string()
    }

    /// Create the administrator account and log it in.
    pub(crate) async fn admin_token(app: &TestApp, role: Role) -> String {
        app.state
            .principals
            .create(NewPrincipal {
                email: ADMIN_EMAIL.to_string(),
                username: "administrator".to_string(),
                password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
                role,
                is_verified: true,
                verification_code: None,
                verification_expires_at: None,
            })
            .await
            .unwrap();

        let (status, body) = call(
            app,
            Method::POST,
            "/v1/adminLogin",
            None,
            Some(json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["accessToken"].as_str().unwrap().to_string()
    }

    /// Set passcode `1234` and exchange it for a step-up token.
    pub(crate) async fn set_passcode_and_step_up(app: &TestApp, token: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/v1/passcode",
            Some(token),
            Some(json!({"passcode": "1234"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, body) = call(
            app,
            Method::POST,
            "/v1/verifyPasscode",
            Some(token),
            Some(json!({"passcode": "1234"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["stepUpToken"].as_str().unwrap().to_string()
    }
}
