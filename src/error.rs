// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Uniform response envelope `{success, message, data?}` and the API error
//! type handlers return.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::ledger::LedgerError;
use crate::storage::{PrincipalError, StorageError};

/// Message returned for every uncaught internal failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Machine-readable code, emitted as `data.code`
    pub code: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorCode {
    code: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<ErrorCode>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Log `detail` and return a generic 500.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            message: self.message,
            data: self.code.map(|code| ErrorCode { code }),
        });
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.status_code(), err.to_string()).with_code(err.error_code())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Timeout(op) => {
                tracing::warn!(op, "Store operation timed out");
                ApiError::service_unavailable("Service temporarily unavailable, please retry")
            }
            other => ApiError::internal(other),
        }
    }
}

impl From<PrincipalError> for ApiError {
    fn from(err: PrincipalError) -> Self {
        match err {
            PrincipalError::DuplicateIdentity(field) => {
                ApiError::conflict(format!("{field} is already registered"))
            }
            PrincipalError::NotFound => ApiError::not_found("User not found"),
            PrincipalError::Storage(e) => e.into(),
            PrincipalError::Secret(e) => ApiError::internal(e),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(message) => ApiError::bad_request(message),
            LedgerError::UnknownPrincipal => ApiError::not_found("User not found"),
            LedgerError::CounterpartyNotFound => ApiError::not_found("Receiver account not found"),
            LedgerError::AccountSuspended => {
                ApiError::forbidden("Your account is suspended. Please contact support")
            }
            LedgerError::PendingTransactionExists => ApiError::conflict(
                "You have a pending transaction. Please wait for it to complete",
            ),
            LedgerError::NotFound => ApiError::not_found("Transaction not found"),
            LedgerError::Storage(e) => e.into(),
            LedgerError::Principal(e) => e.into(),
        }
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }
}

impl ApiResponse<()> {
    /// Success envelope without a `data` member.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let conflict = ApiError::conflict("dup");
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn internal_hides_detail() {
        let err = ApiError::internal("disk on fire");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn ledger_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(LedgerError::PendingTransactionExists).status,
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::from(LedgerError::AccountSuspended).status, StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(LedgerError::Validation("bad".into())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::Storage(StorageError::Timeout("op"))).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn auth_errors_keep_their_code() {
        let err = ApiError::from(AuthError::StepUpRequired);
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        let body = body_json(err.into_response()).await;
        assert_eq!(body["data"]["code"], "step_up_required");
    }

    #[test]
    fn duplicate_identity_is_conflict() {
        let err = ApiError::from(PrincipalError::DuplicateIdentity("email"));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "email is already registered");
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        let body = body_json(ApiError::bad_request("bad data").into_response()).await;
        assert_eq!(body, serde_json::json!({"success": false, "message": "bad data"}));
    }

    #[tokio::test]
    async fn success_envelope_shape() {
        let response = ApiResponse::created("done", serde_json::json!({"id": 1})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 1);

        let body = body_json(ApiResponse::message("bye").into_response()).await;
        assert!(body.get("data").is_none());
    }
}
