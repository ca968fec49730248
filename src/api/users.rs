// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::auth::load_principal;
use crate::{
    auth::{Auth, Role},
    error::{ApiResponse, ApiResult},
    state::AppState,
    storage::{Notification, Principal},
};

const DEFAULT_NOTIFICATION_LIMIT: usize = 20;
const MAX_NOTIFICATION_LIMIT: usize = 100;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserMeResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    /// Handle other users send to
    pub account_handle: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_suspended: bool,
    pub has_passcode: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Principal> for UserMeResponse {
    fn from(principal: Principal) -> Self {
        Self {
            has_passcode: principal.passcode_hash.is_some(),
            id: principal.id,
            email: principal.email,
            username: principal.username,
            account_handle: principal.account_handle,
            role: principal.role,
            is_verified: principal.is_verified,
            is_suspended: principal.is_suspended,
            created_at: principal.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NotificationQuery {
    /// Maximum number of results (default: 20, max: 100)
    #[param(default = 20)]
    pub limit: Option<usize>,
}

/// Get the current authenticated user's profile.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(State(state): State<AppState>, Auth(user): Auth) -> ApiResult<UserMeResponse> {
    let principal = load_principal(&state, &user.principal_id).await?;
    Ok(ApiResponse::ok(
        "Your user details was fetched successfully",
        principal.into(),
    ))
}

/// List the caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "Users",
    security(("bearer" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "Notifications", body = [Notification]),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Vec<Notification>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
        .clamp(1, MAX_NOTIFICATION_LIMIT);
    let notifications = state.notifications.list_for(&user.principal_id, limit).await?;
    Ok(ApiResponse::ok("Notifications fetched successfully", notifications))
}
