// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::auth::password::hash_password;
use crate::auth::secrets::CodeDigester;
use crate::auth::{AuthGate, Role, TokenError, TokenIssuer};
use crate::config::{AdminSeed, ServerConfig};
use crate::geo::GeoLocator;
use crate::ledger::TransactionLedger;
use crate::notify::Notifier;
use crate::session::SessionRegistry;
use crate::storage::{
    NewPrincipal, NotificationRepository, PrincipalError, PrincipalRepository, ResetConfirmations,
    StorageError, Store,
};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid token configuration: {0}")]
    Token(#[from] TokenError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub principals: PrincipalRepository,
    pub sessions: SessionRegistry,
    pub tokens: TokenIssuer,
    pub gate: AuthGate,
    pub ledger: TransactionLedger,
    pub notifications: NotificationRepository,
    pub notifier: Notifier,
    pub reset_confirmations: Arc<ResetConfirmations>,
    pub codes: CodeDigester,
    pub geo: GeoLocator,
    pub session_ttl: Duration,
}

impl AppState {
    pub fn new(config: &ServerConfig, store: Store, notifier: Notifier) -> Result<Self, StateError> {
        let tokens = TokenIssuer::new(&config.jwt_secret, config.step_up_ttl)?;
        let principals = PrincipalRepository::new(store.clone());
        let sessions = SessionRegistry::new(store.clone());

        Ok(Self {
            gate: AuthGate::new(tokens.clone(), sessions.clone()),
            ledger: TransactionLedger::new(store.clone(), principals.clone(), notifier.clone()),
            notifications: NotificationRepository::new(store.clone()),
            reset_confirmations: Arc::new(ResetConfirmations::with_ttl(config.reset_confirmation_ttl)),
            codes: CodeDigester::new(config.jwt_secret.as_bytes()),
            geo: GeoLocator::new(config.geolocation_url.clone())?,
            session_ttl: config.session_ttl,
            store,
            principals,
            sessions,
            tokens,
            notifier,
        })
    }

    /// Create the configured super admin unless the email is already taken.
    ///
    /// Returns `true` when an account was created.
    pub async fn seed_super_admin(&self, seed: &AdminSeed) -> Result<bool, PrincipalError> {
        if let Some(existing) = self.principals.find_by_email(&seed.email).await? {
            if existing.role != Role::SuperAdmin {
                tracing::warn!(principal_id = %existing.id, "Admin seed email belongs to a non-super-admin account");
            }
            return Ok(false);
        }

        let password = seed.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;
        let principal = self
            .principals
            .create(NewPrincipal {
                email: seed.email.clone(),
                username: "superadmin".to_string(),
                password_hash,
                role: Role::SuperAdmin,
                is_verified: true,
                verification_code: None,
                verification_expires_at: None,
            })
            .await?;

        tracing::info!(principal_id = %principal.id, "Seeded super admin");
        Ok(true)
    }
}
