// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-time authentication.
//!
//! `Unauthenticated -> TokenVerified -> SessionConfirmed -> Authorized`.
//! A verified signature is not sufficient: the session named by the token
//! must still be live in the [`SessionRegistry`] and owned by the token's
//! principal. Registry failures fail closed.

use tracing::{debug, warn};

use super::{AuthError, AuthenticatedUser, TokenIssuer};
use crate::session::SessionRegistry;

#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenIssuer,
    sessions: SessionRegistry,
}

impl AuthGate {
    pub fn new(tokens: TokenIssuer, sessions: SessionRegistry) -> Self {
        Self { tokens, sessions }
    }

    /// Authenticate a bearer token against the session registry.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "Access token rejected");
            AuthError::InvalidToken
        })?;

        let session_id = match claims.sid {
            Some(sid) if !sid.is_empty() && !claims.sub.is_empty() => sid,
            _ => return Err(AuthError::MalformedClaims),
        };

        let session = match self.sessions.get(&session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(AuthError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "Session registry unavailable during authentication");
                return Err(AuthError::SessionUnavailable);
            }
        };

        if session.principal_id != claims.sub {
            warn!(
                principal_id = %claims.sub,
                "Token presented for a session owned by another principal"
            );
            return Err(AuthError::SessionExpired);
        }

        let sessions = self.sessions.clone();
        let touched = session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = sessions.touch(&touched).await {
                debug!(error = %e, "Failed to refresh session liveness");
            }
        });

        Ok(AuthenticatedUser {
            principal_id: claims.sub,
            role: claims.role,
            session_id,
        })
    }

    /// Check a step-up token presented alongside an authenticated request.
    ///
    /// The token must carry the step-up scope and name the same principal.
    pub fn verify_step_up(&self, user: &AuthenticatedUser, token: Option<&str>) -> Result<(), AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::StepUpRequired)?;
        let claims = self.tokens.verify_step_up(token).map_err(|e| {
            debug!(error = %e, "Step-up token rejected");
            AuthError::InvalidStepUp
        })?;
        if claims.sub != user.principal_id {
            return Err(AuthError::InvalidStepUp);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::session::{SessionMetadata, SessionRegistry};
    use crate::storage::test_support::temp_store;
    use crate::storage::{StorageError, Store, SESSIONS};
    use std::time::Duration;
    use tempfile::TempDir;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";
    const TTL: Duration = Duration::from_secs(3600);

    fn gate() -> (AuthGate, TokenIssuer, SessionRegistry, TempDir) {
        let (store, dir) = temp_store();
        let tokens = TokenIssuer::new(SECRET, TTL).unwrap();
        let sessions = SessionRegistry::new(store);
        (AuthGate::new(tokens.clone(), sessions.clone()), tokens, sessions, dir)
    }

    async fn login(tokens: &TokenIssuer, sessions: &SessionRegistry, principal: &str, sid: &str) -> String {
        sessions
            .create(principal, sid, SessionMetadata::default(), TTL)
            .await
            .unwrap();
        tokens.issue(principal, sid, Role::User, TTL).unwrap()
    }

    #[tokio::test]
    async fn live_session_authenticates() {
        let (gate, tokens, sessions, _dir) = gate();
        let token = login(&tokens, &sessions, "p1", "s1").await;

        let user = gate.authenticate(&token).await.unwrap();
        assert_eq!(user.principal_id, "p1");
        assert_eq!(user.session_id, "s1");
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn superseded_session_is_expired() {
        let (gate, tokens, sessions, _dir) = gate();
        let first = login(&tokens, &sessions, "p1", "s1").await;
        let second = login(&tokens, &sessions, "p1", "s2").await;

        assert_eq!(gate.authenticate(&first).await, Err(AuthError::SessionExpired));
        assert!(gate.authenticate(&second).await.is_ok());
    }

    #[tokio::test]
    async fn revoked_session_is_expired() {
        let (gate, tokens, sessions, _dir) = gate();
        let token = login(&tokens, &sessions, "p1", "s1").await;
        sessions.revoke("s1", Some("p1")).await.unwrap();

        assert_eq!(gate.authenticate(&token).await, Err(AuthError::SessionExpired));
    }

    #[tokio::test]
    async fn session_owned_by_someone_else_is_expired() {
        let (gate, tokens, sessions, _dir) = gate();
        sessions
            .create("p1", "s1", SessionMetadata::default(), TTL)
            .await
            .unwrap();
        let forged = tokens.issue("p2", "s1", Role::Admin, TTL).unwrap();

        assert_eq!(gate.authenticate(&forged).await, Err(AuthError::SessionExpired));
    }

    #[tokio::test]
    async fn bad_tokens_are_invalid() {
        let (gate, tokens, _sessions, _dir) = gate();
        assert_eq!(gate.authenticate("garbage").await, Err(AuthError::InvalidToken));

        let step_up = tokens.issue_step_up("p1", Role::User).unwrap();
        assert_eq!(gate.authenticate(&step_up).await, Err(AuthError::InvalidToken));

        let other = TokenIssuer::new("ffffffffffffffffffffffffffffffff", TTL).unwrap();
        let foreign = other.issue("p1", "s1", Role::User, TTL).unwrap();
        assert_eq!(gate.authenticate(&foreign).await, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn missing_session_claim_is_malformed() {
        let (gate, tokens, _sessions, _dir) = gate();
        let token = tokens.issue("p1", "", Role::User, TTL).unwrap();
        assert_eq!(gate.authenticate(&token).await, Err(AuthError::MalformedClaims));
    }

    #[tokio::test]
    async fn unreadable_session_record_is_unavailable() {
        let (store, _dir) = temp_store();
        let tokens = TokenIssuer::new(SECRET, TTL).unwrap();
        let gate = AuthGate::new(tokens.clone(), SessionRegistry::new(store.clone()));

        store
            .run("corrupt", |db| {
                let write_txn = db.begin_write()?;
                {
                    let mut sessions = write_txn.open_table(SESSIONS)?;
                    sessions.insert("s1", b"not json".as_slice())?;
                }
                write_txn.commit()?;
                Ok::<_, StorageError>(())
            })
            .await
            .unwrap();

        let token = tokens.issue("p1", "s1", Role::User, TTL).unwrap();
        assert_eq!(gate.authenticate(&token).await, Err(AuthError::SessionUnavailable));
    }

    #[test]
    fn store_timeout_is_unavailable_not_expired() {
        // A single blocking thread lets the test hold the pool while the
        // session lookup waits behind it.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .max_blocking_threads(1)
            .build()
            .unwrap();

        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let store = Store::open(&dir.path().join("slow.redb"), Duration::from_millis(20)).unwrap();
            let tokens = TokenIssuer::new(SECRET, TTL).unwrap();
            let gate = AuthGate::new(tokens.clone(), SessionRegistry::new(store));

            let busy = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_millis(300)));
            let token = tokens.issue("p1", "s1", Role::User, TTL).unwrap();
            assert_eq!(gate.authenticate(&token).await, Err(AuthError::SessionUnavailable));
            busy.await.unwrap();
        });
    }

    #[tokio::test]
    async fn step_up_must_match_principal() {
        let (gate, tokens, _sessions, _dir) = gate();
        let user = AuthenticatedUser {
            principal_id: "p1".to_string(),
            role: Role::User,
            session_id: "s1".to_string(),
        };

        assert_eq!(gate.verify_step_up(&user, None), Err(AuthError::StepUpRequired));

        let own = tokens.issue_step_up("p1", Role::User).unwrap();
        assert!(gate.verify_step_up(&user, Some(&own)).is_ok());

        let foreign = tokens.issue_step_up("p2", Role::User).unwrap();
        assert_eq!(gate.verify_step_up(&user, Some(&foreign)), Err(AuthError::InvalidStepUp));

        let access = tokens.issue("p1", "s1", Role::User, TTL).unwrap();
        assert_eq!(gate.verify_step_up(&user, Some(&access)), Err(AuthError::InvalidStepUp));
    }
}
