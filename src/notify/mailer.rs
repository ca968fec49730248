// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound email delivery seam.

use std::future::Future;

#[derive(Debug, thiserror::Error)]
#[error("email delivery failed: {0}")]
pub struct MailError(pub String);

/// Delivers rendered email. Implementations must be safe to call
/// concurrently from the outbox worker.
pub trait Mailer: Send + Sync + 'static {
    fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
    ) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// Default mailer: records each email as a structured log event.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        tracing::info!(to, subject, body_len = html.len(), "Email dispatched");
        Ok(())
    }
}
