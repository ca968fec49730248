// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Outbox Worker
//!
//! Drains the notifier channel: persists notifications and delivers email.
//! Failures are logged and the message is dropped; there are no retries.
//!
//! ## Shutdown
//!
//! On cancellation the worker delivers whatever is already queued, then
//! exits. It also exits once every [`super::Notifier`] has been dropped.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Mailer, Outbound};
use crate::storage::NotificationRepository;

pub struct OutboxWorker<M> {
    rx: mpsc::Receiver<Outbound>,
    notifications: NotificationRepository,
    mailer: M,
}

impl<M: Mailer> OutboxWorker<M> {
    pub fn new(rx: mpsc::Receiver<Outbound>, notifications: NotificationRepository, mailer: M) -> Self {
        Self {
            rx,
            notifications,
            mailer,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Outbox worker starting");

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(message) => self.deliver(message).await,
                    None => {
                        info!("Outbox worker: all producers closed");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    self.rx.close();
                    while let Some(message) = self.rx.recv().await {
                        self.deliver(message).await;
                    }
                    info!("Outbox worker shutting down");
                    return;
                }
            }
        }
    }

    async fn deliver(&self, message: Outbound) {
        match message {
            Outbound::Notification(notification) => {
                let principal_id = notification.principal_id.clone();
                if let Err(e) = self.notifications.insert(notification).await {
                    warn!(principal_id = %principal_id, error = %e, "Failed to persist notification");
                }
            }
            Outbound::Email { to, subject, html } => {
                if let Err(e) = self.mailer.send(&to, &subject, &html).await {
                    warn!(to = %to, subject = %subject, error = %e, "Failed to send email");
                }
            }
        }
    }
}
