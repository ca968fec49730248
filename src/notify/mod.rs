// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Notifications and Email
//!
//! Side channel for user-facing notices. Producers hand messages to a
//! [`Notifier`], which never blocks and never fails: a full or closed
//! outbox drops the message with a warning. The [`OutboxWorker`] persists
//! in-app notifications and hands emails to a [`Mailer`].
//!
//! Nothing here participates in ledger or session consistency; a lost
//! notification is logged and forgotten.

pub mod mailer;
pub mod worker;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::storage::Notification;

pub use mailer::{LogMailer, MailError, Mailer};
pub use worker::OutboxWorker;

/// Outbox capacity before messages are dropped.
pub const OUTBOX_CAPACITY: usize = 1024;

/// A message waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Notification(Notification),
    Email {
        to: String,
        subject: String,
        html: String,
    },
}

/// Cheap, cloneable producer handle.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Outbound>,
}

impl Notifier {
    /// Create a notifier and the receiving end for an [`OutboxWorker`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Record an in-app notification for `principal_id`.
    pub fn emit(
        &self,
        principal_id: &str,
        category: &str,
        subcategory: &str,
        title: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.enqueue(Outbound::Notification(Notification {
            id: uuid::Uuid::new_v4().to_string(),
            principal_id: principal_id.to_string(),
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
        }));
    }

    /// Queue an email. Delivery is best-effort.
    pub fn send_email(&self, to: &str, subject: impl Into<String>, html: impl Into<String>) {
        self.enqueue(Outbound::Email {
            to: to.to_string(),
            subject: subject.into(),
            html: html.into(),
        });
    }

    fn enqueue(&self, message: Outbound) {
        if let Err(e) = self.tx.try_send(message) {
            let kind = match e {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            tracing::warn!(outbox = kind, "Dropping outbound notification");
        }
    }
}
