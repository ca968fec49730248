// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Sweeper
//!
//! Background task that periodically deletes expired session records and
//! stale principal pointers. Expired sessions already read as absent, so
//! the sweeper only reclaims space; correctness never depends on it.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SessionRegistry;

pub struct SessionSweeper {
    registry: SessionRegistry,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(registry: SessionRegistry, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Session sweeper starting");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session sweeper shutting down");
                    return;
                }
            }

            self.sweep_step().await;
        }
    }

    async fn sweep_step(&self) {
        match self.registry.purge_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Session sweeper: purged expired sessions"),
            Err(e) => warn!(error = %e, "Session sweeper: purge failed"),
        }
    }
}
