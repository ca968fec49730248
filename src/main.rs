// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use coldasset_server::{
    api::router,
    config::ServerConfig,
    logging::{init_logging, LogFormat},
    notify::{LogMailer, Notifier, OutboxWorker, OUTBOX_CAPACITY},
    session::sweeper::SessionSweeper,
    state::AppState,
    storage::Store,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_logging(LogFormat::from_env());

    let config = ServerConfig::from_env()?;
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Store::open(&config.database_path(), config.store_timeout)?;
    tracing::info!(path = %config.database_path().display(), "Database opened");

    let (notifier, outbox) = Notifier::channel(OUTBOX_CAPACITY);
    let state = AppState::new(&config, store, notifier)?;

    if let Some(seed) = &config.admin_seed {
        state.seed_super_admin(seed).await?;
    }

    // Background tasks stop on the shared token after the server drains.
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(
        SessionSweeper::new(state.sessions.clone(), config.sweep_interval).run(shutdown.clone()),
    );
    let outbox_worker = tokio::spawn(
        OutboxWorker::new(outbox, state.notifications.clone(), LogMailer).run(shutdown.clone()),
    );

    let app = router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Cold Asset server listening (docs at /docs)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, shutting down background tasks");
    shutdown.cancel();
    for (name, task) in [("session_sweeper", sweeper), ("outbox_worker", outbox_worker)] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "Background task panicked");
        }
    }

    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received, draining connections");
}
