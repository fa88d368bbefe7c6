// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use quasar_bridge::{
    api::router,
    approval_queue::ApprovalQueue,
    broker::{AuthorizationSet, Broker},
    config::BridgeConfig,
    logging::init_tracing,
    protocol::NetworkInfo,
    state::AppState,
    storage::{FileStorage, StoragePaths},
    wallet::LocalWallet,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_tracing(config.log_format) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Quasar Bridge stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = FileStorage::new(StoragePaths::new(&config.data_dir));
    storage.initialize()?;
    let storage = Arc::new(storage);
    tracing::info!(data_dir = %config.data_dir.display(), "Storage initialized");

    let wallet = Arc::new(LocalWallet::open(
        storage.clone(),
        NetworkInfo {
            chain_id: config.chain_id.clone(),
            name: config.network_name.clone(),
        },
    )?);
    let authorization = Arc::new(AuthorizationSet::load(storage.clone())?);

    let (approvals, surface_events) = ApprovalQueue::new();
    let approvals = Arc::new(approvals);
    let broker = Arc::new(
        Broker::new(authorization, approvals.clone(), wallet.clone(), config.broker)
            .with_audit(storage.clone()),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(broker.clone().run_surface_events(surface_events, shutdown.clone()));

    let app = router(AppState::new(broker, approvals, wallet, storage));
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        connect_timeout_secs = config.broker.connect_timeout.as_secs(),
        transaction_timeout_secs = config.broker.transaction_timeout.as_secs(),
        "Quasar Bridge listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
                tracing::info!("Shutting down");
                shutdown.cancel();
            }
        })
        .await?;

    Ok(())
}
