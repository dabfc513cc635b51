// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use relational_custody_server::{
    api::router,
    assets::AssetCatalog,
    clock::SystemClock,
    config::{AppConfig, ConfigError, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    custody::{CustodyError, FireblocksClient, RequestSigner},
    market_data::{CmcClient, KeyPool, MarketDataError, QuoteGateway},
    state::AppState,
    storage::{ReconciliationError, ReconciliationStore},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open reconciliation store: {0}")]
    Store(#[from] ReconciliationError),

    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    let assets = AssetCatalog::for_stage(&config.stage);
    info!(
        stage = %config.stage,
        assets = assets.assets().len(),
        market_data_keys = config.market_data_keys.len(),
        "Configuration loaded"
    );

    let db_path = config.reconciliation_db_path();
    let store = Arc::new(ReconciliationStore::open(&db_path)?);
    let unresolved = store.list_unresolved()?.len();
    if unresolved > 0 {
        warn!(
            target: "reconciliation",
            unresolved,
            "Partial withdrawals awaiting reconciliation"
        );
    }
    info!(path = %db_path.display(), "Reconciliation store opened");

    let key_pool = Arc::new(KeyPool::new(config.market_data_keys.iter().cloned()));
    let market_data = CmcClient::new(config.market_data_base_url.as_str(), key_pool.clone())?;
    let quotes = Arc::new(QuoteGateway::new(market_data, Arc::new(SystemClock)));

    let signer = RequestSigner::from_pem(
        config.signer.api_key.as_str(),
        &config.signer.private_key_pem,
    )?;
    let viewer = RequestSigner::from_pem(
        config.viewer.api_key.as_str(),
        &config.viewer.private_key_pem,
    )?;
    let custody = Arc::new(FireblocksClient::new(
        config.custody_base_url.as_str(),
        signer,
        viewer,
    )?);

    let shutdown = CancellationToken::new();
    tokio::spawn(key_pool.run_resets(shutdown.clone()));

    // Warm the identifier map so the first search does not pay for it.
    let warm_quotes = quotes.clone();
    tokio::spawn(async move {
        match warm_quotes.identifier_map().await {
            Ok(map) => info!(entries = map.len(), "Identifier map warmed"),
            Err(err) => warn!(error = %err, "Identifier map warm-up failed; will retry on demand"),
        }
    });

    let state = AppState::new(quotes, custody, store, assets, config.fee_vault_id.as_str());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Relational custody server listening (docs at /docs)");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!(error = %err, "Failed to listen for shutdown signal"),
        }
        signal_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    info!("Server stopped");
    Ok(())
}
