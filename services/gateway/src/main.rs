mod auth;
mod error;
mod handlers;
mod models;
mod router;
mod settings;
mod state;

use anyhow::Context;
use chrono::Utc;
use persistence::{JournalConfig, LedgerDb};
use router::create_router;
use settings::GatewayConfig;
use settlement::{ReservationSweeper, SettlementCoordinator};
use state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gateway=debug,settlement=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Gateway API service");

    let config_file = std::env::args().nth(1).map(PathBuf::from);
    let config = GatewayConfig::load(config_file.as_deref()).context("loading configuration")?;

    // Recover the ledger before serving anything
    let store = match &config.journal_dir {
        Some(dir) => LedgerDb::open(JournalConfig::new(dir))
            .with_context(|| format!("opening ledger journal in {}", dir.display()))?,
        None => {
            tracing::warn!("No journal_dir configured, ledger is kept in memory only");
            LedgerDb::in_memory()
        }
    };
    let coordinator = SettlementCoordinator::with_config(store, config.settlement.clone());
    let house = coordinator
        .ensure_house_account(&config.house.currency, config.house.opening_balance)
        .context("resolving house account")?;
    tracing::info!(account_id = %house.account_id, balance = %house.balance, "House account ready");

    let state = AppState::new(Arc::new(coordinator), &config.jwt_secret);
    let sweeper = spawn_sweeper(state.clone(), config.sweep_interval());

    let app = create_router(state.clone());

    let listener = TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    state.coordinator.store().sync()?;
    tracing::info!("Ledger synced, gateway stopped");

    Ok(())
}

/// Periodically cancel open orders whose reservations have expired.
fn spawn_sweeper(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match state
                .run(|c| ReservationSweeper::new(c).sweep(Utc::now()))
                .await
            {
                Ok(canceled) if !canceled.is_empty() => {
                    tracing::info!(count = canceled.len(), "Canceled orders with expired reservations");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Reservation sweep failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
