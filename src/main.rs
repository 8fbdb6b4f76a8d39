use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use booksync_rs::config::Config;
use booksync_rs::engine::reconciler::LogObserver;
use booksync_rs::engine::types::SyncError;
use booksync_rs::market_data::adapters::binance::BinanceAdapter;
use booksync_rs::market_data::session::run_session;
use booksync_rs::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    telemetry::init_tracing("booksync_rs=info");
    telemetry::init_metrics();

    let config = Config::from_env();
    info!(symbol = %config.symbol, "Starting order book sync");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut observer = LogObserver;

    // A desync or transport failure ends the session but not the process:
    // back off, then rebuild from a fresh snapshot and stream.
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let adapter = Arc::new(BinanceAdapter::from_config(&config));
        match run_session(
            adapter,
            config.idle_poll(),
            shutdown_rx.clone(),
            &mut observer,
        )
        .await
        {
            Ok(()) => break, // clean shutdown
            Err(SyncError::SequenceDesync {
                expected,
                first_update_id,
                final_update_id,
            }) => {
                warn!(
                    expected,
                    first_update_id, final_update_id, "Sequence desync, resyncing from a fresh snapshot"
                );
            }
            Err(e) if e.is_transport() => {
                warn!(error = %e, "Transport failure, reconnecting");
            }
            Err(e) => {
                error!(error = %e, "Session failed on malformed data, resyncing");
            }
        }

        let mut shutdown = shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(config.resync_backoff()) => {}
            _ = shutdown.changed() => {}
        }
    }

    info!("Order book sync stopped");
    Ok(())
}
