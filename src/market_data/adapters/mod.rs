// Shared contracts for market data adapters

use std::sync::Arc;

use tokio::sync::watch;

use crate::engine::buffer::EventBuffer;
use crate::engine::types::{Snapshot, SyncResult};

/// One-shot point-in-time book fetch. No retry policy here; the caller
/// decides what to do with a failure.
#[async_trait::async_trait]
pub trait SnapshotFetcher {
    async fn fetch_snapshot(&self) -> SyncResult<Snapshot>;
}

/// Opens the diff stream and pushes decoded events into the buffer until the
/// stream closes, fails, or shutdown is signalled. Any failure after the
/// stream is open is terminal for the session.
#[async_trait::async_trait]
pub trait StreamReceiver {
    async fn run(
        &self,
        buffer: Arc<EventBuffer>,
        shutdown: watch::Receiver<bool>,
    ) -> SyncResult<()>;
}

// Make the Binance adapter visible
pub mod binance;
pub mod binance_types;
