// Binance spot depth adapter: one-shot REST snapshot + @depth diff stream

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use super::binance_types::{DepthSnapshot, DepthUpdateEvent};
use super::{SnapshotFetcher, StreamReceiver};
use crate::config::Config;
use crate::engine::buffer::EventBuffer;
use crate::engine::types::{Snapshot, SyncError, SyncResult};

pub struct BinanceAdapter {
    pub symbol: String,   // e.g. "BNBBTC"
    pub rest_url: String, // "https://api.binance.com"
    pub ws_url: String,   // "wss://stream.binance.com:9443"
    pub depth_limit: u32,
    client: reqwest::Client,
}

impl BinanceAdapter {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            rest_url: "https://api.binance.com".into(),
            ws_url: "wss://stream.binance.com:9443".into(),
            depth_limit: 1000,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            symbol: config.symbol.to_uppercase(),
            rest_url: config.rest_url.clone(),
            ws_url: config.ws_url.clone(),
            depth_limit: config.depth_limit,
            client: reqwest::Client::new(),
        }
    }

    fn snapshot_endpoint(&self) -> String {
        format!(
            "{}/api/v3/depth?symbol={}&limit={}",
            self.rest_url, self.symbol, self.depth_limit
        )
    }

    fn stream_endpoint(&self) -> String {
        format!("{}/ws/{}@depth", self.ws_url, self.symbol.to_lowercase())
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for BinanceAdapter {
    async fn fetch_snapshot(&self) -> SyncResult<Snapshot> {
        let url = self.snapshot_endpoint();
        debug!(%url, "Fetching depth snapshot");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let wire: DepthSnapshot = response.json().await?;

        info!(
            last_update_id = wire.last_update_id,
            bids = wire.bids.len(),
            asks = wire.asks.len(),
            "Depth snapshot fetched"
        );
        Ok(wire.into())
    }
}

#[async_trait::async_trait]
impl StreamReceiver for BinanceAdapter {
    async fn run(
        &self,
        buffer: Arc<EventBuffer>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SyncResult<()> {
        let endpoint = self.stream_endpoint();
        let (ws_stream, response) = connect_async(&endpoint).await?;
        info!(%endpoint, status = %response.status(), "Depth stream connected");

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A closed channel counts as shutdown; polling Err in a
                    // loop would spin hot
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, closing depth stream");
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
                msg = read.next() => match msg {
                    None => return Err(SyncError::StreamClosed),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(Message::Text(text))) => {
                        let wire: DepthUpdateEvent = serde_json::from_str(&text)?;
                        if wire.event_type != "depthUpdate" {
                            trace!(event_type = %wire.event_type, "Ignoring non-depth event");
                            continue;
                        }
                        buffer.push(wire.into());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!(?frame, "Depth stream closed by server");
                        return Err(SyncError::StreamClosed);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        write.send(Message::Pong(payload)).await?;
                    }
                    Some(Ok(other)) => {
                        trace!(?other, "Ignoring non-text frame");
                    }
                }
            }
        }
    }
}
