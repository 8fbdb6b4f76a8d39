use std::time::Duration;

/// Runtime settings, read once at startup from the environment (a `.env`
/// file is honoured via dotenvy in `main`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Trading pair to replicate, e.g. "BNBBTC".
    pub symbol: String,
    /// Base URL for the snapshot REST endpoint.
    pub rest_url: String,
    /// Base URL for the websocket diff stream.
    pub ws_url: String,
    /// Snapshot depth limit (number of levels per side).
    pub depth_limit: u32,
    /// Upper bound on the reconciler's idle wait between buffer polls (ms).
    pub idle_poll_ms: u64,
    /// Pause before restarting a session after a desync or transport failure (ms).
    pub resync_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "BNBBTC".to_string(),
            rest_url: "https://api.binance.com".to_string(),
            ws_url: "wss://stream.binance.com:9443".to_string(),
            depth_limit: 1000,
            idle_poll_ms: 100,
            resync_backoff_ms: 2000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("BOOKSYNC_SYMBOL") {
            cfg.symbol = v;
        }
        if let Ok(v) = std::env::var("BOOKSYNC_REST_URL") {
            cfg.rest_url = v;
        }
        if let Ok(v) = std::env::var("BOOKSYNC_WS_URL") {
            cfg.ws_url = v;
        }
        if let Ok(v) = std::env::var("BOOKSYNC_DEPTH_LIMIT") {
            if let Ok(n) = v.parse() {
                cfg.depth_limit = n;
            }
        }
        if let Ok(v) = std::env::var("BOOKSYNC_IDLE_POLL_MS") {
            if let Ok(ms) = v.parse() {
                cfg.idle_poll_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("BOOKSYNC_RESYNC_BACKOFF_MS") {
            if let Ok(ms) = v.parse() {
                cfg.resync_backoff_ms = ms;
            }
        }

        cfg
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn resync_backoff(&self) -> Duration {
        Duration::from_millis(self.resync_backoff_ms)
    }
}
