use rust_decimal::Decimal;
use thiserror::Error;

// One (price, quantity) pair. Quantity zero is a deletion marker on the
// wire, never a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

// Point-in-time full book listing from the REST endpoint. Consumed exactly
// once to seed the store; last_update_id is the sequence baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub last_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

// Incremental batch of level changes covering the inclusive sequence range
// [first_update_id, final_update_id].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEvent {
    pub first_update_id: u64,
    pub final_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("rest transport failure: {0}")]
    Rest(#[from] reqwest::Error),

    #[error("websocket transport failure: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("stream closed by remote")]
    StreamClosed,

    #[error("sequence desync: expected first_update_id {expected}, got event [{first_update_id}, {final_update_id}]")]
    SequenceDesync {
        expected: u64,
        first_update_id: u64,
        final_update_id: u64,
    },

    #[error("malformed data: {0}")]
    MalformedData(String),
}

impl SyncError {
    /// Transport faults call for a reconnect; everything else means the local
    /// replica itself can no longer be trusted.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::Rest(_) | SyncError::Ws(_) | SyncError::StreamClosed
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::MalformedData(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desync_is_not_transport() {
        let err = SyncError::SequenceDesync {
            expected: 101,
            first_update_id: 102,
            final_update_id: 105,
        };
        assert!(!err.is_transport());
    }

    #[test]
    fn test_malformed_is_not_transport() {
        assert!(!SyncError::MalformedData("bad qty".into()).is_transport());
    }

    #[test]
    fn test_stream_closed_is_transport() {
        assert!(SyncError::StreamClosed.is_transport());
    }

    #[test]
    fn test_price_level_equality_is_exact() {
        // 10.0 and 10.00 are the same decimal value
        let a = PriceLevel::new(Decimal::new(100, 1), Decimal::new(5, 0));
        let b = PriceLevel::new(Decimal::new(1000, 2), Decimal::new(5, 0));
        assert_eq!(a, b);
    }
}
