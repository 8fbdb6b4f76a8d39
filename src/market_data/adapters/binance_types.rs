// Source: GET /api/v3/depth (snapshot) and wss <symbol>@depth (diff stream)

use rust_decimal::Decimal;

use crate::engine::types::{DiffEvent, PriceLevel, Snapshot};

// Levels arrive as ["price", "qty"] string pairs; rust_decimal parses the
// strings exactly, no float round-trip.
pub type WireLevel = (Decimal, Decimal);

#[derive(Debug, serde::Deserialize)]
pub struct DepthSnapshot {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<WireLevel>,
    pub asks: Vec<WireLevel>,
}

#[derive(Debug, serde::Deserialize)]
pub struct DepthUpdateEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub final_update_id: u64,
    #[serde(rename = "b")]
    pub bids: Vec<WireLevel>,
    #[serde(rename = "a")]
    pub asks: Vec<WireLevel>,
}

fn levels(wire: Vec<WireLevel>) -> Vec<PriceLevel> {
    wire.into_iter()
        .map(|(price, quantity)| PriceLevel::new(price, quantity))
        .collect()
}

impl From<DepthSnapshot> for Snapshot {
    fn from(wire: DepthSnapshot) -> Self {
        Snapshot {
            last_update_id: wire.last_update_id,
            bids: levels(wire.bids),
            asks: levels(wire.asks),
        }
    }
}

impl From<DepthUpdateEvent> for DiffEvent {
    fn from(wire: DepthUpdateEvent) -> Self {
        DiffEvent {
            first_update_id: wire.first_update_id,
            final_update_id: wire.final_update_id,
            bids: levels(wire.bids),
            asks: levels(wire.asks),
        }
    }
}
