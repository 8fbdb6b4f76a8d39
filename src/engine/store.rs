use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use crate::engine::types::{DiffEvent, PriceLevel, Snapshot, SyncError, SyncResult};

/// The local book replica: a side-agnostic price -> quantity map.
///
/// The diff feed never legally puts the same price on both sides at once, so
/// a single map matches the wire contract; `is_bid` on [`apply_levels`] only
/// routes tracing. Mutation happens exclusively on the reconciler's task.
///
/// [`apply_levels`]: OrderBookStore::apply_levels
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OrderBookStore {
    levels: BTreeMap<Decimal, Decimal>,
}

impl OrderBookStore {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Drop any existing state and repopulate from a snapshot. Snapshot
    /// quantities are positive by construction, but a zero slipping through
    /// would just be skipped rather than stored.
    pub fn seed(&mut self, snapshot: &Snapshot) {
        self.levels.clear();
        for level in snapshot.bids.iter().chain(snapshot.asks.iter()) {
            if level.quantity > Decimal::ZERO {
                self.levels.insert(level.price, level.quantity);
            }
        }
        debug!(
            last_update_id = snapshot.last_update_id,
            levels = self.levels.len(),
            "Seeded book from snapshot"
        );
    }

    /// Upsert-or-delete for one batch of updates. Quantity > 0 overwrites
    /// (never increments); quantity == 0 removes the level, silently if it
    /// was already absent; quantity < 0 is malformed feed data.
    pub fn apply_levels(&mut self, updates: &[PriceLevel], is_bid: bool) -> SyncResult<()> {
        for level in updates {
            if level.quantity < Decimal::ZERO {
                warn!(price = %level.price, quantity = %level.quantity, "Negative quantity in update");
                return Err(SyncError::MalformedData(format!(
                    "negative quantity {} at price {}",
                    level.quantity, level.price
                )));
            }
            if level.quantity == Decimal::ZERO {
                let removed = self.levels.remove(&level.price).is_some();
                trace!(price = %level.price, removed, side = side_str(is_bid), "Delete level");
            } else {
                self.levels.insert(level.price, level.quantity);
                trace!(price = %level.price, quantity = %level.quantity, side = side_str(is_bid), "Upsert level");
            }
        }
        Ok(())
    }

    /// Apply one diff event as a single logical step: all bid updates, then
    /// all ask updates. Callers must not interleave other mutations.
    pub fn apply_event(&mut self, event: &DiffEvent) -> SyncResult<()> {
        self.apply_levels(&event.bids, true)?;
        self.apply_levels(&event.asks, false)?;
        debug!(
            first_update_id = event.first_update_id,
            final_update_id = event.final_update_id,
            levels = self.levels.len(),
            "Applied diff event"
        );
        Ok(())
    }

    pub fn quantity_at(&self, price: &Decimal) -> Option<Decimal> {
        self.levels.get(price).copied()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Price-ascending iteration over all levels.
    pub fn levels(&self) -> impl Iterator<Item = (&Decimal, &Decimal)> {
        self.levels.iter()
    }

    /// Cheapest and dearest levels, for observers and logging. The map is
    /// side-agnostic, so these are price extremes, not a true best bid/offer.
    pub fn extremes(&self) -> Option<(PriceLevel, PriceLevel)> {
        let (low_price, low_qty) = self.levels.first_key_value()?;
        let (high_price, high_qty) = self.levels.last_key_value()?;
        Some((
            PriceLevel::new(*low_price, *low_qty),
            PriceLevel::new(*high_price, *high_qty),
        ))
    }
}

fn side_str(is_bid: bool) -> &'static str {
    if is_bid {
        "bid"
    } else {
        "ask"
    }
}
