use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::engine::buffer::EventBuffer;
use crate::engine::sequence::SequenceValidator;
use crate::engine::store::OrderBookStore;
use crate::engine::types::{DiffEvent, Snapshot, SyncResult};

/// Notified after each successfully applied event, on the reconciler's own
/// task. Implementations must return promptly; the reconcile loop never
/// waits on an observer.
pub trait BookObserver: Send {
    fn on_event_applied(&mut self, event: &DiffEvent, book: &OrderBookStore);
}

/// Observer that just logs the cursor and book depth.
#[derive(Debug, Default)]
pub struct LogObserver;

impl BookObserver for LogObserver {
    fn on_event_applied(&mut self, event: &DiffEvent, book: &OrderBookStore) {
        match book.extremes() {
            Some((low, high)) => info!(
                final_update_id = event.final_update_id,
                levels = book.len(),
                low_price = %low.price,
                low_qty = %low.quantity,
                high_price = %high.price,
                high_qty = %high.quantity,
                "Book updated"
            ),
            None => info!(
                final_update_id = event.final_update_id,
                levels = 0,
                "Book updated, now empty"
            ),
        }
    }
}

/// Snapshot of the replica forwarded to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookUpdate {
    pub last_applied_id: u64,
    pub levels: Vec<(Decimal, Decimal)>,
}

/// Forwards each applied update over a bounded channel with `try_send`: a
/// slow consumer drops updates instead of stalling reconciliation.
pub struct ChannelObserver {
    tx: mpsc::Sender<BookUpdate>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<BookUpdate>) -> Self {
        Self { tx }
    }
}

impl BookObserver for ChannelObserver {
    fn on_event_applied(&mut self, event: &DiffEvent, book: &OrderBookStore) {
        let update = BookUpdate {
            last_applied_id: event.final_update_id,
            levels: book.levels().map(|(p, q)| (*p, *q)).collect(),
        };
        if let Err(e) = self.tx.try_send(update) {
            warn!(error = %e, "Observer channel full or closed, dropping book update");
        }
    }
}

/// Drives the validate -> apply loop for one session.
///
/// Construction seeds the store from the snapshot, initializes the sequence
/// validator at `snapshot.last_update_id` and discards buffered events from
/// before the snapshot. [`run`] then drains the buffer until a desync, a
/// malformed event, or a shutdown signal. On shutdown, events still in the
/// buffer are discarded, not drained; whoever restarts the session fetches a
/// fresh snapshot anyway.
///
/// [`run`]: Reconciler::run
pub struct Reconciler {
    buffer: Arc<EventBuffer>,
    store: OrderBookStore,
    validator: SequenceValidator,
    idle_poll: Duration,
}

impl Reconciler {
    pub fn new(buffer: Arc<EventBuffer>, snapshot: &Snapshot, idle_poll: Duration) -> Self {
        let mut store = OrderBookStore::new();
        store.seed(snapshot);
        let validator = SequenceValidator::new(snapshot.last_update_id);

        let dropped = buffer.discard_stale(snapshot.last_update_id);
        counter!("booksync_events_discarded").increment(dropped as u64);
        debug!(
            baseline = snapshot.last_update_id,
            dropped, "Reconciler ready"
        );

        Self {
            buffer,
            store,
            validator,
            idle_poll,
        }
    }

    pub fn book(&self) -> &OrderBookStore {
        &self.store
    }

    pub fn last_applied_id(&self) -> u64 {
        self.validator.last_applied_id()
    }

    /// Loop until shutdown (Ok) or a session-fatal error. Idle waiting is
    /// wake-on-push with a bounded sleep as backstop, never a busy spin.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
        observer: &mut dyn BookObserver,
    ) -> SyncResult<()> {
        loop {
            if *shutdown.borrow() {
                info!(
                    pending = self.buffer.len(),
                    last_applied_id = self.last_applied_id(),
                    "Shutdown requested, stopping reconcile loop"
                );
                return Ok(());
            }

            match self.buffer.pop_oldest() {
                Some(event) => self.step(&event, observer)?,
                None => {
                    tokio::select! {
                        _ = self.buffer.notified() => {}
                        changed = shutdown.changed() => {
                            // A dropped sender means no one can ever signal
                            // shutdown; stop instead of spinning on Err
                            if changed.is_err() {
                                info!(
                                    last_applied_id = self.last_applied_id(),
                                    "Shutdown channel closed, stopping reconcile loop"
                                );
                                return Ok(());
                            }
                        }
                        _ = tokio::time::sleep(self.idle_poll) => {}
                    }
                }
            }
        }
    }

    fn step(&mut self, event: &DiffEvent, observer: &mut dyn BookObserver) -> SyncResult<()> {
        if let Err(e) = self.validator.validate(event) {
            counter!("booksync_desyncs").increment(1);
            return Err(e);
        }

        self.store.apply_event(event)?;
        counter!("booksync_events_applied").increment(1);
        gauge!("booksync_book_levels").set(self.store.len() as f64);

        observer.on_event_applied(event, &self.store);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{PriceLevel, SyncError};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn level(price: &str, qty: &str) -> PriceLevel {
        PriceLevel::new(dec(price), dec(qty))
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            last_update_id: 100,
            bids: vec![level("10.0", "5")],
            asks: vec![level("11.0", "3")],
        }
    }

    fn event(first: u64, last: u64, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> DiffEvent {
        DiffEvent {
            first_update_id: first,
            final_update_id: last,
            bids,
            asks,
        }
    }

    struct CountingObserver {
        applied: Vec<u64>,
    }

    impl BookObserver for CountingObserver {
        fn on_event_applied(&mut self, event: &DiffEvent, _book: &OrderBookStore) {
            self.applied.push(event.final_update_id);
        }
    }

    #[test]
    fn test_construction_discards_stale_buffered_events() {
        let buffer = Arc::new(EventBuffer::new());
        buffer.push(event(95, 100, vec![level("10.0", "99")], vec![]));
        buffer.push(event(101, 101, vec![], vec![]));

        let rec = Reconciler::new(Arc::clone(&buffer), &snapshot(), Duration::from_millis(10));

        // Stale event gone, live one untouched; store still equals the snapshot
        assert_eq!(buffer.len(), 1);
        assert_eq!(rec.book().quantity_at(&dec("10.0")), Some(dec("5")));
        assert_eq!(rec.last_applied_id(), 100);
    }

    #[test]
    fn test_step_applies_and_notifies() {
        let buffer = Arc::new(EventBuffer::new());
        let mut rec = Reconciler::new(buffer, &snapshot(), Duration::from_millis(10));
        let mut observer = CountingObserver { applied: vec![] };

        rec.step(
            &event(101, 102, vec![level("9.9", "1")], vec![]),
            &mut observer,
        )
        .unwrap();

        assert_eq!(rec.last_applied_id(), 102);
        assert_eq!(rec.book().quantity_at(&dec("9.9")), Some(dec("1")));
        assert_eq!(observer.applied, vec![102]);
    }

    #[test]
    fn test_step_desync_leaves_store_untouched() {
        let buffer = Arc::new(EventBuffer::new());
        let mut rec = Reconciler::new(buffer, &snapshot(), Duration::from_millis(10));
        let mut observer = CountingObserver { applied: vec![] };

        let err = rec
            .step(
                &event(102, 105, vec![level("10.0", "0")], vec![]),
                &mut observer,
            )
            .unwrap_err();

        assert!(matches!(err, SyncError::SequenceDesync { expected: 101, .. }));
        assert_eq!(rec.book().quantity_at(&dec("10.0")), Some(dec("5")));
        assert_eq!(rec.book().len(), 2);
        assert_eq!(rec.last_applied_id(), 100);
        assert!(observer.applied.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let buffer = Arc::new(EventBuffer::new());
        // Stale event first, then two live ones emptying the book
        buffer.push(event(95, 100, vec![level("10.0", "42")], vec![]));
        buffer.push(event(101, 101, vec![level("10.0", "0")], vec![]));
        buffer.push(event(102, 103, vec![], vec![level("11.0", "0")]));

        let mut rec = Reconciler::new(Arc::clone(&buffer), &snapshot(), Duration::from_millis(5));
        let mut observer = CountingObserver { applied: vec![] };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let driver = async {
            while !buffer.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown_tx.send(true).unwrap();
        };

        let (result, _) = tokio::join!(rec.run(shutdown_rx, &mut observer), driver);
        result.unwrap();

        assert!(rec.book().is_empty());
        assert_eq!(rec.last_applied_id(), 103);
        assert_eq!(observer.applied, vec![101, 103]);
    }

    #[tokio::test]
    async fn test_run_returns_desync_error() {
        let buffer = Arc::new(EventBuffer::new());
        buffer.push(event(102, 105, vec![], vec![]));

        let mut rec = Reconciler::new(Arc::clone(&buffer), &snapshot(), Duration::from_millis(5));
        let mut observer = CountingObserver { applied: vec![] };
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let err = rec.run(shutdown_rx, &mut observer).await.unwrap_err();
        assert!(matches!(err, SyncError::SequenceDesync { .. }));
        // Replica still equals the seeded snapshot
        assert_eq!(rec.book().len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_observed_while_idle() {
        let buffer = Arc::new(EventBuffer::new());
        let mut rec = Reconciler::new(buffer, &snapshot(), Duration::from_secs(60));
        let mut observer = CountingObserver { applied: vec![] };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let driver = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown_tx.send(true).unwrap();
        };

        // Idle poll is 60s; promptness has to come from the watch channel
        let result = tokio::time::timeout(Duration::from_secs(2), async {
            let (r, _) = tokio::join!(rec.run(shutdown_rx, &mut observer), driver);
            r
        })
        .await
        .expect("shutdown not observed promptly");
        result.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_idle_loop() {
        let buffer = Arc::new(EventBuffer::new());
        let mut rec = Reconciler::new(buffer, &snapshot(), Duration::from_secs(60));
        let mut observer = CountingObserver { applied: vec![] };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        // Nobody can ever flip the flag; the loop must stop rather than
        // spin on a closed channel
        tokio::time::timeout(Duration::from_secs(1), rec.run(shutdown_rx, &mut observer))
            .await
            .expect("loop kept running after sender dropped")
            .unwrap();
    }

    #[test]
    fn test_channel_observer_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut observer = ChannelObserver::new(tx);
        let mut book = OrderBookStore::new();
        book.seed(&snapshot());

        let ev = event(101, 101, vec![], vec![]);
        observer.on_event_applied(&ev, &book);
        let ev2 = event(102, 102, vec![], vec![]);
        // Channel is full; this must return immediately without blocking
        observer.on_event_applied(&ev2, &book);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.last_applied_id, 101);
        assert_eq!(first.levels.len(), 2);
        assert!(rx.try_recv().is_err());
    }
}
