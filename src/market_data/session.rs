// Session lifecycle: wires one snapshot + one diff stream into a reconciler

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::engine::buffer::EventBuffer;
use crate::engine::reconciler::{BookObserver, Reconciler};
use crate::engine::types::{SyncError, SyncResult};
use crate::market_data::adapters::{SnapshotFetcher, StreamReceiver};

/// Runs one snapshot + stream lifecycle to completion.
///
/// The stream task starts before the snapshot request so events accumulate
/// in the buffer while the fetch is in flight. Whichever way the session
/// ends (clean shutdown, desync, malformed data, transport failure, snapshot
/// fetch failure), the stream task is aborted and joined before this returns;
/// no task, socket, or buffer outlives the session.
pub async fn run_session<A>(
    adapter: Arc<A>,
    idle_poll: Duration,
    shutdown: watch::Receiver<bool>,
    observer: &mut dyn BookObserver,
) -> SyncResult<()>
where
    A: SnapshotFetcher + StreamReceiver + Send + Sync + 'static,
{
    let buffer = Arc::new(EventBuffer::new());

    let mut stream_task = tokio::spawn({
        let adapter = Arc::clone(&adapter);
        let buffer = Arc::clone(&buffer);
        let shutdown = shutdown.clone();
        async move { adapter.run(buffer, shutdown).await }
    });

    let snapshot = match adapter.fetch_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            // The session never got off the ground; take the stream down
            // with it instead of leaking the connection and a filling buffer
            stream_task.abort();
            let _ = (&mut stream_task).await;
            return Err(e);
        }
    };

    let mut reconciler = Reconciler::new(Arc::clone(&buffer), &snapshot, idle_poll);

    tokio::select! {
        stream_res = &mut stream_task => match stream_res {
            Ok(Ok(())) => Ok(()), // stream stopped on shutdown
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SyncError::StreamClosed),
        },
        rec_res = reconciler.run(shutdown.clone(), observer) => {
            stream_task.abort();
            let _ = (&mut stream_task).await;
            rec_res
        }
    }
}
