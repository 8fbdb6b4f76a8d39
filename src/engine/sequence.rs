use tracing::{debug, warn};

use crate::engine::types::{DiffEvent, SyncError, SyncResult};

/// Where the validator sits relative to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Snapshot seeded, waiting for the first event that straddles
    /// `baseline + 1`.
    AwaitingFirst,
    /// In lockstep with the feed; only `U == last_applied + 1` is legal.
    Synced,
    /// Terminal. The replica can no longer be proven consistent and this
    /// validator instance must be abandoned.
    Desynced,
}

/// Gap/duplicate detector for the diff stream.
///
/// The snapshot and the first useful event may overlap arbitrarily in
/// sequence space, so the first event is accepted iff its range covers the
/// point right after the snapshot. From then on events must be exactly
/// contiguous. The cursor (`last_applied_id`) only ever moves forward.
#[derive(Debug)]
pub struct SequenceValidator {
    state: SyncState,
    last_applied_id: u64,
}

impl SequenceValidator {
    pub fn new(baseline: u64) -> Self {
        debug!(baseline, "Sequence validator initialized");
        Self {
            state: SyncState::AwaitingFirst,
            last_applied_id: baseline,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Snapshot `last_update_id` until an event is accepted, then the
    /// `final_update_id` of the most recently accepted event.
    pub fn last_applied_id(&self) -> u64 {
        self.last_applied_id
    }

    /// Decide whether `event` is the legitimate next increment. Acceptance
    /// advances the cursor to `event.final_update_id`; rejection is terminal.
    pub fn validate(&mut self, event: &DiffEvent) -> SyncResult<()> {
        let accepted = match self.state {
            SyncState::AwaitingFirst => {
                event.first_update_id <= self.last_applied_id + 1
                    && event.final_update_id >= self.last_applied_id + 1
            }
            SyncState::Synced => event.first_update_id == self.last_applied_id + 1,
            SyncState::Desynced => false,
        };

        if !accepted {
            warn!(
                expected = self.last_applied_id + 1,
                first_update_id = event.first_update_id,
                final_update_id = event.final_update_id,
                state = ?self.state,
                "Event rejected, entering desynced state"
            );
            let expected = self.last_applied_id + 1;
            self.state = SyncState::Desynced;
            return Err(SyncError::SequenceDesync {
                expected,
                first_update_id: event.first_update_id,
                final_update_id: event.final_update_id,
            });
        }

        self.state = SyncState::Synced;
        self.last_applied_id = event.final_update_id;
        Ok(())
    }
}
