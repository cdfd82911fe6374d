//! Observable idle/syncing/error state for status UIs.
//!
//! Uses `ArcSwap` for lock-free status reads and a `watch` channel to push
//! transitions to subscribers. Purely observational: nothing in the
//! resolver reads this state back.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use stratum_core::{ClockSource, SyncState, SyncStatus};
use tokio::sync::watch;

/// Tracks the sync state across concurrent resolver and sweep operations.
///
/// State machine: Idle -> Syncing -> (Idle | Error). `Error` is sticky
/// until a later operation completes with at least one tier succeeding.
pub struct SyncStateTracker {
    status: ArcSwap<SyncStatus>,
    inner: Mutex<Inner>,
    notify: watch::Sender<SyncStatus>,
    clock: Arc<dyn ClockSource>,
}

#[derive(Default)]
struct Inner {
    in_flight: usize,
    /// Settled state to report once nothing is in flight.
    settled: SyncState,
    last_synced_at: Option<u64>,
    last_error: Option<String>,
}

impl SyncStateTracker {
    /// Creates a tracker in the `Idle` state.
    #[must_use]
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        let (notify, _rx) = watch::channel(SyncStatus::default());
        Self {
            status: ArcSwap::from_pointee(SyncStatus::default()),
            inner: Mutex::new(Inner::default()),
            notify,
            clock,
        }
    }

    /// Marks the start of an operation.
    ///
    /// The returned guard must be [`finish`](SyncGuard::finish)ed; dropping
    /// it unfinished releases the slot without recording an outcome.
    #[must_use]
    pub fn begin(&self) -> SyncGuard<'_> {
        let mut inner = self.inner.lock();
        inner.in_flight += 1;
        self.publish(&inner);
        SyncGuard {
            tracker: self,
            done: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        SyncStatus::clone(&self.status.load())
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.status.load().state
    }

    #[must_use]
    pub fn last_synced_at(&self) -> Option<u64> {
        self.status.load().last_synced_at
    }

    /// Whether a non-blocking warning should be shown.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.state() == SyncState::Error
    }

    /// Receiver notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.notify.subscribe()
    }

    fn complete(&self, outcome: Option<Result<(), String>>) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        match outcome {
            Some(Ok(())) => {
                inner.settled = SyncState::Idle;
                inner.last_synced_at = Some(self.clock.now());
                inner.last_error = None;
            }
            Some(Err(message)) => {
                inner.settled = SyncState::Error;
                inner.last_error = Some(message);
            }
            None => {}
        }
        self.publish(&inner);
    }

    fn publish(&self, inner: &Inner) {
        let state = if inner.in_flight > 0 {
            SyncState::Syncing
        } else {
            inner.settled
        };
        let status = SyncStatus {
            state,
            last_synced_at: inner.last_synced_at,
            last_error: inner.last_error.clone(),
        };
        self.status.store(Arc::new(status.clone()));
        // send_replace stores the value even when no receiver is alive.
        self.notify.send_replace(status);
    }
}

/// RAII handle for one in-flight operation.
pub struct SyncGuard<'a> {
    tracker: &'a SyncStateTracker,
    done: bool,
}

impl SyncGuard<'_> {
    /// Records the operation outcome.
    ///
    /// `any_tier_succeeded = false` moves the tracker to `Error` with
    /// `message`.
    pub fn finish(mut self, any_tier_succeeded: bool, message: impl Into<String>) {
        self.done = true;
        let outcome = if any_tier_succeeded {
            Ok(())
        } else {
            Err(message.into())
        };
        self.tracker.complete(Some(outcome));
    }

    pub fn succeed(self) {
        self.finish(true, String::new());
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.tracker.complete(None);
        }
    }
}
