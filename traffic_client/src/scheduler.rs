//! Sync scheduling.
//!
//! The render loop calls [`UpdateScheduler::tick`] once per frame. Every
//! `frames_per_cycle`-th tick the scheduler enters `Syncing`, and the caller
//! launches one sync cycle ([`run_cycle`]) as a detached task. Ticks never wait
//! on a cycle: a slow cycle simply overlaps with the next one, and whichever
//! completes last decides the mirror state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use traffic_shared::{entity::DynamicSnapshot, net::Stats};

use crate::fetcher::{FetchError, SimulationApi};

/// What the current frame has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Produce poses only.
    Rendering,
    /// Produce poses and launch a sync cycle.
    Syncing,
}

/// Frame-counted two-state scheduler.
#[derive(Debug, Clone)]
pub struct UpdateScheduler {
    frames_per_cycle: u32,
    frame: u64,
    since_reconcile: u32,
    state: SyncState,
    next_cycle: u64,
    last_applied: Option<u64>,
}

impl UpdateScheduler {
    pub fn new(frames_per_cycle: u32) -> Self {
        Self {
            frames_per_cycle: frames_per_cycle.max(1),
            frame: 0,
            since_reconcile: 0,
            state: SyncState::Rendering,
            next_cycle: 0,
            last_applied: None,
        }
    }

    pub fn frames_per_cycle(&self) -> u32 {
        self.frames_per_cycle
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Frames since the last applied snapshot, the interpolator's clock.
    pub fn frames_since_reconcile(&self) -> u32 {
        self.since_reconcile
    }

    /// Advances one frame and reports whether this frame syncs.
    pub fn tick(&mut self) -> SyncState {
        self.frame += 1;
        self.since_reconcile = self.since_reconcile.saturating_add(1);
        self.state = if self.frame % u64::from(self.frames_per_cycle) == 0 {
            SyncState::Syncing
        } else {
            SyncState::Rendering
        };
        self.state
    }

    /// Hands out the number of the cycle about to be launched.
    pub fn begin_cycle(&mut self) -> u64 {
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        cycle
    }

    /// Records that `cycle`'s snapshot was applied and restarts the
    /// interpolation clock.
    ///
    /// Returns `false` when a newer cycle had already been applied. The
    /// snapshot is applied regardless; overlapping cycles are not ordered.
    pub fn mark_applied(&mut self, cycle: u64) -> bool {
        self.since_reconcile = 0;
        let in_order = self.last_applied.map_or(true, |last| cycle > last);
        if in_order {
            self.last_applied = Some(cycle);
        } else {
            debug!(
                cycle,
                last_applied = ?self.last_applied,
                "Sync cycle completed out of order"
            );
        }
        in_order
    }
}

/// Result of one sync cycle, delivered back to the render loop.
#[derive(Debug)]
pub struct SyncOutcome {
    pub cycle: u64,
    pub snapshot: Result<DynamicSnapshot, FetchError>,
    /// `None` when the stats fetch failed.
    pub stats: Option<Stats>,
}

/// One sync cycle: advance the simulation, then fetch the dynamic snapshot
/// if the tick went through, then refresh stats.
pub async fn run_cycle(api: &dyn SimulationApi, cycle: u64) -> SyncOutcome {
    let snapshot = match api.advance().await {
        Ok(()) => api.fetch_dynamic().await,
        Err(e) => Err(e),
    };
    if let Err(e) = &snapshot {
        warn!(cycle, error = %e, "Sync cycle produced no snapshot");
    }

    let stats = match api.fetch_stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(cycle, error = %e, "Stats fetch failed");
            None
        }
    };

    SyncOutcome {
        cycle,
        snapshot,
        stats,
    }
}

/// Launches [`run_cycle`] on the runtime behind `handle` and posts the outcome
/// to `tx`. Nothing waits on the returned task.
pub fn spawn_cycle(
    handle: &tokio::runtime::Handle,
    api: Arc<dyn SimulationApi>,
    cycle: u64,
    tx: mpsc::UnboundedSender<SyncOutcome>,
) {
    handle.spawn(async move {
        let outcome = run_cycle(api.as_ref(), cycle).await;
        // The receiver is gone only when the viewer itself was dropped.
        let _ = tx.send(outcome);
    });
}
