//! Viewer implementation.
//!
//! The viewer maintains:
//! - A handle to the simulation server ([`SimulationApi`])
//! - The entity mirror and static registry
//! - The frame-counted sync scheduler
//! - A channel on which detached sync cycles report back
//! - The latest stats counters
//!
//! All mirror mutation happens on the thread calling [`TrafficViewer::frame`].
//! Sync cycles run elsewhere and only post messages, so a snapshot is always
//! applied in full before the next poses are computed.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{runtime::Handle, sync::mpsc};
use tracing::{info, warn};
use traffic_shared::{
    config::ViewerConfig, layout::MapLayout, net::Stats, render::RenderDriver,
};

use crate::{
    fetcher::{HttpFetcher, SimulationApi},
    interp,
    mirror::{EntityMirror, StaticRegistry},
    scheduler::{spawn_cycle, SyncOutcome, SyncState, UpdateScheduler},
};

/// What happened during one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub state: SyncState,
    pub vehicles: usize,
    /// Sync outcomes applied at the start of this frame.
    pub applied: usize,
}

/// High-level viewer client.
pub struct TrafficViewer {
    api: Arc<dyn SimulationApi>,
    runtime: Handle,
    pub mirror: EntityMirror,
    pub statics: StaticRegistry,
    scheduler: UpdateScheduler,
    outcomes_tx: mpsc::UnboundedSender<SyncOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<SyncOutcome>,
    stats: Option<Stats>,
    grid: Option<(u32, u32)>,
    failed_cycles: u64,
}

impl TrafficViewer {
    /// Builds a viewer over any server implementation. Sync cycles are
    /// spawned on `runtime`.
    pub fn new(api: Arc<dyn SimulationApi>, cfg: &ViewerConfig, runtime: Handle) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            api,
            runtime,
            mirror: EntityMirror::new(cfg.color_seed),
            statics: StaticRegistry::default(),
            scheduler: UpdateScheduler::new(cfg.cycle_len()),
            outcomes_tx,
            outcomes_rx,
            stats: None,
            grid: None,
            failed_cycles: 0,
        }
    }

    /// Connects to the HTTP server named in `cfg` and runs [`Self::startup`].
    pub async fn connect(cfg: &ViewerConfig, layout: &MapLayout) -> anyhow::Result<Self> {
        info!(server = %cfg.server_url, "Connecting to simulation server");
        let fetcher = HttpFetcher::new(
            &cfg.server_url,
            cfg.request_timeout_ms.map(Duration::from_millis),
        )
        .context("build http fetcher")?;

        let mut viewer = Self::new(Arc::new(fetcher), cfg, Handle::current());
        viewer.startup(layout).await;
        Ok(viewer)
    }

    /// Sends the layout, installs static features and takes a first dynamic
    /// snapshot.
    ///
    /// Each step that fails is logged and skipped; an unreachable server
    /// leaves an empty but usable viewer.
    pub async fn startup(&mut self, layout: &MapLayout) {
        match self.api.initialize(layout).await {
            Ok(resp) => {
                if (resp.width as usize, resp.height as usize) != (layout.width(), layout.height())
                {
                    warn!(
                        server_width = resp.width,
                        server_height = resp.height,
                        width = layout.width(),
                        height = layout.height(),
                        "Server grid differs from local layout"
                    );
                }
                info!(width = resp.width, height = resp.height, message = %resp.message, "Model initialized");
                self.grid = Some((resp.width, resp.height));
            }
            Err(e) => warn!(error = %e, "Model initialization failed"),
        }

        match self.api.fetch_static().await {
            Ok(entities) => {
                let count = entities.len();
                if self.statics.install(entities) {
                    info!(entities = count, "Static features installed");
                }
            }
            Err(e) => warn!(error = %e, "Static fetch failed"),
        }

        let cycle = self.scheduler.begin_cycle();
        let snapshot = self.api.fetch_dynamic().await;
        let stats = self.api.fetch_stats().await.ok();
        self.apply(SyncOutcome {
            cycle,
            snapshot,
            stats,
        });
    }

    /// Merges one sync outcome. A failed outcome leaves the mirror untouched.
    pub fn apply(&mut self, outcome: SyncOutcome) -> bool {
        if let Some(stats) = outcome.stats {
            self.stats = Some(stats);
        }
        match outcome.snapshot {
            Ok(snap) => {
                self.scheduler.mark_applied(outcome.cycle);
                self.mirror.reconcile(&snap.vehicles);
                self.statics.update_signals(snap.signals);
                true
            }
            Err(e) => {
                self.failed_cycles += 1;
                warn!(cycle = outcome.cycle, error = %e, "No update this cycle");
                false
            }
        }
    }

    /// Applies every sync outcome that has arrived, without waiting.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.apply(outcome);
            applied += 1;
        }
        applied
    }

    /// Waits for the next sync outcome and applies it.
    ///
    /// Returns whether it carried a snapshot. Meant for lockstep drivers and
    /// tests; the frame loop itself never waits.
    pub async fn await_sync(&mut self) -> bool {
        match self.outcomes_rx.recv().await {
            Some(outcome) => self.apply(outcome),
            None => false,
        }
    }

    /// Renders one frame and, every `frames_per_cycle` frames, launches a
    /// sync cycle.
    pub fn frame(&mut self, driver: &mut dyn RenderDriver) -> FrameReport {
        let applied = self.pump();

        let poses = interp::poses(
            &mut self.mirror,
            self.scheduler.frames_since_reconcile(),
            self.scheduler.frames_per_cycle(),
        );

        driver.begin_frame(self.scheduler.frame());
        for entity in self.statics.iter() {
            driver.draw_static(entity);
        }
        for pose in &poses {
            driver.draw_vehicle(pose);
        }
        driver.end_frame();

        let frame = self.scheduler.frame();
        let state = self.scheduler.tick();
        if state == SyncState::Syncing {
            let cycle = self.scheduler.begin_cycle();
            spawn_cycle(
                &self.runtime,
                Arc::clone(&self.api),
                cycle,
                self.outcomes_tx.clone(),
            );
        }

        FrameReport {
            frame,
            state,
            vehicles: poses.len(),
            applied,
        }
    }

    /// Latest stats, if any fetch has succeeded.
    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    /// Grid size reported by the server at initialization.
    pub fn grid_size(&self) -> Option<(u32, u32)> {
        self.grid
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    /// Sync cycles that produced no snapshot.
    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles
    }
}
