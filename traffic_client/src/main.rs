//! Standalone headless viewer binary.
//!
//! Usage:
//!   cargo run -p traffic_client --bin viewer -- [--config viewer.json]
//!       [--url http://localhost:8585/] [--frames-per-cycle 5] [--fps 60]
//!       [--layout city.txt] [--seed 7] [--frames 600]
//!
//! The viewer sends the city layout to the simulation server, then renders
//! frames at a fixed rate, syncing with the server every few frames. Frame
//! summaries and stats are logged; set `RUST_LOG=debug` for per-cycle detail.

use std::{env, str::FromStr};
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use traffic_client::TrafficViewer;
use traffic_shared::{config::ViewerConfig, layout::MapLayout, render::TraceRenderer};

/// Parses a flag value, warning and returning `None` when it is malformed.
fn parse_flag<T: FromStr>(flag: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(flag, value, "Ignoring unparsable value");
            None
        }
    }
}

fn parse_args() -> anyhow::Result<ViewerConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let text = std::fs::read_to_string(&args[i + 1])
                .with_context(|| format!("read config {}", args[i + 1]))?;
            ViewerConfig::from_json_str(&text).context("parse config")?
        }
        _ => ViewerConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" if i + 1 < args.len() => {
                cfg.server_url = args[i + 1].clone();
                i += 2;
            }
            "--frames-per-cycle" if i + 1 < args.len() => {
                if let Some(n) = parse_flag("--frames-per-cycle", &args[i + 1]) {
                    cfg.frames_per_cycle = n;
                }
                i += 2;
            }
            "--fps" if i + 1 < args.len() => {
                if let Some(hz) = parse_flag("--fps", &args[i + 1]) {
                    cfg.frame_hz = hz;
                }
                i += 2;
            }
            "--layout" if i + 1 < args.len() => {
                cfg.layout_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.color_seed = parse_flag("--seed", &args[i + 1]);
                i += 2;
            }
            "--frames" if i + 1 < args.len() => {
                cfg.max_frames = parse_flag("--frames", &args[i + 1]);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

fn load_layout(cfg: &ViewerConfig) -> anyhow::Result<MapLayout> {
    match &cfg.layout_path {
        Some(path) => {
            let text =
                std::fs::read_to_string(path).with_context(|| format!("read layout {path}"))?;
            MapLayout::parse(&text).with_context(|| format!("parse layout {path}"))
        }
        None => Ok(MapLayout::builtin()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    let layout = load_layout(&cfg)?;
    let (buildings, destinations, roads, signals) = layout.census();
    info!(
        server = %cfg.server_url,
        frames_per_cycle = cfg.cycle_len(),
        frame_hz = cfg.frame_hz,
        width = layout.width(),
        height = layout.height(),
        buildings,
        destinations,
        roads,
        signals,
        "Starting viewer"
    );

    let mut viewer = TrafficViewer::connect(&cfg, &layout)
        .await
        .context("connect")?;
    info!(
        vehicles = viewer.mirror.len(),
        statics = viewer.statics.iter().count(),
        "Viewer ready"
    );

    let frame_hz = cfg.frame_hz.max(1);
    let mut renderer = TraceRenderer::new(u64::from(frame_hz));
    let mut interval = tokio::time::interval(Duration::from_secs_f32(1.0 / frame_hz as f32));
    let mut last_stats_frame = 0;

    loop {
        interval.tick().await;
        let report = viewer.frame(&mut renderer);

        if report.frame >= last_stats_frame + u64::from(frame_hz) {
            if let Some(stats) = viewer.stats() {
                info!(
                    steps = ?stats.steps(),
                    created = ?stats.created(),
                    arrived = ?stats.arrived(),
                    active = ?stats.active(),
                    collisions = ?stats.collisions(),
                    "Stats"
                );
            }
            last_stats_frame = report.frame;
        }

        if cfg.max_frames.is_some_and(|max| report.frame + 1 >= max) {
            info!(
                frames = report.frame + 1,
                failed_cycles = viewer.failed_cycles(),
                "Frame budget reached"
            );
            break;
        }
    }

    Ok(())
}
