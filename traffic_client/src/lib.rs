//! `traffic_client`
//!
//! Client-side systems of the traffic viewer:
//! - Snapshot fetching over HTTP (`fetcher`)
//! - Local mirror of vehicles and the static city (`mirror`)
//! - Motion interpolation between snapshots (`interp`)
//! - Frame-counted sync scheduling (`scheduler`)
//! - The `TrafficViewer` facade wiring them to a render driver (`client`)

pub mod client;
pub mod fetcher;
pub mod interp;
pub mod mirror;
pub mod scheduler;

pub use client::TrafficViewer;
