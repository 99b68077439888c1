//! Configuration system.
//!
//! Loads viewer configuration from JSON strings (file IO left to app).

use serde::{Deserialize, Serialize};

/// Root viewer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewerConfig {
    /// Base URL of the simulation server, e.g. `http://localhost:8585/`.
    pub server_url: String,
    /// Render frames between two sync attempts.
    #[serde(default = "default_frames_per_cycle")]
    pub frames_per_cycle: u32,
    /// Render cadence of the headless viewer.
    #[serde(default = "default_frame_hz")]
    pub frame_hz: u32,
    /// Seeds vehicle color choice when set.
    #[serde(default)]
    pub color_seed: Option<u64>,
    /// Per-request timeout. Unset means a hung request just delays its cycle.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Path to a text layout; the built-in city is used when unset.
    #[serde(default)]
    pub layout_path: Option<String>,
    /// Stop after this many frames (headless runs).
    #[serde(default)]
    pub max_frames: Option<u64>,
}

fn default_frames_per_cycle() -> u32 {
    5
}

fn default_frame_hz() -> u32 {
    60
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8585/".to_string(),
            frames_per_cycle: default_frames_per_cycle(),
            frame_hz: default_frame_hz(),
            color_seed: None,
            request_timeout_ms: None,
            layout_path: None,
            max_frames: None,
        }
    }
}

impl ViewerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Sync cycle length, never below one frame.
    pub fn cycle_len(&self) -> u32 {
        self.frames_per_cycle.max(1)
    }
}
