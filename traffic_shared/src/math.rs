//! Math types.
//!
//! This module intentionally stays small and deterministic.
//! Positions live on the simulation grid: X and Z are grid axes, Y is a fixed
//! elevation.

use serde::{Deserialize, Serialize};

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Lifts a `[x, z]` grid coordinate onto the ground plane.
    pub const fn on_grid(x: f32, z: f32) -> Self {
        Self::new(x, 0.0, z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// True when the vector has no extent on the ground plane.
    ///
    /// Elevation is ignored: the grid is 2D.
    pub fn is_planar_zero(self) -> bool {
        self.x == 0.0 && self.z == 0.0
    }

    /// Yaw of this vector around the Y axis, `atan2(x, z)`.
    pub fn yaw(self) -> f32 {
        self.x.atan2(self.z)
    }

    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.x + (to.x - self.x) * t,
            self.y + (to.y - self.y) * t,
            self.z + (to.z - self.z) * t,
        )
    }
}

/// RGBA color, components in `[0, 1]`.
pub type Rgba = [f32; 4];
