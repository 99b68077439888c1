//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! A render driver receives, once per frame, the static city and the
//! interpolated vehicle poses; GPU state stays on its side of the trait.

use tracing::info;

use crate::{
    entity::{EntityId, StaticEntity},
    math::{Rgba, Vec3},
};

/// Render-time pose of one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehiclePose {
    pub id: EntityId,
    pub position: Vec3,
    /// Yaw around the vertical axis, radians.
    pub facing: f32,
    pub color: Rgba,
}

/// A minimal rendering API.
pub trait RenderDriver: Send {
    fn begin_frame(&mut self, frame: u64);
    fn draw_static(&mut self, entity: &StaticEntity);
    fn draw_vehicle(&mut self, pose: &VehiclePose);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderDriver for NullRenderer {
    fn begin_frame(&mut self, _frame: u64) {}
    fn draw_static(&mut self, _entity: &StaticEntity) {}
    fn draw_vehicle(&mut self, _pose: &VehiclePose) {}
    fn end_frame(&mut self) {}
}

/// Headless renderer that logs a frame summary every `every` frames.
pub struct TraceRenderer {
    every: u64,
    frame: u64,
    statics: usize,
    vehicles: usize,
}

impl TraceRenderer {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frame: 0,
            statics: 0,
            vehicles: 0,
        }
    }
}

impl RenderDriver for TraceRenderer {
    fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.statics = 0;
        self.vehicles = 0;
    }

    fn draw_static(&mut self, _entity: &StaticEntity) {
        self.statics += 1;
    }

    fn draw_vehicle(&mut self, _pose: &VehiclePose) {
        self.vehicles += 1;
    }

    fn end_frame(&mut self) {
        if self.frame % self.every == 0 {
            info!(
                frame = self.frame,
                statics = self.statics,
                vehicles = self.vehicles,
                "Frame"
            );
        }
    }
}
