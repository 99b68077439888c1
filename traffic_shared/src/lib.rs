//! `traffic_shared`
//!
//! Shared libraries for the traffic simulation viewer.
//!
//! Design goals:
//! - Deterministic and modular where practical.
//! - Wire formats decoded in one place (`net`), typed everywhere else.
//! - Traits at the rendering seam so the client stays backend-agnostic.
//! - No `unsafe`.

pub mod config;
pub mod entity;
pub mod layout;
pub mod math;
pub mod net;
pub mod render;
