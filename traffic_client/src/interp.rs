//! Interpolation.
//!
//! The server only produces new truth once per sync cycle. The client renders
//! every frame and blends each vehicle from its previous toward its current
//! authoritative position by the fraction of the cycle that has elapsed.

use traffic_shared::{math::Vec3, render::VehiclePose};

use crate::mirror::{DynamicEntity, EntityMirror};

/// Smoothed position and heading of one entity for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub facing: f32,
}

/// Interpolation factor `t` in `[0, 1]`.
pub fn blend_factor(frames_since_reconcile: u32, frames_per_cycle: u32) -> f32 {
    let cycle = frames_per_cycle.max(1) as f32;
    (frames_since_reconcile as f32 / cycle).clamp(0.0, 1.0)
}

/// Computes the render pose of `entity`.
///
/// Heading follows the displacement since the previous snapshot. When the
/// entity did not move, the last heading is kept; otherwise the new heading
/// is stored on the entity for later stationary frames.
pub fn pose(entity: &mut DynamicEntity, frames_since_reconcile: u32, frames_per_cycle: u32) -> Pose {
    let t = blend_factor(frames_since_reconcile, frames_per_cycle);
    let position = entity.previous.lerp(entity.current, t);

    let d = entity.displacement();
    if !d.is_planar_zero() {
        entity.last_facing = d.yaw();
    }

    Pose {
        position,
        facing: entity.last_facing,
    }
}

/// Poses for everything in the mirror, in id order.
pub fn poses(
    mirror: &mut EntityMirror,
    frames_since_reconcile: u32,
    frames_per_cycle: u32,
) -> Vec<VehiclePose> {
    mirror
        .iter_mut()
        .map(|e| {
            let p = pose(e, frames_since_reconcile, frames_per_cycle);
            VehiclePose {
                id: e.id.clone(),
                position: p.position,
                facing: p.facing,
                color: e.color(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;
    use traffic_shared::entity::{DynamicUpdate, EntityId};

    const EPS: f32 = 1e-5;

    fn mirror_with(moves: &[(f32, f32)]) -> EntityMirror {
        let mut mirror = EntityMirror::new(Some(7));
        for &(x, z) in moves {
            mirror.reconcile(&[DynamicUpdate {
                id: EntityId::from("7"),
                position: Vec3::on_grid(x, z),
            }]);
        }
        mirror
    }

    fn entity(mirror: &mut EntityMirror) -> &mut DynamicEntity {
        mirror.iter_mut().next().unwrap()
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS && (a.z - b.z).abs() < EPS
    }

    #[test]
    fn blends_partway_and_faces_motion() {
        let mut mirror = mirror_with(&[(2.0, 3.0), (4.0, 3.0)]);
        let p = pose(entity(&mut mirror), 2, 5);
        assert!(close(p.position, Vec3::new(2.8, 0.0, 3.0)), "{:?}", p.position);
        assert!((p.facing - FRAC_PI_2).abs() < EPS);
        assert!((entity(&mut mirror).last_facing - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn cycle_boundaries_hit_snapshot_positions() {
        let mut mirror = mirror_with(&[(2.0, 3.0), (4.0, 3.0)]);
        let e = entity(&mut mirror);
        assert_eq!(pose(e, 0, 5).position, e.previous);
        assert_eq!(pose(e, 5, 5).position, e.current);
        assert_eq!(pose(e, 40, 5).position, e.current);
    }

    #[test]
    fn stationary_entity_keeps_heading() {
        let mut mirror = mirror_with(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        let before = pose(entity(&mut mirror), 1, 5).facing;
        assert!((before - FRAC_PI_2).abs() < EPS);

        mirror.reconcile(&[DynamicUpdate {
            id: EntityId::from("7"),
            position: Vec3::on_grid(1.0, 1.0),
        }]);
        let after = pose(entity(&mut mirror), 3, 5).facing;
        assert_eq!(after, before);
    }

    #[test]
    fn fresh_entity_faces_zero() {
        let mut mirror = mirror_with(&[(3.0, 3.0)]);
        let p = pose(entity(&mut mirror), 2, 5);
        assert_eq!(p.facing, 0.0);
        assert_eq!(p.position, Vec3::on_grid(3.0, 3.0));
    }

    #[test]
    fn blend_factor_guards_zero_cycle() {
        assert_eq!(blend_factor(0, 0), 0.0);
        assert_eq!(blend_factor(3, 0), 1.0);
        assert_eq!(blend_factor(1, 4), 0.25);
    }

    #[test]
    fn poses_carry_color_and_order() {
        let mut mirror = EntityMirror::new(Some(3));
        mirror.reconcile(&[
            DynamicUpdate {
                id: EntityId::from("b"),
                position: Vec3::ZERO,
            },
            DynamicUpdate {
                id: EntityId::from("a"),
                position: Vec3::ZERO,
            },
        ]);
        let out = poses(&mut mirror, 0, 5);
        let ids: Vec<_> = out.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(out[0].color, mirror.get(&EntityId::from("a")).unwrap().color());
    }
}
