//! Local mirror of remote entities.
//!
//! [`EntityMirror`] owns every vehicle the viewer knows about and is the only
//! place their authoritative positions change. [`StaticRegistry`] owns the
//! city features: installed once, except signals which follow every dynamic
//! snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, warn};
use traffic_shared::{
    entity::{DynamicUpdate, EntityId, StaticEntity, VEHICLE_PALETTE},
    math::{Rgba, Vec3},
};

/// One mobile agent as mirrored locally.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicEntity {
    pub id: EntityId,
    pub(crate) current: Vec3,
    pub(crate) previous: Vec3,
    pub(crate) last_facing: f32,
    color: Rgba,
}

impl DynamicEntity {
    fn spawn(id: EntityId, position: Vec3, color: Rgba) -> Self {
        Self {
            id,
            current: position,
            previous: position,
            last_facing: 0.0,
            color,
        }
    }

    /// Authoritative position from the latest snapshot.
    pub fn current(&self) -> Vec3 {
        self.current
    }

    /// `current` as of the previous reconciliation.
    pub fn previous(&self) -> Vec3 {
        self.previous
    }

    /// Last non-degenerate heading, radians.
    pub fn last_facing(&self) -> f32 {
        self.last_facing
    }

    /// Color chosen at first sighting.
    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn displacement(&self) -> Vec3 {
        self.current.sub(self.previous)
    }
}

/// Counts from one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub evicted: usize,
}

/// ID-keyed store of dynamic entities.
pub struct EntityMirror {
    entities: BTreeMap<EntityId, DynamicEntity>,
    rng: StdRng,
    generation: u64,
}

impl EntityMirror {
    pub fn new(color_seed: Option<u64>) -> Self {
        let rng = match color_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            entities: BTreeMap::new(),
            rng,
            generation: 0,
        }
    }

    /// Merges a dynamic snapshot: update known ids, insert new ones, evict
    /// the rest.
    ///
    /// The whole snapshot is applied before this returns. If an id repeats
    /// within the snapshot the last occurrence wins.
    pub fn reconcile(&mut self, snapshot: &[DynamicUpdate]) -> ReconcileSummary {
        let mut latest: HashMap<&EntityId, Vec3> = HashMap::with_capacity(snapshot.len());
        for update in snapshot {
            latest.insert(&update.id, update.position);
        }

        let mut summary = ReconcileSummary::default();

        let before = self.entities.len();
        self.entities.retain(|id, _| latest.contains_key(id));
        summary.evicted = before - self.entities.len();

        let mut seen: HashSet<&EntityId> = HashSet::with_capacity(latest.len());
        for update in snapshot {
            if !seen.insert(&update.id) {
                continue;
            }
            let position = latest[&update.id];
            match self.entities.get_mut(&update.id) {
                Some(entity) => {
                    entity.previous = entity.current;
                    entity.current = position;
                    summary.updated += 1;
                }
                None => {
                    let color = VEHICLE_PALETTE[self.rng.gen_range(0..VEHICLE_PALETTE.len())];
                    self.entities.insert(
                        update.id.clone(),
                        DynamicEntity::spawn(update.id.clone(), position, color),
                    );
                    summary.inserted += 1;
                }
            }
        }

        self.generation += 1;
        debug!(
            generation = self.generation,
            inserted = summary.inserted,
            updated = summary.updated,
            evicted = summary.evicted,
            "Reconciled"
        );
        summary
    }

    pub fn get(&self, id: &EntityId) -> Option<&DynamicEntity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of snapshots applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &DynamicEntity> {
        self.entities.values()
    }

    /// Mutable access for the interpolator, which owns heading updates.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DynamicEntity> {
        self.entities.values_mut()
    }
}

/// Static city features plus the latest signal states.
#[derive(Default)]
pub struct StaticRegistry {
    features: Option<Vec<StaticEntity>>,
    signals: Vec<StaticEntity>,
}

impl StaticRegistry {
    /// Installs buildings, destinations and roads. They are fixed for the
    /// session; a second install is ignored and returns `false`.
    ///
    /// Signals in `entities` seed the signal list until the first dynamic
    /// snapshot replaces it.
    pub fn install(&mut self, entities: Vec<StaticEntity>) -> bool {
        if self.features.is_some() {
            warn!("Static features already installed; ignoring");
            return false;
        }
        let (signals, features): (Vec<_>, Vec<_>) =
            entities.into_iter().partition(StaticEntity::is_signal);
        if !signals.is_empty() {
            self.signals = signals;
        }
        self.features = Some(features);
        true
    }

    pub fn is_installed(&self) -> bool {
        self.features.is_some()
    }

    /// Replaces signal states wholesale.
    pub fn update_signals(&mut self, signals: Vec<StaticEntity>) {
        self.signals = signals;
    }

    pub fn features(&self) -> &[StaticEntity] {
        self.features.as_deref().unwrap_or_default()
    }

    pub fn signals(&self) -> &[StaticEntity] {
        &self.signals
    }

    /// Features followed by signals.
    pub fn iter(&self) -> impl Iterator<Item = &StaticEntity> {
        self.features().iter().chain(self.signals.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_shared::entity::{Heading, StaticKind};

    fn up(id: &str, x: f32, z: f32) -> DynamicUpdate {
        DynamicUpdate {
            id: EntityId::from(id),
            position: Vec3::on_grid(x, z),
        }
    }

    fn ids(mirror: &EntityMirror) -> Vec<&str> {
        mirror.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn new_entity_starts_without_displacement() {
        let mut mirror = EntityMirror::new(Some(1));
        let summary = mirror.reconcile(&[up("7", 2.0, 3.0)]);
        assert_eq!(summary.inserted, 1);
        let e = mirror.get(&EntityId::from("7")).unwrap();
        assert_eq!(e.previous(), e.current());
        assert_eq!(e.last_facing(), 0.0);
    }

    #[test]
    fn update_shifts_current_into_previous() {
        let mut mirror = EntityMirror::new(Some(1));
        mirror.reconcile(&[up("7", 2.0, 3.0)]);
        mirror.reconcile(&[up("7", 4.0, 3.0)]);
        let e = mirror.get(&EntityId::from("7")).unwrap();
        assert_eq!(e.previous, Vec3::on_grid(2.0, 3.0));
        assert_eq!(e.current, Vec3::on_grid(4.0, 3.0));
    }

    #[test]
    fn identical_snapshot_stops_motion() {
        let mut mirror = EntityMirror::new(Some(1));
        mirror.reconcile(&[up("a", 0.0, 0.0)]);
        let snap = [up("a", 1.0, 0.0)];
        mirror.reconcile(&snap);
        mirror.reconcile(&snap);
        let e = mirror.get(&EntityId::from("a")).unwrap();
        assert_eq!(e.current, Vec3::on_grid(1.0, 0.0));
        assert_eq!(e.previous, e.current);
    }

    #[test]
    fn absent_ids_are_evicted() {
        let mut mirror = EntityMirror::new(Some(1));
        mirror.reconcile(&[up("A", 0.0, 0.0), up("B", 1.0, 1.0)]);
        let summary = mirror.reconcile(&[up("B", 1.0, 2.0), up("C", 5.0, 5.0)]);
        assert_eq!(ids(&mirror), vec!["B", "C"]);
        assert_eq!(
            summary,
            ReconcileSummary {
                inserted: 1,
                updated: 1,
                evicted: 1
            }
        );
        let c = mirror.get(&EntityId::from("C")).unwrap();
        assert_eq!(c.previous, c.current);
    }

    #[test]
    fn empty_snapshot_clears_mirror() {
        let mut mirror = EntityMirror::new(Some(1));
        mirror.reconcile(&[up("A", 0.0, 0.0)]);
        mirror.reconcile(&[]);
        assert!(mirror.is_empty());
        assert_eq!(mirror.generation(), 2);
    }

    #[test]
    fn duplicate_id_last_write_wins() {
        let mut mirror = EntityMirror::new(Some(1));
        mirror.reconcile(&[up("x", 0.0, 0.0)]);
        let summary = mirror.reconcile(&[up("x", 1.0, 0.0), up("x", 9.0, 9.0)]);
        assert_eq!(summary.updated, 1);
        let e = mirror.get(&EntityId::from("x")).unwrap();
        assert_eq!(e.current, Vec3::on_grid(9.0, 9.0));
        assert_eq!(e.previous, Vec3::on_grid(0.0, 0.0));
    }

    #[test]
    fn duplicate_new_id_inserts_once_at_last_position() {
        let mut mirror = EntityMirror::new(Some(1));
        let summary = mirror.reconcile(&[up("n", 1.0, 1.0), up("n", 2.0, 2.0)]);
        assert_eq!(summary.inserted, 1);
        let e = mirror.get(&EntityId::from("n")).unwrap();
        assert_eq!(e.current, Vec3::on_grid(2.0, 2.0));
        assert_eq!(e.previous, e.current);
    }

    #[test]
    fn color_is_fixed_after_first_sighting() {
        let mut mirror = EntityMirror::new(None);
        mirror.reconcile(&[up("c", 0.0, 0.0)]);
        let color = mirror.get(&EntityId::from("c")).unwrap().color();
        assert!(VEHICLE_PALETTE.contains(&color));
        for step in 1..20 {
            mirror.reconcile(&[up("c", step as f32, 0.0)]);
            assert_eq!(mirror.get(&EntityId::from("c")).unwrap().color(), color);
        }
    }

    #[test]
    fn seeded_colors_are_reproducible() {
        let snap: Vec<_> = (0..8).map(|i| up(&i.to_string(), 0.0, 0.0)).collect();
        let mut a = EntityMirror::new(Some(42));
        let mut b = EntityMirror::new(Some(42));
        a.reconcile(&snap);
        b.reconcile(&snap);
        let ca: Vec<_> = a.iter().map(|e| e.color()).collect();
        let cb: Vec<_> = b.iter().map(|e| e.color()).collect();
        assert_eq!(ca, cb);
    }

    fn road(id: &str) -> StaticEntity {
        StaticEntity {
            id: EntityId::from(id),
            kind: StaticKind::Road {
                orientation: Heading::East,
            },
            position: Vec3::ZERO,
        }
    }

    fn signal(id: &str, green: bool) -> StaticEntity {
        StaticEntity {
            id: EntityId::from(id),
            kind: StaticKind::Signal {
                green,
                orientation: None,
            },
            position: Vec3::ZERO,
        }
    }

    #[test]
    fn registry_installs_once() {
        let mut reg = StaticRegistry::default();
        assert!(reg.install(vec![road("r1")]));
        assert!(!reg.install(vec![road("r2"), road("r3")]));
        assert_eq!(reg.features().len(), 1);
        assert_eq!(reg.features()[0].id.as_str(), "r1");
    }

    #[test]
    fn registry_signals_follow_updates() {
        let mut reg = StaticRegistry::default();
        reg.install(vec![road("r1"), signal("s1", false)]);
        assert_eq!(reg.features().len(), 1);
        assert_eq!(reg.signals().len(), 1);

        reg.update_signals(vec![signal("s1", true), signal("s2", false)]);
        assert_eq!(reg.iter().count(), 3);
        assert_eq!(
            reg.signals()[0].kind,
            StaticKind::Signal {
                green: true,
                orientation: None
            }
        );
    }
}
