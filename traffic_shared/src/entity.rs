//! Entity model shared by the fetcher, the mirror and render drivers.
//!
//! Dynamic entities (vehicles) move every simulation tick; static entities
//! (buildings, destinations, roads, signals) describe the city itself.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::math::{Rgba, Vec3};

/// Server-assigned entity id.
///
/// The simulation may hand out string ids (`"Coche-7"`) or plain integers;
/// both normalise to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => EntityId(s),
            RawId::Int(n) => EntityId(n.to_string()),
        })
    }
}

/// Agent type as named by the simulation server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Vehicle,
    Signal,
    Building,
    Road,
    Destination,
    Other(String),
}

impl AgentKind {
    pub fn from_wire(name: &str) -> Self {
        match name {
            "Coche" => AgentKind::Vehicle,
            "Semaforo" => AgentKind::Signal,
            "Edificio" => AgentKind::Building,
            "Calle" => AgentKind::Road,
            "Destino" => AgentKind::Destination,
            other => AgentKind::Other(other.to_string()),
        }
    }
}

/// Cardinal heading of a road or signal on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    /// Decodes the server's numeric direction (`0..=3`).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Heading::North),
            1 => Some(Heading::East),
            2 => Some(Heading::South),
            3 => Some(Heading::West),
            _ => None,
        }
    }
}

/// Kind of an immobile feature, with its kind-specific metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StaticKind {
    Building,
    Destination,
    Road { orientation: Heading },
    Signal { green: bool, orientation: Option<Heading> },
}

/// An immobile feature of the city.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticEntity {
    pub id: EntityId,
    pub kind: StaticKind,
    pub position: Vec3,
}

impl StaticEntity {
    pub fn is_signal(&self) -> bool {
        matches!(self.kind, StaticKind::Signal { .. })
    }
}

/// One mobile agent as reported by a dynamic snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicUpdate {
    pub id: EntityId,
    pub position: Vec3,
}

/// Everything a successful dynamic fetch yields: mobile agents to reconcile
/// and the current signal states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicSnapshot {
    pub vehicles: Vec<DynamicUpdate>,
    pub signals: Vec<StaticEntity>,
}

/// Vehicle body colors, one chosen per vehicle at first sighting.
pub const VEHICLE_PALETTE: [Rgba; 9] = [
    [1.0, 0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0, 1.0],
    [1.0, 1.0, 0.0, 1.0],
    [1.0, 0.0, 1.0, 1.0],
    [0.0, 1.0, 1.0, 1.0],
    [0.5, 0.5, 0.5, 1.0],
    [1.0, 0.5, 0.0, 1.0],
    [0.5, 0.0, 0.5, 1.0],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_accepts_strings_and_integers() {
        let ids: Vec<EntityId> = serde_json::from_str(r#"["Coche-1", 42]"#).unwrap();
        assert_eq!(ids, vec![EntityId::from("Coche-1"), EntityId::from("42")]);
    }

    #[test]
    fn heading_codes_follow_compass_order() {
        assert_eq!(Heading::from_code(0), Some(Heading::North));
        assert_eq!(Heading::from_code(1), Some(Heading::East));
        assert_eq!(Heading::from_code(2), Some(Heading::South));
        assert_eq!(Heading::from_code(3), Some(Heading::West));
        assert_eq!(Heading::from_code(4), None);
    }

    #[test]
    fn agent_kind_maps_server_names() {
        assert_eq!(AgentKind::from_wire("Coche"), AgentKind::Vehicle);
        assert_eq!(AgentKind::from_wire("Semaforo"), AgentKind::Signal);
        assert_eq!(
            AgentKind::from_wire("Roomba"),
            AgentKind::Other("Roomba".to_string())
        );
    }
}
