//! Wire protocol of the simulation server.
//!
//! Goals:
//! - Mirror the server's JSON payloads exactly (field names included).
//! - Turn raw agent records into typed entities in one place.
//! - Keep every decoding failure distinguishable from transport failures.
//!
//! Endpoints, relative to the server base URL:
//! - `POST init` with [`InitRequest`], answers [`InitResponse`]
//! - `GET getStaticAgents` answers [`StaticAgentsResponse`]
//! - `GET getDynamicAgents` answers [`DynamicAgentsResponse`]
//! - `GET update` advances the simulation one tick
//! - `GET getStats` answers a flat object of counters ([`Stats`])

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    entity::{AgentKind, DynamicSnapshot, DynamicUpdate, EntityId, Heading, StaticEntity, StaticKind},
    math::Vec3,
};

pub const INIT_PATH: &str = "init";
pub const STATIC_AGENTS_PATH: &str = "getStaticAgents";
pub const DYNAMIC_AGENTS_PATH: &str = "getDynamicAgents";
pub const UPDATE_PATH: &str = "update";
pub const STATS_PATH: &str = "getStats";

/// Payload that could not be turned into typed entities.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("agent {id}: missing field `{field}`")]
    MissingField { id: EntityId, field: &'static str },
    #[error("agent {id}: unknown direction code {code}")]
    BadDirection { id: EntityId, code: u8 },
}

/// Body of `POST init`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitRequest {
    pub mapa: Vec<String>,
}

/// Answer to `POST init`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitResponse {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub message: String,
}

/// One agent as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: String,
    /// Grid coordinate `[x, z]`.
    pub pos: [f32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
}

impl AgentRecord {
    pub fn position(&self) -> Vec3 {
        Vec3::on_grid(self.pos[0], self.pos[1])
    }

    fn heading(&self) -> Result<Option<Heading>, WireError> {
        match self.direction {
            None => Ok(None),
            Some(code) => Heading::from_code(code)
                .map(Some)
                .ok_or_else(|| WireError::BadDirection {
                    id: self.id.clone(),
                    code,
                }),
        }
    }

    /// A signal that reports no `state` is drawn red.
    fn signal(&self) -> Result<StaticEntity, WireError> {
        let green = self.state.unwrap_or(false);
        Ok(StaticEntity {
            id: self.id.clone(),
            kind: StaticKind::Signal {
                green,
                orientation: self.heading()?,
            },
            position: self.position(),
        })
    }
}

/// Answer to `GET getStaticAgents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticAgentsResponse {
    pub static_agents: Vec<AgentRecord>,
}

impl StaticAgentsResponse {
    /// Converts records into typed static entities.
    ///
    /// Agent types this viewer does not draw are skipped.
    pub fn into_entities(self) -> Result<Vec<StaticEntity>, WireError> {
        let mut out = Vec::with_capacity(self.static_agents.len());
        for rec in self.static_agents {
            let kind = match AgentKind::from_wire(&rec.kind) {
                AgentKind::Building => StaticKind::Building,
                AgentKind::Destination => StaticKind::Destination,
                AgentKind::Road => {
                    let orientation = rec.heading()?.ok_or_else(|| WireError::MissingField {
                        id: rec.id.clone(),
                        field: "direction",
                    })?;
                    StaticKind::Road { orientation }
                }
                AgentKind::Signal => {
                    out.push(rec.signal()?);
                    continue;
                }
                AgentKind::Vehicle | AgentKind::Other(_) => {
                    debug!(id = %rec.id, kind = %rec.kind, "Skipping non-static agent");
                    continue;
                }
            };
            out.push(StaticEntity {
                position: rec.position(),
                id: rec.id,
                kind,
            });
        }
        Ok(out)
    }
}

/// Answer to `GET getDynamicAgents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicAgentsResponse {
    pub dynamic_agents: Vec<AgentRecord>,
}

impl DynamicAgentsResponse {
    /// Splits records into mobile agents and signal states.
    pub fn into_snapshot(self) -> Result<DynamicSnapshot, WireError> {
        let mut snap = DynamicSnapshot::default();
        for rec in self.dynamic_agents {
            match AgentKind::from_wire(&rec.kind) {
                AgentKind::Signal => snap.signals.push(rec.signal()?),
                _ => snap.vehicles.push(DynamicUpdate {
                    position: rec.position(),
                    id: rec.id,
                }),
            }
        }
        Ok(snap)
    }
}

/// Flat set of named simulation counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Stats(pub BTreeMap<String, f64>);

impl Stats {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn steps(&self) -> Option<f64> {
        self.get("pasos_simulacion")
    }

    pub fn created(&self) -> Option<f64> {
        self.get("coches_creados")
    }

    pub fn arrived(&self) -> Option<f64> {
        self.get("coches_al_destino")
    }

    pub fn active(&self) -> Option<f64> {
        self.get("coches_en_el_grid")
    }

    pub fn collisions(&self) -> Option<f64> {
        self.get("accidentes")
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.0 {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

pub fn decode_init(bytes: &[u8]) -> Result<InitResponse, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn decode_static(bytes: &[u8]) -> Result<Vec<StaticEntity>, WireError> {
    serde_json::from_slice::<StaticAgentsResponse>(bytes)?.into_entities()
}

pub fn decode_dynamic(bytes: &[u8]) -> Result<DynamicSnapshot, WireError> {
    serde_json::from_slice::<DynamicAgentsResponse>(bytes)?.into_snapshot()
}

pub fn decode_stats(bytes: &[u8]) -> Result<Stats, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_payload_splits_vehicles_and_signals() {
        let body = br#"{"dynamicAgents": [
            {"id": "Coche-1", "type": "Coche", "pos": [2, 3], "destination": "Destino-4-5"},
            {"id": "Semaforo-5-0", "type": "Semaforo", "pos": [5, 0], "state": true}
        ]}"#;
        let snap = decode_dynamic(body).unwrap();
        assert_eq!(
            snap.vehicles,
            vec![DynamicUpdate {
                id: EntityId::from("Coche-1"),
                position: Vec3::new(2.0, 0.0, 3.0),
            }]
        );
        assert_eq!(snap.signals.len(), 1);
        assert_eq!(
            snap.signals[0].kind,
            StaticKind::Signal {
                green: true,
                orientation: None
            }
        );
    }

    #[test]
    fn signal_without_state_defaults_to_red() {
        let body = br#"{"dynamicAgents": [
            {"id": "Coche-1", "type": "Coche", "pos": [1, 1]},
            {"id": "Semaforo-5-0", "type": "Semaforo", "pos": [5, 0]}
        ]}"#;
        let snap = decode_dynamic(body).unwrap();
        assert_eq!(snap.vehicles.len(), 1);
        assert_eq!(snap.vehicles[0].id, EntityId::from("Coche-1"));
        assert_eq!(
            snap.signals[0].kind,
            StaticKind::Signal {
                green: false,
                orientation: None
            }
        );
    }

    #[test]
    fn bad_direction_code_is_rejected() {
        let body = br#"{"staticAgents": [{"id": "Calle-0-0", "type": "Calle", "pos": [0, 0], "direction": 9}]}"#;
        assert!(matches!(
            decode_static(body),
            Err(WireError::BadDirection { code: 9, .. })
        ));
    }

    #[test]
    fn missing_top_level_field_is_an_error() {
        assert!(matches!(
            decode_dynamic(br#"{"agents": []}"#),
            Err(WireError::Json(_))
        ));
        assert!(decode_static(br#"{"dynamicAgents": []}"#).is_err());
    }

    #[test]
    fn road_without_direction_is_rejected() {
        let body = br#"{"staticAgents": [{"id": "Calle-0-0", "type": "Calle", "pos": [0, 0]}]}"#;
        assert!(matches!(
            decode_static(body),
            Err(WireError::MissingField { field: "direction", .. })
        ));
    }

    #[test]
    fn static_payload_maps_kinds() {
        let body = br#"{"staticAgents": [
            {"id": "Edificio-2-2", "type": "Edificio", "pos": [2, 2]},
            {"id": "Calle-0-1", "type": "Calle", "pos": [0, 1], "direction": 2},
            {"id": "Destino-6-3", "type": "Destino", "pos": [6, 3]},
            {"id": "x", "type": "Mystery", "pos": [9, 9]}
        ]}"#;
        let entities = decode_static(body).unwrap();
        let kinds: Vec<StaticKind> = entities.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StaticKind::Building,
                StaticKind::Road {
                    orientation: Heading::South
                },
                StaticKind::Destination,
            ]
        );
    }

    #[test]
    fn stats_expose_named_counters() {
        let stats = decode_stats(
            br#"{"pasos_simulacion": 12, "coches_creados": 8, "coches_al_destino": 3,
                 "accidentes": 0, "coches_en_el_grid": 5}"#,
        )
        .unwrap();
        assert_eq!(stats.steps(), Some(12.0));
        assert_eq!(stats.active(), Some(5.0));
        assert_eq!(stats.get("missing"), None);
        assert!(stats.to_string().contains("coches_creados: 8"));
    }

    #[test]
    fn stats_must_be_numeric() {
        assert!(decode_stats(br#"{"pasos_simulacion": "many"}"#).is_err());
    }
}
