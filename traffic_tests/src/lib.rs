//! In-process fake simulation server for integration tests.
//!
//! Serves the viewer's endpoints from a scripted world over `tiny_http`.
//! Bind it on an ephemeral port with [`FakeSimServer::spawn`] and point the
//! viewer at [`FakeSimServer::url`].

use std::{
    collections::HashMap,
    io::Read,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
    thread::JoinHandle,
};

use anyhow::Context;
use serde_json::{json, Value};
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, warn};

/// Vehicles at one simulation step: `(id, x, z)`.
pub type Step = Vec<(&'static str, f32, f32)>;

/// How `getDynamicAgents` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicMode {
    Normal,
    /// Answer with this HTTP status and an error body.
    Status(u16),
    /// Answer 200 with a body lacking `dynamicAgents`.
    Malformed,
}

struct FakeState {
    script: Vec<Step>,
    step: usize,
    dynamic_mode: DynamicMode,
    grid: Option<(usize, usize)>,
    hits: HashMap<String, usize>,
}

impl FakeState {
    fn vehicles(&self) -> &Step {
        let idx = self.step.min(self.script.len().saturating_sub(1));
        &self.script[idx]
    }

    fn handle(&mut self, method: &str, path: &str, body: &[u8]) -> (u16, Value) {
        *self.hits.entry(path.to_string()).or_default() += 1;

        match (method, path) {
            ("POST", "/init") => {
                let rows: Vec<String> = serde_json::from_slice::<Value>(body)
                    .ok()
                    .and_then(|v| serde_json::from_value(v["mapa"].clone()).ok())
                    .unwrap_or_default();
                let height = rows.len();
                let width = rows.first().map_or(0, |r| r.chars().count());
                if rows.iter().any(|r| r.chars().count() != width) {
                    return (400, json!({"error": "map must be rectangular"}));
                }
                self.grid = Some((width, height));
                self.step = 0;
                (
                    200,
                    json!({"message": "model initialized", "width": width, "height": height}),
                )
            }
            _ if self.grid.is_none() => (400, json!({"error": "model not initialized"})),
            ("GET", "/getStaticAgents") => (
                200,
                json!({"staticAgents": [
                    {"id": "Edificio-2-2", "type": "Edificio", "pos": [2, 2]},
                    {"id": "Destino-6-3", "type": "Destino", "pos": [6, 3]},
                    {"id": "Calle-0-0", "type": "Calle", "pos": [0, 0], "direction": 1},
                    {"id": "Calle-1-0", "type": "Calle", "pos": [1, 0], "direction": 1}
                ]}),
            ),
            ("GET", "/getDynamicAgents") => match self.dynamic_mode {
                DynamicMode::Status(code) => (code, json!({"error": "scripted failure"})),
                DynamicMode::Malformed => (200, json!({"agents": []})),
                DynamicMode::Normal => {
                    let mut agents: Vec<Value> = self
                        .vehicles()
                        .iter()
                        .map(|(id, x, z)| json!({"id": id, "type": "Coche", "pos": [x, z]}))
                        .collect();
                    agents.push(json!({
                        "id": "Semaforo-5-0",
                        "type": "Semaforo",
                        "pos": [5, 0],
                        "state": self.step % 2 == 0
                    }));
                    (200, json!({"dynamicAgents": agents}))
                }
            },
            ("GET", "/update") => {
                self.step += 1;
                (200, json!({"message": format!("step {}", self.step), "currentStep": self.step}))
            }
            ("GET", "/getStats") => (
                200,
                json!({
                    "pasos_simulacion": self.step,
                    "coches_creados": 4,
                    "coches_al_destino": 1,
                    "accidentes": 0,
                    "coches_en_el_grid": self.vehicles().len()
                }),
            ),
            _ => (404, json!({"error": "not found"})),
        }
    }
}

/// Scripted simulation server on an ephemeral port.
pub struct FakeSimServer {
    addr: SocketAddr,
    server: Arc<Server>,
    state: Arc<Mutex<FakeState>>,
    thread: Option<JoinHandle<()>>,
}

impl FakeSimServer {
    /// Binds `127.0.0.1:0` and starts serving on a background thread. Each
    /// `/update` advances to the next step of `script`; the last step repeats
    /// once the script runs out.
    pub fn spawn(script: Vec<Step>) -> anyhow::Result<Self> {
        anyhow::ensure!(!script.is_empty(), "script needs at least one step");

        let server = Server::http("127.0.0.1:0")
            .map_err(|e| anyhow::anyhow!("bind fake server: {e}"))?;
        let addr = server
            .server_addr()
            .to_ip()
            .context("fake server has no ip address")?;
        let server = Arc::new(server);

        let state = Arc::new(Mutex::new(FakeState {
            script,
            step: 0,
            dynamic_mode: DynamicMode::Normal,
            grid: None,
            hits: HashMap::new(),
        }));

        let thread = std::thread::spawn({
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            move || {
                // Ends once `unblock` is called on drop.
                for request in server.incoming_requests() {
                    if let Err(e) = respond(request, &state) {
                        warn!(error = %e, "Fake server failed to answer");
                    }
                }
            }
        });

        Ok(Self {
            addr,
            server,
            state,
            thread: Some(thread),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn set_dynamic_mode(&self, mode: DynamicMode) {
        self.lock().dynamic_mode = mode;
    }

    /// Simulation steps taken so far.
    pub fn step(&self) -> usize {
        self.lock().step
    }

    /// Requests seen for `path` (e.g. `"/update"`).
    pub fn hits(&self, path: &str) -> usize {
        self.lock().hits.get(path).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        lock_state(&self.state)
    }
}

impl Drop for FakeSimServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn lock_state(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn respond(mut request: Request, state: &Mutex<FakeState>) -> anyhow::Result<()> {
    let mut body = Vec::new();
    request
        .as_reader()
        .read_to_end(&mut body)
        .context("read request body")?;

    let method = request.method().to_string();
    let path = request.url().to_string();
    let (status, payload) = lock_state(state).handle(&method, &path, &body);
    debug!(%method, %path, status, "Fake server request");

    let mut response = Response::from_string(payload.to_string()).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    request.respond(response).context("write response")?;
    Ok(())
}
