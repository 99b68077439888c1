//! Snapshot fetching.
//!
//! Every call either yields decoded, typed data or a [`FetchError`]. Errors
//! stop at this boundary: the scheduler and the frame loop only ever see a
//! `Result` and treat any `Err` as "no update this cycle".

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, Url};
use thiserror::Error;
use tracing::debug;
use traffic_shared::{
    entity::{DynamicSnapshot, StaticEntity},
    layout::MapLayout,
    net::{
        self, InitRequest, InitResponse, Stats, WireError, DYNAMIC_AGENTS_PATH, INIT_PATH,
        STATIC_AGENTS_PATH, STATS_PATH, UPDATE_PATH,
    },
};

/// Coarse failure class, for callers that do not care about details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Protocol,
    Schema,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Network unreachable, connection reset, timeout.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The server answered with a non-success status.
    #[error("server answered {status}")]
    Protocol { status: u16 },
    /// The body parsed badly or lacked expected fields.
    #[error("bad payload: {0}")]
    Schema(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transport(_) => FailureKind::Transport,
            FetchError::Protocol { .. } => FailureKind::Protocol,
            FetchError::Schema(_) => FailureKind::Schema,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

impl From<WireError> for FetchError {
    fn from(e: WireError) -> Self {
        FetchError::Schema(e.to_string())
    }
}

/// The simulation server as seen by the viewer.
#[async_trait]
pub trait SimulationApi: Send + Sync {
    /// Sends the map layout and returns the grid dimensions the server built.
    async fn initialize(&self, layout: &MapLayout) -> Result<InitResponse, FetchError>;
    async fn fetch_static(&self) -> Result<Vec<StaticEntity>, FetchError>;
    async fn fetch_dynamic(&self) -> Result<DynamicSnapshot, FetchError>;
    async fn fetch_stats(&self) -> Result<Stats, FetchError>;
    /// Advances the simulation by one tick.
    async fn advance(&self) -> Result<(), FetchError>;
}

/// [`SimulationApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(server_url: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        // Relative joins drop the last path segment unless the base ends in '/'.
        let mut base = server_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|e| FetchError::Transport(format!("bad url for {path}: {e}")))
    }

    async fn read_body(resp: Response) -> Result<Bytes, FetchError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Protocol {
                status: status.as_u16(),
            });
        }
        Ok(resp.bytes().await?)
    }

    async fn get(&self, path: &str) -> Result<Bytes, FetchError> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        let resp = self.client.get(url).send().await?;
        Self::read_body(resp).await
    }
}

#[async_trait]
impl SimulationApi for HttpFetcher {
    async fn initialize(&self, layout: &MapLayout) -> Result<InitResponse, FetchError> {
        let url = self.url(INIT_PATH)?;
        debug!(%url, "POST");
        let body = InitRequest {
            mapa: layout.rows().to_vec(),
        };
        let resp = self.client.post(url).json(&body).send().await?;
        let bytes = Self::read_body(resp).await?;
        Ok(net::decode_init(&bytes)?)
    }

    async fn fetch_static(&self) -> Result<Vec<StaticEntity>, FetchError> {
        let bytes = self.get(STATIC_AGENTS_PATH).await?;
        Ok(net::decode_static(&bytes)?)
    }

    async fn fetch_dynamic(&self) -> Result<DynamicSnapshot, FetchError> {
        let bytes = self.get(DYNAMIC_AGENTS_PATH).await?;
        Ok(net::decode_dynamic(&bytes)?)
    }

    async fn fetch_stats(&self) -> Result<Stats, FetchError> {
        let bytes = self.get(STATS_PATH).await?;
        Ok(net::decode_stats(&bytes)?)
    }

    async fn advance(&self) -> Result<(), FetchError> {
        self.get(UPDATE_PATH).await.map(|_| ())
    }
}
