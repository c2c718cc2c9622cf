//! Transport seam to the remote storage service

use crate::config::RemoteConfig;
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use ceresprom_proto::{
    PrometheusQueryRequest, PrometheusQueryResponse, ResponseHeader, WriteRequest, WriteResponse,
};
use parking_lot::RwLock;
use std::time::Duration;

/// Request/response exchange with the storage service.
///
/// Implementations own connection handling; callers apply timeouts.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn prom_query(&self, req: PrometheusQueryRequest) -> Result<PrometheusQueryResponse>;

    async fn write(&self, req: WriteRequest) -> Result<WriteResponse>;
}

/// JSON-over-HTTP client for the storage service
pub struct HttpStorageClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStorageClient {
    /// Create a new client for the configured address
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout()?)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    async fn post<Req, Resp>(&self, path: &str, req: &Req) -> Result<Resp>
    where
        Req: serde::Serialize + Sync,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(req).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StorageError::Remote {
                code: u32::from(status.as_u16()),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl StorageClient for HttpStorageClient {
    async fn prom_query(&self, req: PrometheusQueryRequest) -> Result<PrometheusQueryResponse> {
        self.post("/prom/query", &req).await
    }

    async fn write(&self, req: WriteRequest) -> Result<WriteResponse> {
        self.post("/write", &req).await
    }
}

/// In-memory client with scripted responses.
///
/// Records every request it receives. Writes succeed for every row unless
/// a write response has been scripted.
#[derive(Default)]
pub struct MemoryClient {
    query_response: RwLock<PrometheusQueryResponse>,
    write_response: RwLock<Option<WriteResponse>>,
    transport_error: RwLock<Option<String>>,
    delay: RwLock<Option<Duration>>,
    queries: RwLock<Vec<PrometheusQueryRequest>>,
    writes: RwLock<Vec<WriteRequest>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            query_response: RwLock::new(PrometheusQueryResponse {
                header: ResponseHeader::ok(),
                timeseries: Vec::new(),
            }),
            ..Default::default()
        }
    }

    pub fn set_query_response(&self, resp: PrometheusQueryResponse) {
        *self.query_response.write() = resp;
    }

    pub fn set_write_response(&self, resp: WriteResponse) {
        *self.write_response.write() = Some(resp);
    }

    /// Fail every call with a transport error
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.transport_error.write() = Some(message.into());
    }

    /// Delay every call
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = Some(delay);
    }

    pub fn queries(&self) -> Vec<PrometheusQueryRequest> {
        self.queries.read().clone()
    }

    pub fn writes(&self) -> Vec<WriteRequest> {
        self.writes.read().clone()
    }

    async fn before_call(&self) -> Result<()> {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.transport_error.read().clone() {
            Some(message) => Err(StorageError::Transport(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageClient for MemoryClient {
    async fn prom_query(&self, req: PrometheusQueryRequest) -> Result<PrometheusQueryResponse> {
        self.queries.write().push(req);
        self.before_call().await?;
        Ok(self.query_response.read().clone())
    }

    async fn write(&self, req: WriteRequest) -> Result<WriteResponse> {
        let rows = req.entry_count() as u32;
        self.writes.write().push(req);
        self.before_call().await?;

        let scripted = self.write_response.read().clone();
        Ok(scripted.unwrap_or_else(|| WriteResponse {
            header: ResponseHeader::ok(),
            success: rows,
            failed: 0,
        }))
    }
}
