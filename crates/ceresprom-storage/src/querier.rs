//! Pushdown query execution against the remote store

use crate::client::StorageClient;
use crate::error::StorageError;
use crate::series::{RemoteSeries, SeriesSet};
use ceresprom_proto::{Expr, PrometheusQueryRequest, CODE_NOT_FOUND, CODE_OK};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What to select: the metric being read and the delegated expression
#[derive(Debug, Clone)]
pub struct SelectHints {
    /// Metric name; the store does not echo it back in series labels
    pub metric: String,
    pub pushdown_expr: Expr,
}

/// Issues one pushdown query per select
pub struct Querier {
    client: Arc<dyn StorageClient>,
    timeout: Duration,
    debug: bool,
}

impl Querier {
    pub fn new(client: Arc<dyn StorageClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            debug: false,
        }
    }

    /// Log full wire requests and responses
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Run the delegated expression and wrap the outcome as a series set.
    ///
    /// Failures never escape as `Err`; they become a failed series set.
    pub async fn select(&self, hints: &SelectHints) -> SeriesSet {
        let req = PrometheusQueryRequest {
            expr: hints.pushdown_expr.clone(),
        };
        if self.debug {
            debug!(
                metric = %hints.metric,
                request = %serde_json::to_string(&req).unwrap_or_default(),
                "Remote query request"
            );
        }

        let resp = match tokio::time::timeout(self.timeout, self.client.prom_query(req)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(metric = %hints.metric, error = %e, "Remote query failed");
                return SeriesSet::failed(e);
            }
            Err(_) => {
                warn!(metric = %hints.metric, timeout = ?self.timeout, "Remote query timed out");
                return SeriesSet::failed(StorageError::Timeout(self.timeout));
            }
        };

        if self.debug {
            debug!(
                metric = %hints.metric,
                response = %serde_json::to_string(&resp).unwrap_or_default(),
                "Remote query response"
            );
        }

        match resp.header.code {
            CODE_OK => {
                let series = resp
                    .timeseries
                    .into_iter()
                    .map(|ts| RemoteSeries::from_wire(&hints.metric, ts))
                    .collect();
                SeriesSet::new(series)
            }
            CODE_NOT_FOUND => SeriesSet::empty(),
            code => SeriesSet::failed(StorageError::Remote {
                code,
                message: resp.header.error,
            }),
        }
    }
}
