//! HTTP request handlers

use crate::error::{ApiError, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use ceresprom_core::{Label, Labels, Matcher, Point, SingleFieldPoint};
use ceresprom_proto::Sample;
use ceresprom_query::{series_to_matrix, Node, PushdownConfig, PushdownHelper};
use ceresprom_storage::{parse_duration, Appender, Querier, SeriesSlot, Writer};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Shared handler state
pub struct AppState {
    pub writer: Arc<Writer>,
    pub querier: Arc<Querier>,
    pub pushdown: PushdownConfig,
    /// Accept Prometheus remote-write requests
    pub remote_write: bool,
}

impl AppState {
    pub fn new(
        writer: Arc<Writer>,
        querier: Arc<Querier>,
        pushdown: PushdownConfig,
        remote_write: bool,
    ) -> Self {
        Self {
            writer,
            querier,
            pushdown,
            remote_write,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub remote_write: bool,
}

/// Health check handler
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        remote_write: state.remote_write,
    })
}

/// One label matcher, e.g. `{"name": "host", "op": "=~", "value": "a|b"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherRequest {
    pub name: String,
    pub op: String,
    pub value: String,
}

/// Query request body: a selector, optionally wrapped in one range function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub matchers: Vec<MatcherRequest>,
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub step: i64,
    /// Range function applied over `range`, e.g. "rate"
    #[serde(default)]
    pub function: Option<String>,
    /// Matrix range in milliseconds
    #[serde(default)]
    pub range: i64,
}

/// One result series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesResponse {
    pub labels: Labels,
    pub samples: Vec<Sample>,
}

/// Query response
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub metric: String,
    /// Whether the function was evaluated by the remote store
    pub pushed_down: bool,
    pub series: Vec<SeriesResponse>,
}

/// Plan a selector query, run it on the remote store and return its series.
///
/// A requested function must fold into the delegated expression; there is
/// no local evaluator to fall back to.
pub async fn ceresdb_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let matchers = req
        .matchers
        .iter()
        .map(|m| Matcher::parse(m.name.as_str(), &m.op, m.value.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ApiError::InvalidParam {
            param: "matchers".to_string(),
            message: e.to_string(),
        })?;

    let path = match req.function.as_deref() {
        Some(func) => {
            if req.range <= 0 {
                return Err(ApiError::InvalidParam {
                    param: "range".to_string(),
                    message: format!("{} needs a positive range", func),
                });
            }
            let matrix = Node::matrix(Node::vector(matchers.clone()), req.range);
            vec![Node::call(func, vec![matrix.clone()]), matrix]
        }
        None => Vec::new(),
    };

    let slot: SeriesSlot = Arc::new(RwLock::new(Vec::new()));
    let (metric, outcome) = PushdownHelper::new(matchers, &path, &state.pushdown)
        .time_range(req.start, req.end)
        .step(req.step)
        .matrix_range(req.range)
        .to_expr(slot)?;

    let pushed_down = outcome.is_pushed_down(0);
    if let Some(func) = req.function.as_deref() {
        if !pushed_down {
            return Err(ApiError::InvalidParam {
                param: "function".to_string(),
                message: format!("{} is not evaluated by the remote store", func),
            });
        }
    }
    debug!(metric = %metric, pushed_down, expr_depth = outcome.expr.depth(), "Planned query");

    let series = state
        .querier
        .select(&outcome.select_hints(metric.as_str()))
        .await
        .into_series()?;

    let series = match outcome.outermost().and_then(|idx| outcome.bound_series(idx)) {
        Some(bound) => {
            outcome.bind(series);
            series_to_matrix(&bound.read())
                .into_iter()
                .map(|m| SeriesResponse {
                    labels: m.labels,
                    samples: m.points,
                })
                .collect()
        }
        None => series
            .into_iter()
            .map(|s| SeriesResponse {
                labels: s.labels(),
                samples: s.samples,
            })
            .collect(),
    };

    Ok(Json(QueryResponse {
        metric,
        pushed_down,
        series,
    }))
}

/// Query parameters of the JSON write endpoint
#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    /// Overall deadline for the write, e.g. "5s"
    pub timeout: Option<String>,
}

/// Write response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WriteResult {
    /// Points accepted by the remote store
    pub success: u32,
}

/// Write a JSON array of single-field points
pub async fn ceresdb_write(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WriteParams>,
    Json(points): Json<Vec<SingleFieldPoint>>,
) -> Result<Json<WriteResult>> {
    let deadline = match params.timeout.as_deref().filter(|t| !t.is_empty()) {
        Some(t) => Some(parse_duration(t).map_err(|e| ApiError::InvalidParam {
            param: "timeout".to_string(),
            message: e.to_string(),
        })?),
        None => None,
    };

    let points: Vec<Point> = points.into_iter().map(Point::from).collect();
    debug!(points = points.len(), "Received JSON write");

    let write = state.writer.write(&points);
    let success = match deadline {
        Some(d) => tokio::time::timeout(d, write)
            .await
            .map_err(|_| ApiError::Timeout(format!("write exceeded {:?}", d)))??,
        None => write.await?,
    };

    Ok(Json(WriteResult { success }))
}

/// One series of a remote-write request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteWriteSeries {
    pub labels: Vec<Label>,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

/// Remote-write request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteWriteRequest {
    pub timeseries: Vec<RemoteWriteSeries>,
}

/// Ingest a remote-write request, one point per sample
pub async fn remote_write(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemoteWriteRequest>,
) -> Result<StatusCode> {
    let mut app = Appender::new(Arc::clone(&state.writer));

    for ts in req.timeseries {
        let labels = Labels::new(ts.labels);
        for s in &ts.samples {
            if let Err(e) = app.append(&labels, s.timestamp, s.value) {
                error!(labels = %labels, error = %e, "Rejected remote write series");
                app.rollback();
                return Err(e.into());
            }
        }
    }

    let pending = app.pending();
    app.commit().await.map_err(|e| {
        error!(points = pending, error = %e, "Remote write to store failed");
        ApiError::from(e)
    })?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceresprom_core::METRIC_NAME;
    use ceresprom_query::matchers::FIELD_LABEL;
    use ceresprom_proto::{
        FilterType, PrometheusQueryResponse, ResponseHeader, SubExprType, TimeSeries,
        WriteResponse,
    };
    use ceresprom_storage::{decode_request, MemoryClient};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn state_with(pushdown: PushdownConfig) -> (Arc<MemoryClient>, Arc<AppState>) {
        let client = Arc::new(MemoryClient::new());
        let writer = Arc::new(Writer::new(client.clone(), Duration::from_secs(1)));
        let querier = Arc::new(Querier::new(client.clone(), Duration::from_secs(1)));
        (client, Arc::new(AppState::new(writer, querier, pushdown, true)))
    }

    fn state() -> (Arc<MemoryClient>, Arc<AppState>) {
        state_with(PushdownConfig::default())
    }

    fn matcher(name: &str, op: &str, value: &str) -> MatcherRequest {
        MatcherRequest {
            name: name.to_string(),
            op: op.to_string(),
            value: value.to_string(),
        }
    }

    fn cpu_query(function: Option<&str>, range: i64) -> QueryRequest {
        QueryRequest {
            matchers: vec![matcher(METRIC_NAME, "=", "cpu"), matcher("host", "!=", "c")],
            start: 0,
            end: 60_000,
            step: 15_000,
            function: function.map(String::from),
            range,
        }
    }

    fn two_hosts() -> PrometheusQueryResponse {
        PrometheusQueryResponse {
            header: ResponseHeader::ok(),
            timeseries: vec![
                TimeSeries {
                    labels: vec![Label::new("host", "a")],
                    samples: vec![Sample::new(0, 0.5), Sample::new(15_000, 1.5)],
                },
                TimeSeries {
                    labels: vec![Label::new("host", "b")],
                    samples: vec![],
                },
            ],
        }
    }

    fn single(metric: &str, host: &str, ts: i64, value: f64) -> SingleFieldPoint {
        let mut tags = BTreeMap::new();
        tags.insert("host".to_string(), host.to_string());
        SingleFieldPoint {
            metric: metric.to_string(),
            tags,
            timestamp: ts,
            value,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (_, state) = state();
        let Json(resp) = health(State(state)).await;
        assert_eq!(resp.status, "healthy");
        assert!(resp.remote_write);
    }

    #[tokio::test]
    async fn test_ceresdb_write() {
        let (client, state) = state();
        let Json(resp) = ceresdb_write(
            State(state),
            Query(WriteParams {
                timeout: Some("5s".to_string()),
            }),
            Json(vec![single("cpu", "a", 1, 0.5), single("cpu", "b", 1, 0.7)]),
        )
        .await
        .unwrap();

        assert_eq!(resp, WriteResult { success: 2 });
        let points = decode_request(&client.writes()[0]).unwrap();
        assert_eq!(points[1].get_tag("host"), Some("b"));
        assert_eq!(points[1].get_field("value"), Some(0.7));
    }

    #[tokio::test]
    async fn test_ceresdb_write_bad_timeout() {
        let (client, state) = state();
        let err = ceresdb_write(
            State(state),
            Query(WriteParams {
                timeout: Some("soon".to_string()),
            }),
            Json(vec![single("cpu", "a", 1, 0.5)]),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::InvalidParam { ref param, .. } if param == "timeout"));
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn test_ceresdb_write_overflowing_timeout() {
        let (client, state) = state();
        let err = ceresdb_write(
            State(state),
            Query(WriteParams {
                timeout: Some("18446744073709551615s18446744073709551615s".to_string()),
            }),
            Json(vec![single("cpu", "a", 1, 0.5)]),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::InvalidParam { ref param, .. } if param == "timeout"));
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn test_ceresdb_write_fractional_timeout() {
        let (client, state) = state();
        let Json(resp) = ceresdb_write(
            State(state),
            Query(WriteParams {
                timeout: Some("1.5".to_string()),
            }),
            Json(vec![single("cpu", "a", 1, 0.5)]),
        )
        .await
        .unwrap();

        assert_eq!(resp, WriteResult { success: 1 });
        assert_eq!(client.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_ceresdb_query_selector() {
        let (client, state) = state();
        client.set_query_response(two_hosts());

        let Json(resp) = ceresdb_query(State(state), Json(cpu_query(None, 0)))
            .await
            .unwrap();

        assert_eq!(resp.metric, "cpu");
        assert!(!resp.pushed_down);
        // raw series keep their name and are returned even when empty
        assert_eq!(resp.series.len(), 2);
        assert_eq!(resp.series[0].labels.metric_name(), Some("cpu"));
        assert_eq!(resp.series[0].labels.get("host"), Some("a"));
        assert!(resp.series[1].samples.is_empty());

        let selector = client.queries()[0].expr.base_selector().unwrap().clone();
        assert!(client.queries()[0].expr.as_sub_expr().is_none());
        assert_eq!(selector.measurement, "cpu");
        assert_eq!(selector.step, 15_000);
        assert_eq!(selector.filters[0].tag_key, "host");
        assert_eq!(selector.filters[0].operators[0].filter_type, FilterType::NotLiteralOr);
    }

    #[tokio::test]
    async fn test_ceresdb_query_rate_is_pushed_down() {
        let (client, state) = state();
        client.set_query_response(two_hosts());

        let Json(resp) = ceresdb_query(State(state), Json(cpu_query(Some("rate"), 300_000)))
            .await
            .unwrap();

        assert!(resp.pushed_down);
        let sub = client.queries()[0].expr.as_sub_expr().unwrap().clone();
        assert_eq!(sub.op_type, SubExprType::Func);
        assert_eq!(sub.operator, "rate");
        assert_eq!(client.queries()[0].expr.base_selector().unwrap().range, 300_000);

        // computed values lose the metric name; empty series are dropped
        assert_eq!(resp.series.len(), 1);
        assert_eq!(resp.series[0].labels.metric_name(), None);
        assert_eq!(resp.series[0].samples, vec![Sample::new(0, 0.5), Sample::new(15_000, 1.5)]);
    }

    #[tokio::test]
    async fn test_ceresdb_query_rejects_local_only_function() {
        let (client, app) = state();
        let err = ceresdb_query(State(app.clone()), Json(cpu_query(Some("abs"), 300_000)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParam { ref param, .. } if param == "function"));
        assert!(client.queries().is_empty());

        let err = ceresdb_query(State(app), Json(cpu_query(Some("rate"), 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParam { ref param, .. } if param == "range"));
    }

    #[tokio::test]
    async fn test_ceresdb_query_bad_matchers() {
        let (client, app) = state();
        let mut req = cpu_query(None, 0);
        req.matchers.push(matcher("host", "<>", "a"));
        let err = ceresdb_query(State(app.clone()), Json(req)).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidParam { ref param, .. } if param == "matchers"));

        let req = QueryRequest {
            matchers: vec![matcher(METRIC_NAME, "=~", "cpu|mem")],
            ..Default::default()
        };
        let err = ceresdb_query(State(app), Json(req)).await.unwrap_err();
        assert!(matches!(err, ApiError::Query(_)));
        assert!(client.queries().is_empty());
    }

    #[tokio::test]
    async fn test_ceresdb_query_uses_pushdown_config() {
        let (client, state) = state_with(PushdownConfig {
            literal_or_rewrite: true,
            ..Default::default()
        });
        let req = QueryRequest {
            matchers: vec![
                matcher(METRIC_NAME, "=", "cpu"),
                matcher("region", "=~", "eu-west|us-east"),
                matcher(FIELD_LABEL, "=", "usage"),
            ],
            ..Default::default()
        };
        ceresdb_query(State(state), Json(req)).await.unwrap();

        let selector = client.queries()[0].expr.base_selector().unwrap().clone();
        assert_eq!(selector.field, "usage");
        assert_eq!(selector.filters.len(), 1);
        assert_eq!(selector.filters[0].operators[0].filter_type, FilterType::LiteralOr);
        assert_eq!(selector.filters[0].operators[0].params, vec!["eu-west", "us-east"]);
    }

    #[tokio::test]
    async fn test_ceresdb_query_remote_failure() {
        let (client, state) = state();
        client.set_query_response(PrometheusQueryResponse {
            header: ResponseHeader::error(500, "region unavailable"),
            timeseries: vec![],
        });
        let err = ceresdb_query(State(state), Json(cpu_query(None, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Storage(ref m) if m.contains("region unavailable")));
    }

    #[tokio::test]
    async fn test_ceresdb_write_empty_metric() {
        let (_, state) = state();
        let err = ceresdb_write(
            State(state),
            Query(WriteParams::default()),
            Json(vec![single("", "a", 1, 0.5)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_ceresdb_write_remote_failure() {
        let (client, state) = state();
        client.set_write_response(WriteResponse {
            header: ResponseHeader::error(500, "disk full"),
            success: 0,
            failed: 1,
        });

        let err = ceresdb_write(
            State(state),
            Query(WriteParams::default()),
            Json(vec![single("cpu", "a", 1, 0.5)]),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_remote_write_one_point_per_sample() {
        let (client, state) = state();
        let req = RemoteWriteRequest {
            timeseries: vec![RemoteWriteSeries {
                labels: vec![Label::new("__name__", "up"), Label::new("job", "node")],
                samples: vec![Sample::new(1000, 1.0), Sample::new(2000, 0.0)],
            }],
        };

        let status = remote_write(State(state), Json(req)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let points = decode_request(&client.writes()[0]).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.metric == "up"));
        assert_eq!(points[0].get_tag("job"), Some("node"));
        assert_eq!(points[1].timestamp, 2000);
    }

    #[tokio::test]
    async fn test_remote_write_without_metric_name() {
        let (client, state) = state();
        let req = RemoteWriteRequest {
            timeseries: vec![RemoteWriteSeries {
                labels: vec![Label::new("job", "node")],
                samples: vec![Sample::new(1000, 1.0)],
            }],
        };

        let err = remote_write(State(state), Json(req)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(client.writes().is_empty());
    }
}
