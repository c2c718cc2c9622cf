//! Query request and response messages

use crate::expr::Expr;
use ceresprom_core::Label;
use serde::{Deserialize, Serialize};

/// Response code for a successful call
pub const CODE_OK: u32 = 200;
/// Response code when the queried metric does not exist
pub const CODE_NOT_FOUND: u32 = 404;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrometheusQueryRequest {
    pub expr: Expr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub code: u32,
    #[serde(default)]
    pub error: String,
}

impl ResponseHeader {
    pub fn ok() -> Self {
        Self {
            code: CODE_OK,
            error: String::new(),
        }
    }

    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrometheusQueryResponse {
    pub header: ResponseHeader,
    #[serde(default)]
    pub timeseries: Vec<TimeSeries>,
}

/// One result series; the metric name is not part of `labels`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Vec<Label>,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

