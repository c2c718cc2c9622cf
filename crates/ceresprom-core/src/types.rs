//! Write-path data types

use crate::error::{CoreError, Result};
use crate::labels::Labels;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Millisecond-precision Unix epoch timestamp, as used by PromQL
pub type Timestamp = i64;

/// Field used when a caller does not select one explicitly
pub const DEFAULT_FIELD: &str = "value";

/// A data point as written to the remote store
///
/// Tags and fields live in independent namespaces; a tag and a field may
/// share a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// The metric name (the store's table)
    pub metric: String,
    /// Tag values by tag name
    pub tags: BTreeMap<String, String>,
    /// Timestamp in milliseconds since Unix epoch
    pub timestamp: Timestamp,
    /// Numeric field values by field name
    pub fields: BTreeMap<String, f64>,
}

impl Point {
    /// Build a single-field point from a label set.
    ///
    /// The `__name__` label becomes the metric, every other label a tag.
    pub fn from_labels(labels: &Labels, timestamp: Timestamp, value: f64) -> Result<Self> {
        let (metric, tags) = labels.split_metric();
        let metric = metric.filter(|m| !m.is_empty()).ok_or(CoreError::NoMetricName)?;
        let mut fields = BTreeMap::new();
        fields.insert(DEFAULT_FIELD.to_string(), value);
        Ok(Self {
            metric,
            tags,
            timestamp,
            fields,
        })
    }

    /// Validate the point
    pub fn validate(&self) -> Result<()> {
        if self.metric.is_empty() {
            return Err(CoreError::EmptyMetric);
        }
        if self.tags.keys().any(|k| k.is_empty()) {
            return Err(CoreError::EmptyLabelName);
        }
        Ok(())
    }

    /// Get a tag value by name
    pub fn get_tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// Get a field value by name
    pub fn get_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}

/// JSON write payload carrying one value per point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleFieldPoint {
    pub metric: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub timestamp: Timestamp,
    pub value: f64,
}

impl From<SingleFieldPoint> for Point {
    fn from(p: SingleFieldPoint) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(DEFAULT_FIELD.to_string(), p.value);
        Point {
            metric: p.metric,
            tags: p.tags,
            timestamp: p.timestamp,
            fields,
        }
    }
}
