//! Columnar write path
//!
//! Points are grouped by metric. For each metric a column dictionary is
//! built from every tag and field name seen in the batch (first-seen order,
//! tags and fields numbered independently), then each point becomes one
//! row whose values reference those column indices. The dictionary is
//! rebuilt for every batch, so indices only mean something together with
//! the names shipped in the same request.

use crate::client::StorageClient;
use crate::error::{Result, StorageError};
use ceresprom_core::Point;
use ceresprom_proto::{
    Field, FieldGroup, Tag, Value, WriteEntry, WriteMetric, WriteRequest, CODE_OK,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Per-metric column dictionary for one batch
#[derive(Debug, Default)]
pub struct ColumnSchema {
    tag_names: Vec<String>,
    field_names: Vec<String>,
    tag_index: HashMap<String, u32>,
    field_index: HashMap<String, u32>,
}

impl ColumnSchema {
    /// Register a column; names already present in the same namespace are ignored
    pub fn add(&mut self, name: &str, is_tag: bool) {
        let (names, index) = if is_tag {
            (&mut self.tag_names, &mut self.tag_index)
        } else {
            (&mut self.field_names, &mut self.field_index)
        };
        if index.contains_key(name) {
            return;
        }
        index.insert(name.to_string(), names.len() as u32);
        names.push(name.to_string());
    }

    pub fn tag_names(&self) -> &[String] {
        &self.tag_names
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Encode one point as a row; values the point lacks stay absent
    fn encode_row(&self, point: &Point) -> ColumnValue {
        let mut row = ColumnValue::new(point.timestamp);
        for (name, value) in &point.tags {
            if let Some(&idx) = self.tag_index.get(name) {
                row.tags.insert(idx, value.clone());
            }
        }
        for (name, value) in &point.fields {
            if let Some(&idx) = self.field_index.get(name) {
                row.fields.insert(idx, *value);
            }
        }
        row
    }
}

/// One encoded row, keyed by column index
#[derive(Debug, Clone, PartialEq)]
struct ColumnValue {
    tags: BTreeMap<u32, String>,
    fields: BTreeMap<u32, f64>,
    timestamp: i64,
}

impl ColumnValue {
    fn new(timestamp: i64) -> Self {
        Self {
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    fn into_entry(self) -> WriteEntry {
        let tags = self
            .tags
            .into_iter()
            .map(|(name_index, v)| Tag {
                name_index,
                value: Value::StringValue(v),
            })
            .collect();
        let fields = self
            .fields
            .into_iter()
            .map(|(name_index, v)| Field {
                name_index,
                value: Value::Float64Value(v),
            })
            .collect();

        WriteEntry {
            tags,
            field_groups: vec![FieldGroup {
                timestamp: self.timestamp,
                fields,
            }],
        }
    }
}

/// Encode a batch of points into a columnar write request.
///
/// Metrics appear in first-seen order; rows keep the order of `points`.
pub fn encode_points(points: &[Point]) -> WriteRequest {
    let mut metric_order: Vec<&str> = Vec::new();
    let mut schemas: HashMap<&str, ColumnSchema> = HashMap::new();

    for p in points {
        let schema = schemas.entry(p.metric.as_str()).or_insert_with(|| {
            metric_order.push(p.metric.as_str());
            ColumnSchema::default()
        });
        for name in p.tags.keys() {
            schema.add(name, true);
        }
        for name in p.fields.keys() {
            schema.add(name, false);
        }
    }

    let mut rows: HashMap<&str, Vec<WriteEntry>> = HashMap::with_capacity(schemas.len());
    for p in points {
        let schema = &schemas[p.metric.as_str()];
        rows.entry(p.metric.as_str())
            .or_default()
            .push(schema.encode_row(p).into_entry());
    }

    let metrics = metric_order
        .into_iter()
        .map(|metric| {
            let schema = &schemas[metric];
            WriteMetric {
                metric: metric.to_string(),
                tag_names: schema.tag_names().to_vec(),
                field_names: schema.field_names().to_vec(),
                entries: rows.remove(metric).unwrap_or_default(),
            }
        })
        .collect();

    WriteRequest { metrics }
}

/// Decode a columnar write request back into points
pub fn decode_request(req: &WriteRequest) -> Result<Vec<Point>> {
    let mut points = Vec::with_capacity(req.entry_count());

    for metric in &req.metrics {
        for entry in &metric.entries {
            let mut tags = BTreeMap::new();
            for tag in &entry.tags {
                let name = lookup(&metric.tag_names, tag.name_index, "tag")?;
                let value = tag
                    .value
                    .as_str()
                    .ok_or_else(|| StorageError::Decode(format!("Tag {} is not a string", name)))?;
                tags.insert(name.to_string(), value.to_string());
            }

            for group in &entry.field_groups {
                let mut fields = BTreeMap::new();
                for field in &group.fields {
                    let name = lookup(&metric.field_names, field.name_index, "field")?;
                    let value = field.value.as_f64().ok_or_else(|| {
                        StorageError::Decode(format!("Field {} is not numeric", name))
                    })?;
                    fields.insert(name.to_string(), value);
                }
                points.push(Point {
                    metric: metric.metric.clone(),
                    tags: tags.clone(),
                    timestamp: group.timestamp,
                    fields,
                });
            }
        }
    }

    Ok(points)
}

fn lookup<'a>(names: &'a [String], idx: u32, kind: &str) -> Result<&'a str> {
    names
        .get(idx as usize)
        .map(String::as_str)
        .ok_or_else(|| StorageError::Decode(format!("{} index {} out of range", kind, idx)))
}

/// Sends point batches to the remote store
pub struct Writer {
    client: Arc<dyn StorageClient>,
    timeout: Duration,
}

impl Writer {
    pub fn new(client: Arc<dyn StorageClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Write a batch, returning the number of points the store accepted.
    ///
    /// Every point must carry a metric name; the batch is rejected before
    /// encoding otherwise.
    pub async fn write(&self, points: &[Point]) -> Result<u32> {
        for p in points {
            p.validate()?;
        }
        if points.is_empty() {
            return Ok(0);
        }

        let req = encode_points(points);
        debug!(
            points = points.len(),
            metrics = req.metrics.len(),
            "Writing batch to remote store"
        );

        let resp = tokio::time::timeout(self.timeout, self.client.write(req))
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))??;

        if resp.header.code == CODE_OK {
            return Ok(resp.success);
        }

        error!(
            code = resp.header.code,
            error = %resp.header.error,
            success = resp.success,
            failed = resp.failed,
            "Remote write failed"
        );
        Err(StorageError::Remote {
            code: resp.header.code,
            message: resp.header.error,
        })
    }
}
