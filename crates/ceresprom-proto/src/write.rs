//! Columnar write request and response messages
//!
//! Tag and field values reference their column by index into the
//! `tag_names` / `field_names` of the enclosing `WriteMetric`. Those indices
//! are only meaningful within one request.

use crate::query::ResponseHeader;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub metrics: Vec<WriteMetric>,
}

impl WriteRequest {
    /// Total number of rows across all metrics
    pub fn entry_count(&self) -> usize {
        self.metrics.iter().map(|m| m.entries.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteMetric {
    pub metric: String,
    pub tag_names: Vec<String>,
    pub field_names: Vec<String>,
    pub entries: Vec<WriteEntry>,
}

/// One row: tag values plus timestamped field groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteEntry {
    pub tags: Vec<Tag>,
    pub field_groups: Vec<FieldGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name_index: u32,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldGroup {
    pub timestamp: i64,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name_index: u32,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Float64Value(f64),
    StringValue(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64Value(v) => Some(*v),
            Value::StringValue(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) => Some(s),
            Value::Float64Value(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub header: ResponseHeader,
    #[serde(default)]
    pub success: u32,
    #[serde(default)]
    pub failed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_count() {
        let req = WriteRequest {
            metrics: vec![
                WriteMetric {
                    metric: "cpu".to_string(),
                    entries: vec![WriteEntry::default(), WriteEntry::default()],
                    ..Default::default()
                },
                WriteMetric {
                    metric: "mem".to_string(),
                    entries: vec![WriteEntry::default()],
                    ..Default::default()
                },
            ],
        };
        assert_eq!(req.entry_count(), 3);
    }

    #[test]
    fn test_value_json() {
        let tag = Tag {
            name_index: 0,
            value: Value::StringValue("a".to_string()),
        };
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, r#"{"name_index":0,"value":{"string_value":"a"}}"#);
        let back: Tag = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value.as_str(), Some("a"));
        assert_eq!(back.value.as_f64(), None);
    }
}
