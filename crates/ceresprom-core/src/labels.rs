//! Label sets and label matchers

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reserved label carrying the metric name
pub const METRIC_NAME: &str = "__name__";

/// A single name/value label pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    /// Create a new label
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.name.cmp(&other.name) {
            Ordering::Equal => self.value.cmp(&other.value),
            other => other,
        }
    }
}

/// A label set kept in canonical (name-sorted) order
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Build a label set, sorting it into canonical order
    pub fn new(mut labels: Vec<Label>) -> Self {
        labels.sort();
        Self(labels)
    }

    /// Build a label set from name/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| Label::new(k, v)).collect())
    }

    /// Value of the label with the given name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    /// The metric name, if the set carries one
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME)
    }

    /// Copy of this set without the metric-name label.
    ///
    /// Once a series has been run through an aggregate or function its
    /// original metric name no longer describes it.
    pub fn without_metric_name(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|l| l.name != METRIC_NAME)
                .cloned()
                .collect(),
        )
    }

    /// Split into (metric name, remaining labels as a map)
    pub fn split_metric(&self) -> (Option<String>, BTreeMap<String, String>) {
        let mut metric = None;
        let mut tags = BTreeMap::new();
        for label in &self.0 {
            if label.name == METRIC_NAME {
                metric = Some(label.value.clone());
            } else {
                tags.insert(label.name.clone(), label.value.clone());
            }
        }
        (metric, tags)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:?}", label.name, label.value)?;
        }
        write!(f, "}}")
    }
}

/// Label matcher operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    Regexp,
    /// `!~`
    NotRegexp,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Equal => write!(f, "="),
            MatchType::NotEqual => write!(f, "!="),
            MatchType::Regexp => write!(f, "=~"),
            MatchType::NotRegexp => write!(f, "!~"),
        }
    }
}

impl FromStr for MatchType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(MatchType::Equal),
            "!=" => Ok(MatchType::NotEqual),
            "=~" => Ok(MatchType::Regexp),
            "!~" => Ok(MatchType::NotRegexp),
            other => Err(CoreError::UnsupportedMatchType(other.to_string())),
        }
    }
}

/// A label matcher such as `host=~"a|b"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Matcher {
    pub name: String,
    pub value: String,
    pub match_type: MatchType,
}

impl Matcher {
    /// Create a new matcher
    pub fn new(match_type: MatchType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            match_type,
        }
    }

    /// Create a matcher from its textual operator
    pub fn parse(name: impl Into<String>, op: &str, value: impl Into<String>) -> Result<Self> {
        let match_type = op.parse()?;
        Ok(Self::new(match_type, name, value))
    }

    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::Equal, name, value)
    }

    pub fn not_equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::NotEqual, name, value)
    }

    pub fn regexp(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::Regexp, name, value)
    }

    pub fn not_regexp(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::NotRegexp, name, value)
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.match_type, self.value)
    }
}
