//! Matcher normalization and selector parameters
//!
//! Two pseudo-labels steer the bridge rather than select series: one picks
//! the field (column) to read, the other switches pushdown off for a query.
//! Neither ever reaches the remote store as a filter.

use crate::error::{QueryError, Result};
use ceresprom_core::{MatchType, Matcher, DEFAULT_FIELD, METRIC_NAME};
use ceresprom_proto::{Filter, FilterType};
use serde::{Deserialize, Serialize};

/// Pseudo-label selecting the field to read
pub const FIELD_LABEL: &str = "__ceresdb_field__";
/// Pseudo-label disabling pushdown when set to "false"
pub const PUSHDOWN_LABEL: &str = "__ceresdb_pushdown__";

/// Pushdown settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushdownConfig {
    /// Label used to select the field
    pub field_label: String,
    /// Label used to disable pushdown per query
    pub pushdown_label: String,
    /// Field read when no field label is given
    pub default_field: String,
    /// Rewrite pure alternation regexes (`a|b`) into literal sets
    pub literal_or_rewrite: bool,
}

impl Default for PushdownConfig {
    fn default() -> Self {
        Self {
            field_label: FIELD_LABEL.to_string(),
            pushdown_label: PUSHDOWN_LABEL.to_string(),
            default_field: DEFAULT_FIELD.to_string(),
            literal_or_rewrite: false,
        }
    }
}

/// Strip the pushdown pseudo-label, returning the remaining matchers in
/// order and whether pushdown stays enabled.
pub fn normalize_matchers(matchers: &[Matcher], config: &PushdownConfig) -> (Vec<Matcher>, bool) {
    let mut enabled = true;
    let mut remaining = Vec::with_capacity(matchers.len());
    for m in matchers {
        if m.name == config.pushdown_label {
            if m.value == "false" {
                enabled = false;
            }
        } else {
            remaining.push(m.clone());
        }
    }
    (remaining, enabled)
}

/// Characters that change meaning outside a character class
const REGEX_META: &[char] = &[
    '\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
];

/// Split a pure alternation such as `a|b|c` into its literal branches.
///
/// Declines (returns `None`) for anything that is not a valid pattern made
/// only of non-empty, metacharacter-free branches. `-`, `#`, `&` and `~`
/// only matter inside a class or under flags, so branches may carry them.
pub fn parse_literal_or(pattern: &str) -> Option<Vec<String>> {
    if regex::Regex::new(pattern).is_err() {
        return None;
    }
    let branches: Vec<&str> = pattern.split('|').collect();
    let literal = branches
        .iter()
        .all(|b| !b.is_empty() && !b.contains(REGEX_META));
    literal.then(|| branches.into_iter().map(String::from).collect())
}

fn anchored(pattern: &str) -> Vec<String> {
    vec![format!("^(?:{})$", pattern)]
}

/// What a selector reads: metric, field and tag filters
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub metric: String,
    pub field: String,
    pub filters: Vec<Filter>,
}

impl QueryParam {
    /// Build selector parameters from normalized matchers
    pub fn from_matchers(matchers: &[Matcher], config: &PushdownConfig) -> Result<Self> {
        let mut param = QueryParam {
            metric: String::new(),
            field: config.default_field.clone(),
            filters: Vec::with_capacity(matchers.len().saturating_sub(1)),
        };

        for m in matchers {
            if m.name == METRIC_NAME {
                if m.match_type != MatchType::Equal {
                    return Err(QueryError::InvalidMatcher {
                        label: METRIC_NAME.to_string(),
                        match_type: m.match_type,
                    });
                }
                param.metric = m.value.clone();
            } else if m.name == config.field_label {
                param.field = m.value.clone();
            } else {
                param.filters.push(filter_for(m, config));
            }
        }

        Ok(param)
    }
}

fn filter_for(m: &Matcher, config: &PushdownConfig) -> Filter {
    let literals = || {
        if config.literal_or_rewrite {
            parse_literal_or(&m.value)
        } else {
            None
        }
    };

    let (filter_type, params) = match m.match_type {
        MatchType::Equal => (FilterType::LiteralOr, vec![m.value.clone()]),
        MatchType::NotEqual => (FilterType::NotLiteralOr, vec![m.value.clone()]),
        MatchType::Regexp => match literals() {
            Some(values) => (FilterType::LiteralOr, values),
            None => (FilterType::Regexp, anchored(&m.value)),
        },
        MatchType::NotRegexp => match literals() {
            Some(values) => (FilterType::NotLiteralOr, values),
            None => (FilterType::NotRegexpMatch, anchored(&m.value)),
        },
    };

    Filter::single(m.name.clone(), filter_type, params)
}
