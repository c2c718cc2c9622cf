//! Remote series and the cursors over them

use crate::error::{Result, StorageError};
use ceresprom_core::{Label, Labels, METRIC_NAME};
use ceresprom_proto::{Sample, TimeSeries};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Series fetched for one query, shared between the querier and the nodes
/// whose computation was delegated to the remote store.
pub type SeriesSlot = Arc<RwLock<Vec<RemoteSeries>>>;

/// A series returned by the remote store.
///
/// The store does not keep the metric name as a tag, so it is carried
/// separately and synthesized into the label set on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSeries {
    pub metric: String,
    pub tags: Vec<Label>,
    /// Samples ordered by timestamp
    pub samples: Vec<Sample>,
}

impl RemoteSeries {
    pub fn new(metric: impl Into<String>, tags: Vec<Label>, samples: Vec<Sample>) -> Self {
        Self {
            metric: metric.into(),
            tags,
            samples,
        }
    }

    /// Build from a wire series, naming it after the queried metric
    pub fn from_wire(metric: &str, ts: TimeSeries) -> Self {
        Self::new(metric, ts.labels, ts.samples)
    }

    /// Label set including `__name__`, in canonical order
    pub fn labels(&self) -> Labels {
        let mut labels = Vec::with_capacity(self.tags.len() + 1);
        labels.push(Label::new(METRIC_NAME, self.metric.clone()));
        labels.extend(self.tags.iter().cloned());
        Labels::new(labels)
    }

    pub fn iter(&self) -> SeriesIterator<'_> {
        SeriesIterator::new(self)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl fmt::Display for RemoteSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "metric:{}, labels:{}, samples:{}",
            self.metric,
            Labels::new(self.tags.clone()),
            self.samples.len()
        )
    }
}

/// Cursor over the samples of one series.
///
/// The cursor starts before the first sample; `at` returns `None` until
/// `seek` or `next` has positioned it on a sample.
pub struct SeriesIterator<'a> {
    cur: Option<usize>,
    samples: &'a [Sample],
}

impl<'a> SeriesIterator<'a> {
    fn new(series: &'a RemoteSeries) -> Self {
        Self {
            cur: None,
            samples: &series.samples,
        }
    }

    /// Position at the first sample with timestamp >= `t`.
    ///
    /// Returns whether such a sample exists.
    pub fn seek(&mut self, t: i64) -> bool {
        let idx = self.samples.partition_point(|s| s.timestamp < t);
        self.cur = Some(idx);
        idx < self.samples.len()
    }

    /// Advance one sample. Returns whether a sample exists at the new position.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let idx = self.cur.map_or(0, |c| c.saturating_add(1));
        self.cur = Some(idx.min(self.samples.len()));
        idx < self.samples.len()
    }

    /// (timestamp, value) at the current position
    pub fn at(&self) -> Option<(i64, f64)> {
        self.cur
            .and_then(|c| self.samples.get(c))
            .map(|s| (s.timestamp, s.value))
    }

    /// Index of the current sample
    pub fn position(&self) -> Option<usize> {
        self.cur.filter(|&c| c < self.samples.len())
    }

    /// Sample cursors never fail on their own; upstream failures are
    /// reported by the failed series set instead.
    pub fn err(&self) -> Option<&StorageError> {
        None
    }
}

/// Result of a select: either the fetched series or the cause of failure
#[derive(Debug)]
pub enum SeriesSet {
    Concrete { series: Vec<RemoteSeries>, cur: usize },
    Failed(StorageError),
}

impl SeriesSet {
    pub fn new(series: Vec<RemoteSeries>) -> Self {
        SeriesSet::Concrete { series, cur: 0 }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failed(err: StorageError) -> Self {
        SeriesSet::Failed(err)
    }

    /// Advance to the next series
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        match self {
            SeriesSet::Concrete { series, cur } => {
                *cur += 1;
                *cur <= series.len()
            }
            SeriesSet::Failed(_) => false,
        }
    }

    /// Series at the current position
    pub fn at(&self) -> Option<&RemoteSeries> {
        match self {
            SeriesSet::Concrete { series, cur } => cur.checked_sub(1).and_then(|i| series.get(i)),
            SeriesSet::Failed(_) => None,
        }
    }

    pub fn err(&self) -> Option<&StorageError> {
        match self {
            SeriesSet::Concrete { .. } => None,
            SeriesSet::Failed(e) => Some(e),
        }
    }

    /// Consume the set, yielding all series or the failure cause
    pub fn into_series(self) -> Result<Vec<RemoteSeries>> {
        match self {
            SeriesSet::Concrete { series, .. } => Ok(series),
            SeriesSet::Failed(e) => Err(e),
        }
    }
}
