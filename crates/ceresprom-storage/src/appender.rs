//! Sample appender backed by the remote writer

use crate::error::Result;
use crate::write::Writer;
use ceresprom_core::{Labels, Point, Timestamp};
use std::sync::Arc;
use tracing::debug;

/// Buffers samples until `commit`, then ships them as one batch
pub struct Appender {
    writer: Arc<Writer>,
    points: Vec<Point>,
}

impl Appender {
    pub fn new(writer: Arc<Writer>) -> Self {
        Self {
            writer,
            points: Vec::new(),
        }
    }

    /// Buffer one sample. The label set must carry a non-empty `__name__`.
    pub fn append(&mut self, labels: &Labels, t: Timestamp, v: f64) -> Result<()> {
        let point = Point::from_labels(labels, t, v)?;
        self.points.push(point);
        Ok(())
    }

    /// Number of buffered samples
    pub fn pending(&self) -> usize {
        self.points.len()
    }

    /// Write every buffered sample and clear the buffer.
    ///
    /// The buffer is cleared even when the write fails.
    pub async fn commit(&mut self) -> Result<u32> {
        let points = std::mem::take(&mut self.points);
        debug!(points = points.len(), "Committing appended samples");
        self.writer.write(&points).await
    }

    /// Discard every buffered sample
    pub fn rollback(&mut self) {
        self.points.clear();
    }
}
