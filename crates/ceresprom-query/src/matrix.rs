//! Conversion of remotely computed series into a result matrix

use ceresprom_core::Labels;
use ceresprom_proto::Sample;
use ceresprom_storage::RemoteSeries;

/// One series of a range result
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSeries {
    pub labels: Labels,
    pub points: Vec<Sample>,
}

pub type Matrix = Vec<MatrixSeries>;

/// Build the result matrix of a pushed-down node.
///
/// The values were computed by an aggregate or function, so the metric name
/// no longer applies and is dropped. Series without samples are skipped.
pub fn series_to_matrix(series: &[RemoteSeries]) -> Matrix {
    let mut matrix = Vec::with_capacity(series.len());
    for s in series {
        let mut points = Vec::with_capacity(s.samples.len());
        let mut it = s.iter();
        while it.next() {
            if let Some((t, v)) = it.at() {
                points.push(Sample::new(t, v));
            }
        }
        if points.is_empty() {
            continue;
        }
        matrix.push(MatrixSeries {
            labels: s.labels().without_metric_name(),
            points,
        });
    }
    matrix
}
