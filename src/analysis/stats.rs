//! Numeric helpers shared by the analyzers

use crate::metrics::{Metric, MetricType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics grouped by `(name, metric_type)`, in key order
pub type SeriesGroups<'a> = BTreeMap<(String, MetricType), Vec<&'a Metric>>;

pub fn group_by_series(metrics: &[Metric]) -> SeriesGroups<'_> {
    let mut groups: SeriesGroups<'_> = BTreeMap::new();
    for metric in metrics {
        groups
            .entry((metric.name.clone(), metric.metric_type))
            .or_default()
            .push(metric);
    }
    groups
}

/// Numeric values of a group, or `None` if any value is not numeric
pub fn numeric_values(metrics: &[&Metric]) -> Option<Vec<f64>> {
    metrics.iter().map(|m| m.value.as_f64()).collect()
}

/// Ascending copy of `values`; NaN sorts last
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample variance (n - 1 denominator); needs at least two values
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some(squares / (values.len() - 1) as f64)
}

pub fn stdev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Linearly interpolated percentile of already sorted values.
///
/// Uses `k = (n - 1) * p / 100` and interpolates between the order
/// statistics at `floor(k)` and `ceil(k)`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let k = (sorted.len() - 1) as f64 * p.clamp(0.0, 100.0) / 100.0;
    let floor = k.floor() as usize;
    let ceil = k.ceil() as usize;
    if floor == ceil {
        return Some(sorted[floor]);
    }
    Some(sorted[floor] * (ceil as f64 - k) + sorted[ceil] * (k - floor as f64))
}

/// One equal-width histogram bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// `round(sqrt(n))` clamped to 5..=10
pub fn bin_count(n: usize) -> usize {
    ((n as f64).sqrt().round() as usize).clamp(5, 10)
}

/// Equal-width histogram over `[min, max]`.
///
/// Identical values collapse to a single bin. The last bin's upper edge is
/// exactly `max`.
pub fn histogram(values: &[f64]) -> Vec<HistogramBin> {
    if values.is_empty() {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let bins = bin_count(values.len());
    let width = (max - min) / bins as f64;

    let mut histogram: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + i as f64 * width,
            upper: if i + 1 == bins {
                max
            } else {
                min + (i + 1) as f64 * width
            },
            count: 0,
        })
        .collect();

    for value in values {
        let index = (((value - min) / width).floor() as usize).min(bins - 1);
        histogram[index].count += 1;
    }

    histogram
}

/// Ordinary least-squares slope of `values` against their index
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
