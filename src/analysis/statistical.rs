//! Statistical Analyzer
//!
//! Descriptive statistics, percentiles and a distribution histogram per
//! `(name, metric_type)` series.

use super::stats::{self, HistogramBin};
use super::Analyzer;
use crate::metrics::{Metric, MetricType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Interpolated percentiles of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    fn from_sorted(sorted: &[f64]) -> Option<Self> {
        Some(Self {
            p25: stats::percentile(sorted, 25.0)?,
            p50: stats::percentile(sorted, 50.0)?,
            p75: stats::percentile(sorted, 75.0)?,
            p90: stats::percentile(sorted, 90.0)?,
            p95: stats::percentile(sorted, 95.0)?,
            p99: stats::percentile(sorted, 99.0)?,
        })
    }
}

/// Statistics of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub name: String,
    pub metric_type: MetricType,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub sum: f64,
    pub mean: f64,
    pub median: Option<f64>,
    /// Sample variance; absent below two samples
    pub variance: Option<f64>,
    pub stdev: Option<f64>,
    pub percentiles: Percentiles,
    pub distribution: Vec<HistogramBin>,
}

#[derive(Debug, Clone, Default)]
pub struct StatisticalAnalyzer;

impl StatisticalAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn describe(name: &str, metric_type: MetricType, values: &[f64]) -> Option<MetricStatistics> {
        let sorted = stats::sorted(values);
        let min = *sorted.first()?;
        let max = *sorted.last()?;
        let sum: f64 = values.iter().sum();

        Some(MetricStatistics {
            name: name.to_string(),
            metric_type,
            count: values.len(),
            min,
            max,
            range: max - min,
            sum,
            mean: sum / values.len() as f64,
            median: stats::median(values),
            variance: stats::variance(values),
            stdev: stats::stdev(values),
            percentiles: Percentiles::from_sorted(&sorted)?,
            distribution: stats::histogram(values),
        })
    }
}

impl Analyzer for StatisticalAnalyzer {
    type Output = BTreeMap<String, MetricStatistics>;

    fn analyze(&self, metrics: &[Metric]) -> Self::Output {
        let mut results = BTreeMap::new();

        for ((name, metric_type), group) in stats::group_by_series(metrics) {
            let Some(values) = stats::numeric_values(&group) else {
                debug!(name = %name, metric_type = %metric_type, "Skipping series with non-numeric values");
                continue;
            };

            if let Some(statistics) = Self::describe(&name, metric_type, &values) {
                results.insert(format!("{} ({})", name, metric_type), statistics);
            }
        }

        results
    }

    fn get_name(&self) -> &str {
        "Statistical Analyzer"
    }

    fn get_description(&self) -> &str {
        "Computes descriptive statistics, percentiles and value distributions per metric"
    }
}
