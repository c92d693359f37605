//! Time Series Analyzer
//!
//! Buckets each series into fixed-width intervals and fits a linear trend
//! to the per-interval means.

use super::stats;
use super::Analyzer;
use crate::config::TimeSeriesConfig;
use crate::metrics::{Metric, MetricType};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Slopes smaller than this in magnitude are reported as stable
const STABLE_SLOPE: f64 = 0.001;

pub const MAX_INTERVAL_MINUTES: u32 = 60;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;
pub const DEFAULT_MIN_POINTS_FOR_TREND: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,
    /// Change from the first to the last interval mean, in percent
    pub percent_change: f64,
}

impl Trend {
    fn insufficient() -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            slope: 0.0,
            percent_change: 0.0,
        }
    }
}

/// Fit a trend to consecutive interval means
pub fn calculate_trend(means: &[f64]) -> Trend {
    if means.len() < 2 {
        return Trend::insufficient();
    }
    let first = means[0];
    let last = means[means.len() - 1];

    let slope = stats::linear_slope(means);
    let direction = if slope.abs() < STABLE_SLOPE {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Trend {
        direction,
        slope,
        percent_change: percent_change(first, last),
    }
}

/// A zero starting value yields +inf for a positive end value, else 0
fn percent_change(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        if last > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        (last - first) / first * 100.0
    }
}

/// One time bucket of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub values: Vec<f64>,
}

/// Aggregate over every value of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub interval_count: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesAnalysis {
    pub name: String,
    pub metric_type: MetricType,
    pub intervals: Vec<IntervalStats>,
    pub trend: Trend,
    pub summary: SeriesSummary,
}

#[derive(Debug, Clone)]
pub struct TimeSeriesAnalyzer {
    interval_minutes: u32,
    min_points_for_trend: usize,
}

impl Default for TimeSeriesAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_MINUTES, DEFAULT_MIN_POINTS_FOR_TREND)
    }
}

impl TimeSeriesAnalyzer {
    /// Buckets align to the minute of the hour, so the interval is clamped
    /// to 1..=60 minutes.
    pub fn new(interval_minutes: u32, min_points_for_trend: usize) -> Self {
        Self {
            interval_minutes: interval_minutes.clamp(1, MAX_INTERVAL_MINUTES),
            min_points_for_trend,
        }
    }

    pub fn from_config(config: &TimeSeriesConfig) -> Self {
        Self::new(config.interval_minutes(), config.min_points_for_trend)
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn min_points_for_trend(&self) -> usize {
        self.min_points_for_trend
    }

    /// Start of the bucket holding `timestamp`: the minute rounded down to a
    /// multiple of the interval, seconds and below zeroed
    pub fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let minute = timestamp.minute() - timestamp.minute() % self.interval_minutes;
        timestamp
            .with_minute(minute)
            .and_then(|ts| ts.with_second(0))
            .and_then(|ts| ts.with_nanosecond(0))
            .unwrap_or(timestamp)
    }

    fn bucketize(&self, points: &[(DateTime<Utc>, f64)]) -> Vec<IntervalStats> {
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
        for (timestamp, value) in points {
            buckets
                .entry(self.bucket_start(*timestamp))
                .or_default()
                .push(*value);
        }

        buckets
            .into_iter()
            .filter_map(|(timestamp, values)| {
                let sorted = stats::sorted(&values);
                Some(IntervalStats {
                    timestamp,
                    count: values.len(),
                    min: *sorted.first()?,
                    max: *sorted.last()?,
                    mean: stats::mean(&values)?,
                    median: stats::median(&values)?,
                    values,
                })
            })
            .collect()
    }

    fn summarize(intervals: &[IntervalStats]) -> Option<SeriesSummary> {
        let values: Vec<f64> = intervals
            .iter()
            .flat_map(|i| i.values.iter().copied())
            .collect();
        let sorted = stats::sorted(&values);

        Some(SeriesSummary {
            count: values.len(),
            min: *sorted.first()?,
            max: *sorted.last()?,
            mean: stats::mean(&values)?,
            median: stats::median(&values)?,
            interval_count: intervals.len(),
            start: intervals.first()?.timestamp,
            end: intervals.last()?.timestamp,
        })
    }
}

impl Analyzer for TimeSeriesAnalyzer {
    type Output = BTreeMap<String, SeriesAnalysis>;

    fn analyze(&self, metrics: &[Metric]) -> Self::Output {
        let mut results = BTreeMap::new();

        for ((name, metric_type), group) in stats::group_by_series(metrics) {
            if group.len() < self.min_points_for_trend {
                debug!(
                    name = %name,
                    points = group.len(),
                    required = self.min_points_for_trend,
                    "Skipping series with too few points"
                );
                continue;
            }

            let Some(values) = stats::numeric_values(&group) else {
                debug!(name = %name, metric_type = %metric_type, "Skipping series with non-numeric values");
                continue;
            };

            let mut points: Vec<(DateTime<Utc>, f64)> = group
                .iter()
                .map(|m| m.timestamp)
                .zip(values)
                .collect();
            points.sort_by_key(|(timestamp, _)| *timestamp);

            let intervals = self.bucketize(&points);
            let means: Vec<f64> = intervals.iter().map(|i| i.mean).collect();
            let trend = calculate_trend(&means);

            let Some(summary) = Self::summarize(&intervals) else {
                continue;
            };

            results.insert(
                format!("{} ({})", name, metric_type),
                SeriesAnalysis {
                    name,
                    metric_type,
                    intervals,
                    trend,
                    summary,
                },
            );
        }

        results
    }

    fn get_name(&self) -> &str {
        "Time Series Analyzer"
    }

    fn get_description(&self) -> &str {
        "Buckets metrics into fixed time intervals and estimates their trend"
    }
}
