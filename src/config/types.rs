//! Configuration Types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub storage: StorageConfig,
    pub time_series: TimeSeriesConfig,
    pub performance: PerformanceThresholds,
    pub logging: LoggingConfig,
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub storage_dir: PathBuf,
}

/// Time-series bucketing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeSeriesConfig {
    /// Bucket width; whole minutes only
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub min_points_for_trend: usize,
}

impl TimeSeriesConfig {
    pub fn interval_minutes(&self) -> u32 {
        ((self.interval.as_secs() / 60) as u32).max(1)
    }
}

/// Bottleneck thresholds. Durations in milliseconds, usage in percent.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PerformanceThresholds {
    pub high_avg_duration_ms: f64,
    pub medium_avg_duration_ms: f64,
    pub max_duration_ms: f64,
    pub high_resource_usage: f64,
    pub medium_resource_usage: f64,
    pub p95_min_samples: usize,
    pub p99_min_samples: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("metrics_data"),
        }
    }
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            min_points_for_trend: 3,
        }
    }
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            high_avg_duration_ms: 1000.0,
            medium_avg_duration_ms: 500.0,
            max_duration_ms: 2000.0,
            high_resource_usage: 80.0,
            medium_resource_usage: 60.0,
            p95_min_samples: 20,
            p99_min_samples: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
