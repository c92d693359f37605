//! Run Analytics Library
//!
//! Collects timestamped measurements during automation runs and derives
//! statistics, trends and performance diagnostics from them.
//!
//! Producers record into a [`MetricCollector`], the [`AnalyticsManager`]
//! aggregates and persists collectors, and an [`analysis::Analyzer`] turns
//! the aggregated metric list into a structured result.
//!
//! The engine is synchronous and unsynchronised: callers sharing a manager
//! or collector across threads must serialise access themselves.

pub mod analysis;
pub mod config;
pub mod error;
pub mod metrics;

pub use analysis::{Analyzer, PerformanceAnalyzer, StatisticalAnalyzer, TimeSeriesAnalyzer};
pub use config::AnalyticsConfig;
pub use error::AnalyticsError;
pub use metrics::{AnalyticsManager, Metric, MetricCollector, MetricType, MetricValue, PerformanceReport};

/// Common error type for configuration and application plumbing
pub type Result<T> = anyhow::Result<T>;
