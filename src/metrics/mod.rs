//! Metrics Module
//!
//! Metric entities, collectors, the session manager and reporting.

pub mod collector;
pub mod manager;
pub mod reporter;
pub mod types;

pub use collector::{MetricCollector, TimingGuard};
pub use manager::AnalyticsManager;
pub use reporter::{export_report_csv, export_report_json, PerformanceReport};
pub use types::{Context, Metric, MetricType, MetricValue, Tags};
