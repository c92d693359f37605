//! Performance Analyzer
//!
//! Groups duration and resource-usage metrics by operation, computes
//! per-operation statistics and flags bottlenecks against fixed thresholds.

use super::stats;
use super::Analyzer;
use crate::config::PerformanceThresholds;
use crate::metrics::{Metric, MetricType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Keys consulted, tags first and then context, to find a metric's operation
const OPERATION_KEYS: [&str; 3] = ["operation", "component", "action"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// Duration statistics of one operation (milliseconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub count: usize,
    pub total: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    /// Falls back to `max` on samples too small for a tail estimate
    pub p95: f64,
    pub p99: f64,
}

/// Usage statistics of one resource type (percent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub operation: String,
    pub durations: Option<DurationStats>,
    pub resources: BTreeMap<MetricType, ResourceStats>,
}

impl OperationStats {
    pub fn avg_duration(&self) -> Option<f64> {
        self.durations.as_ref().map(|d| d.avg)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub operation: String,
    pub metrics: OperationStats,
    pub impact: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub operation: String,
    pub recommendation: String,
    pub priority: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRank {
    pub operation: String,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub operation_count: usize,
    pub bottleneck_count: usize,
    pub total_calls: usize,
    pub total_duration: f64,
    /// Mean over every call, so busy operations weigh more
    pub average_duration: f64,
    pub slowest_operation: Option<OperationRank>,
    pub fastest_operation: Option<OperationRank>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub operations: BTreeMap<String, OperationStats>,
    pub bottlenecks: Vec<Bottleneck>,
    pub recommendations: Vec<Recommendation>,
    pub summary: PerformanceSummary,
}

/// Resolve the operation a metric belongs to.
///
/// Priority: tag `operation`, `component`, `action`, then the same keys in
/// the context, then the metric name.
pub fn operation_key(metric: &Metric) -> String {
    for key in OPERATION_KEYS {
        if let Some(value) = metric.tag(key) {
            return value.to_string();
        }
    }
    for key in OPERATION_KEYS {
        if let Some(value) = metric.context_text(key) {
            return value;
        }
    }
    metric.name.clone()
}

#[derive(Debug, Clone, Default)]
pub struct PerformanceAnalyzer {
    thresholds: PerformanceThresholds,
}

impl PerformanceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: PerformanceThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PerformanceThresholds {
        &self.thresholds
    }

    fn duration_stats(&self, values: &[f64]) -> Option<DurationStats> {
        let sorted = stats::sorted(values);
        let max = *sorted.last()?;
        let total: f64 = values.iter().sum();

        let p95 = if sorted.len() < self.thresholds.p95_min_samples {
            max
        } else {
            stats::percentile(&sorted, 95.0)?
        };
        let p99 = if sorted.len() < self.thresholds.p99_min_samples {
            max
        } else {
            stats::percentile(&sorted, 99.0)?
        };

        Some(DurationStats {
            count: values.len(),
            total,
            min: *sorted.first()?,
            max,
            avg: total / values.len() as f64,
            median: stats::median(values)?,
            p95,
            p99,
        })
    }

    fn resource_stats(values: &[f64]) -> Option<ResourceStats> {
        let sorted = stats::sorted(values);
        Some(ResourceStats {
            count: values.len(),
            min: *sorted.first()?,
            max: *sorted.last()?,
            avg: stats::mean(values)?,
        })
    }

    /// Apply every threshold check in order; a later hit replaces an earlier
    /// one for the same operation
    fn classify(&self, stats: &OperationStats) -> Option<(Severity, String)> {
        let t = &self.thresholds;
        let mut flagged = None;

        if let Some(durations) = &stats.durations {
            if durations.avg > t.high_avg_duration_ms {
                flagged = Some((
                    Severity::High,
                    format!(
                        "Average duration {:.1} ms exceeds {} ms; optimize or parallelize this operation",
                        durations.avg, t.high_avg_duration_ms
                    ),
                ));
            } else if durations.avg > t.medium_avg_duration_ms {
                flagged = Some((
                    Severity::Medium,
                    format!(
                        "Average duration {:.1} ms exceeds {} ms; consider optimizing this operation",
                        durations.avg, t.medium_avg_duration_ms
                    ),
                ));
            }

            if durations.max > t.max_duration_ms {
                flagged = Some((
                    Severity::Medium,
                    format!(
                        "Maximum duration {:.1} ms exceeds {} ms; investigate occasional slowness",
                        durations.max, t.max_duration_ms
                    ),
                ));
            }
        }

        for (resource, usage) in &stats.resources {
            if usage.avg > t.high_resource_usage {
                flagged = Some((
                    Severity::High,
                    format!(
                        "Average {} of {:.1}% exceeds {}%; reduce resource consumption",
                        resource, usage.avg, t.high_resource_usage
                    ),
                ));
            } else if usage.avg > t.medium_resource_usage {
                flagged = Some((
                    Severity::Medium,
                    format!(
                        "Average {} of {:.1}% exceeds {}%; monitor resource consumption",
                        resource, usage.avg, t.medium_resource_usage
                    ),
                ));
            }
        }

        flagged
    }

    fn summarize(
        operations: &BTreeMap<String, OperationStats>,
        bottleneck_count: usize,
    ) -> PerformanceSummary {
        let mut summary = PerformanceSummary {
            operation_count: operations.len(),
            bottleneck_count,
            ..Default::default()
        };

        for stats in operations.values() {
            let Some(durations) = &stats.durations else {
                continue;
            };
            summary.total_calls += durations.count;
            summary.total_duration += durations.total;

            let rank = || OperationRank {
                operation: stats.operation.clone(),
                avg_duration: durations.avg,
            };
            if summary
                .slowest_operation
                .as_ref()
                .map_or(true, |s| durations.avg > s.avg_duration)
            {
                summary.slowest_operation = Some(rank());
            }
            if summary
                .fastest_operation
                .as_ref()
                .map_or(true, |f| durations.avg < f.avg_duration)
            {
                summary.fastest_operation = Some(rank());
            }
        }

        if summary.total_calls > 0 {
            summary.average_duration = summary.total_duration / summary.total_calls as f64;
        }
        summary
    }
}

impl Analyzer for PerformanceAnalyzer {
    type Output = PerformanceAnalysis;

    fn analyze(&self, metrics: &[Metric]) -> PerformanceAnalysis {
        let mut durations: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut resources: BTreeMap<String, BTreeMap<MetricType, Vec<f64>>> = BTreeMap::new();

        for metric in metrics.iter().filter(|m| m.metric_type.is_performance()) {
            let Some(value) = metric.value.as_f64() else {
                continue;
            };
            let operation = operation_key(metric);
            if metric.metric_type.is_duration() {
                durations.entry(operation).or_default().push(value);
            } else {
                resources
                    .entry(operation)
                    .or_default()
                    .entry(metric.metric_type)
                    .or_default()
                    .push(value);
            }
        }

        let mut operations: BTreeMap<String, OperationStats> = BTreeMap::new();
        for (operation, values) in &durations {
            operations
                .entry(operation.clone())
                .or_insert_with(|| empty_operation(operation))
                .durations = self.duration_stats(values);
        }
        for (operation, by_type) in &resources {
            let entry = operations
                .entry(operation.clone())
                .or_insert_with(|| empty_operation(operation));
            for (resource, values) in by_type {
                if let Some(usage) = Self::resource_stats(values) {
                    entry.resources.insert(*resource, usage);
                }
            }
        }

        let mut bottlenecks = Vec::new();
        let mut recommendations = Vec::new();
        for stats in operations.values() {
            if let Some((severity, recommendation)) = self.classify(stats) {
                debug!(
                    operation = %stats.operation,
                    impact = ?severity,
                    "Flagged bottleneck"
                );
                bottlenecks.push(Bottleneck {
                    operation: stats.operation.clone(),
                    metrics: stats.clone(),
                    impact: severity,
                });
                recommendations.push(Recommendation {
                    operation: stats.operation.clone(),
                    recommendation,
                    priority: severity,
                });
            }
        }

        let summary = Self::summarize(&operations, bottlenecks.len());
        PerformanceAnalysis {
            operations,
            bottlenecks,
            recommendations,
            summary,
        }
    }

    fn get_name(&self) -> &str {
        "Performance Analyzer"
    }

    fn get_description(&self) -> &str {
        "Computes per-operation duration and resource statistics and flags bottlenecks"
    }
}

fn empty_operation(operation: &str) -> OperationStats {
    OperationStats {
        operation: operation.to_string(),
        durations: None,
        resources: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn timing(operation: &str, ms: f64) -> Metric {
        Metric::new("step", ms, MetricType::Duration).with_tag("operation", operation)
    }

    #[test]
    fn test_operation_key_priority() {
        let by_tag = Metric::new("n", 1.0, MetricType::Duration)
            .with_tag("action", "click")
            .with_tag("component", "form")
            .with_context_value("operation", "ctx-op");
        assert_eq!(operation_key(&by_tag), "form");

        let by_context = Metric::new("n", 1.0, MetricType::Duration)
            .with_context_value("action", "scroll")
            .with_context_value("component", "page");
        assert_eq!(operation_key(&by_context), "page");

        let by_name = Metric::new("fallback", 1.0, MetricType::Duration);
        assert_eq!(operation_key(&by_name), "fallback");

        let numeric_context = Metric::new("n", 1.0, MetricType::Duration)
            .with_context_value("operation", json!(7));
        assert_eq!(operation_key(&numeric_context), "7");
    }

    #[test]
    fn test_empty_input() {
        let analysis = PerformanceAnalyzer::new().analyze(&[]);
        assert!(analysis.operations.is_empty());
        assert_eq!(analysis.summary, PerformanceSummary::default());
    }

    #[test]
    fn test_ignores_non_performance_types() {
        let metrics = vec![Metric::new("clicks", 5, MetricType::Count)];
        assert!(PerformanceAnalyzer::new().analyze(&metrics).operations.is_empty());
    }

    #[test]
    fn test_high_threshold_is_strict() {
        let analyzer = PerformanceAnalyzer::new();

        let at_threshold = analyzer.analyze(&[timing("login", 1000.0)]);
        assert_eq!(at_threshold.bottlenecks.len(), 1);
        assert_eq!(at_threshold.bottlenecks[0].impact, Severity::Medium);

        let above = analyzer.analyze(&[timing("login", 1000.01)]);
        assert_eq!(above.bottlenecks[0].impact, Severity::High);
        assert_eq!(above.recommendations[0].priority, Severity::High);
    }

    #[test]
    fn test_max_duration_overrides_earlier_flag() {
        let analysis = PerformanceAnalyzer::new().analyze(&[
            timing("export", 2500.0),
            timing("export", 100.0),
        ]);
        assert_eq!(analysis.bottlenecks.len(), 1);
        assert_eq!(analysis.bottlenecks[0].impact, Severity::Medium);
        assert!(analysis.recommendations[0]
            .recommendation
            .contains("occasional slowness"));
    }

    #[test]
    fn test_resource_usage_flags() {
        let cpu = Metric::new("cpu", 85.0, MetricType::CpuUsage).with_tag("component", "renderer");
        let mem = Metric::new("mem", 65.0, MetricType::MemoryUsage).with_tag("component", "cache");
        let analysis = PerformanceAnalyzer::new().analyze(&[cpu, mem]);

        let impacts: BTreeMap<_, _> = analysis
            .bottlenecks
            .iter()
            .map(|b| (b.operation.as_str(), b.impact))
            .collect();
        assert_eq!(impacts["renderer"], Severity::High);
        assert_eq!(impacts["cache"], Severity::Medium);
        assert!(analysis.operations["renderer"].durations.is_none());
    }

    #[test]
    fn test_tail_percentiles_fall_back_to_max() {
        let metrics: Vec<Metric> = (1..=10).map(|i| timing("nav", i as f64)).collect();
        let analysis = PerformanceAnalyzer::new().analyze(&metrics);
        let durations = analysis.operations["nav"].durations.clone().unwrap();
        assert_eq!(durations.p95, 10.0);
        assert_eq!(durations.p99, 10.0);

        let metrics: Vec<Metric> = (1..=20).map(|i| timing("nav", i as f64)).collect();
        let analysis = PerformanceAnalyzer::new().analyze(&metrics);
        let durations = analysis.operations["nav"].durations.clone().unwrap();
        assert!((durations.p95 - 19.05).abs() < 1e-9);
        assert_eq!(durations.p99, 20.0);
    }

    #[test]
    fn test_summary_weighted_by_calls() {
        let analysis = PerformanceAnalyzer::new().analyze(&[
            timing("fast", 10.0),
            timing("fast", 20.0),
            timing("fast", 30.0),
            timing("slow", 210.0),
        ]);
        let summary = &analysis.summary;

        assert_eq!(summary.operation_count, 2);
        assert_eq!(summary.bottleneck_count, 0);
        assert_eq!(summary.total_calls, 4);
        assert_eq!(summary.total_duration, 270.0);
        assert_eq!(summary.average_duration, 67.5);
        assert_eq!(summary.slowest_operation.as_ref().unwrap().operation, "slow");
        assert_eq!(summary.fastest_operation.as_ref().unwrap().operation, "fast");
    }
}
