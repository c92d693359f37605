//! Performance Reporter
//!
//! Runs a [`PerformanceAnalyzer`] over a metric snapshot and exposes the
//! bottlenecks, recommendations and per-operation details for rendering.

use super::Metric;
use crate::analysis::{
    Analyzer, Bottleneck, OperationStats, PerformanceAnalysis, PerformanceAnalyzer,
    PerformanceSummary, Recommendation,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use tracing::{info, warn};

/// Performance report over a collected metric snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub report_id: String,
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    analyzer: PerformanceAnalyzer,
    #[serde(skip)]
    metrics: Vec<Metric>,
    pub analysis: PerformanceAnalysis,
}

impl Default for PerformanceReport {
    fn default() -> Self {
        Self::new(PerformanceAnalyzer::default())
    }
}

impl PerformanceReport {
    pub fn new(analyzer: PerformanceAnalyzer) -> Self {
        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            collected_at: None,
            analyzer,
            metrics: Vec::new(),
            analysis: PerformanceAnalysis::default(),
        }
    }

    /// Snapshot `metrics`, stamp the collection time and run the analysis
    pub fn collect_data(&mut self, metrics: &[Metric]) {
        self.metrics = metrics.to_vec();
        self.collected_at = Some(Utc::now());

        let relevant = metrics
            .iter()
            .filter(|m| m.metric_type.is_performance())
            .count();
        if relevant == 0 {
            warn!(
                report_id = %self.report_id,
                metric_count = metrics.len(),
                "No performance metrics to analyze"
            );
        }

        self.analysis = self.analyzer.analyze(&self.metrics);

        info!(
            report_id = %self.report_id,
            operations = self.analysis.summary.operation_count,
            bottlenecks = self.analysis.summary.bottleneck_count,
            "Performance report collected"
        );
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn get_bottlenecks(&self) -> &[Bottleneck] {
        &self.analysis.bottlenecks
    }

    pub fn get_recommendations(&self) -> &[Recommendation] {
        &self.analysis.recommendations
    }

    pub fn get_summary(&self) -> &PerformanceSummary {
        &self.analysis.summary
    }

    pub fn get_operation_details(&self, operation: &str) -> Option<&OperationStats> {
        self.analysis.operations.get(operation)
    }

    /// Operations with timing data, slowest average first; ties keep
    /// operation name order
    pub fn get_slowest_operations(&self, limit: usize) -> Vec<&OperationStats> {
        let mut timed: Vec<&OperationStats> = self
            .analysis
            .operations
            .values()
            .filter(|op| op.durations.is_some())
            .collect();

        timed.sort_by(|a, b| {
            let a = a.avg_duration().unwrap_or_default();
            let b = b.avg_duration().unwrap_or_default();
            b.total_cmp(&a)
        });
        timed.truncate(limit);
        timed
    }
}

/// Export performance report to JSON format
pub fn export_report_json(report: &PerformanceReport) -> anyhow::Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| anyhow::anyhow!("Failed to serialize report to JSON: {}", e))
}

/// Export performance report to CSV format, one row per operation
pub fn export_report_csv(report: &PerformanceReport) -> anyhow::Result<String> {
    let mut csv = String::new();

    csv.push_str("Operation,Calls,Avg Duration,Max Duration,P95 Duration,Impact\n");

    for stats in report.analysis.operations.values() {
        let impact = report
            .get_bottlenecks()
            .iter()
            .find(|b| b.operation == stats.operation)
            .map(|b| format!("{:?}", b.impact).to_lowercase())
            .unwrap_or_default();

        match &stats.durations {
            Some(d) => writeln!(
                csv,
                "{},{},{:.3},{:.3},{:.3},{}",
                csv_field(&stats.operation),
                d.count,
                d.avg,
                d.max,
                d.p95,
                impact
            )?,
            None => writeln!(csv, "{},0,,,,{}", csv_field(&stats.operation), impact)?,
        }
    }

    Ok(csv)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
