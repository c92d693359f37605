//! Analysis Module
//!
//! Pure functions from a metric list to a structured result. Each analyzer
//! only carries the configuration it was constructed with.

pub mod performance;
pub mod statistical;
pub mod stats;
pub mod time_series;

pub use performance::{
    Bottleneck, DurationStats, OperationRank, OperationStats, PerformanceAnalysis,
    PerformanceAnalyzer, PerformanceSummary, Recommendation, ResourceStats, Severity,
};
pub use statistical::{MetricStatistics, Percentiles, StatisticalAnalyzer};
pub use stats::HistogramBin;
pub use time_series::{
    IntervalStats, SeriesAnalysis, SeriesSummary, TimeSeriesAnalyzer, Trend, TrendDirection,
};

use crate::metrics::Metric;
use serde::Serialize;
use std::collections::BTreeMap;

/// Common interface of all analyzers
pub trait Analyzer {
    type Output: Serialize;

    /// Analyze `metrics`; never fails, empty input yields an empty result
    fn analyze(&self, metrics: &[Metric]) -> Self::Output;

    fn get_name(&self) -> &str;

    fn get_description(&self) -> &str;
}

/// Any of the built-in analyzers, selectable at runtime
#[derive(Debug, Clone)]
pub enum AnyAnalyzer {
    Statistical(StatisticalAnalyzer),
    TimeSeries(TimeSeriesAnalyzer),
    Performance(PerformanceAnalyzer),
}

/// Result of an [`AnyAnalyzer`] run
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisOutput {
    Statistical(BTreeMap<String, MetricStatistics>),
    TimeSeries(BTreeMap<String, SeriesAnalysis>),
    Performance(PerformanceAnalysis),
}

impl Analyzer for AnyAnalyzer {
    type Output = AnalysisOutput;

    fn analyze(&self, metrics: &[Metric]) -> AnalysisOutput {
        match self {
            AnyAnalyzer::Statistical(a) => AnalysisOutput::Statistical(a.analyze(metrics)),
            AnyAnalyzer::TimeSeries(a) => AnalysisOutput::TimeSeries(a.analyze(metrics)),
            AnyAnalyzer::Performance(a) => AnalysisOutput::Performance(a.analyze(metrics)),
        }
    }

    fn get_name(&self) -> &str {
        match self {
            AnyAnalyzer::Statistical(a) => a.get_name(),
            AnyAnalyzer::TimeSeries(a) => a.get_name(),
            AnyAnalyzer::Performance(a) => a.get_name(),
        }
    }

    fn get_description(&self) -> &str {
        match self {
            AnyAnalyzer::Statistical(a) => a.get_description(),
            AnyAnalyzer::TimeSeries(a) => a.get_description(),
            AnyAnalyzer::Performance(a) => a.get_description(),
        }
    }
}

impl From<StatisticalAnalyzer> for AnyAnalyzer {
    fn from(analyzer: StatisticalAnalyzer) -> Self {
        AnyAnalyzer::Statistical(analyzer)
    }
}

impl From<TimeSeriesAnalyzer> for AnyAnalyzer {
    fn from(analyzer: TimeSeriesAnalyzer) -> Self {
        AnyAnalyzer::TimeSeries(analyzer)
    }
}

impl From<PerformanceAnalyzer> for AnyAnalyzer {
    fn from(analyzer: PerformanceAnalyzer) -> Self {
        AnyAnalyzer::Performance(analyzer)
    }
}
