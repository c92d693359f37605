//! Metrics Collector

use super::{Context, Metric, MetricType, MetricValue, Tags};
use std::ops::{Deref, DerefMut};
use std::time::Instant;
use tracing::debug;

/// Accumulates metrics in append order, optionally namespaced by a prefix.
///
/// Metrics are never evicted; call [`MetricCollector::clear`] to discard them.
/// A collector is not synchronised, callers sharing one across threads must
/// serialise access themselves.
#[derive(Debug, Clone, Default)]
pub struct MetricCollector {
    prefix: Option<String>,
    metrics: Vec<Metric>,
}

impl MetricCollector {
    /// Create a collector without a namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector whose metric names become `"{prefix}.{name}"`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: if prefix.is_empty() { None } else { Some(prefix) },
            metrics: Vec::new(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn full_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.to_string(),
        }
    }

    /// Record a metric and return a copy of what was stored
    pub fn collect(
        &mut self,
        name: &str,
        value: impl Into<MetricValue>,
        metric_type: MetricType,
        context: Option<Context>,
        tags: Option<Tags>,
    ) -> Metric {
        let metric = Metric::new(self.full_name(name), value, metric_type)
            .with_context(context.unwrap_or_default())
            .with_tags(tags.unwrap_or_default());

        debug!(
            name = %metric.name,
            value = %metric.value,
            metric_type = %metric.metric_type,
            "Collected metric"
        );

        self.metrics.push(metric.clone());
        metric
    }

    /// Record an already-built metric as-is (no prefixing)
    pub fn push(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    pub fn count(
        &mut self,
        name: &str,
        value: i64,
        context: Option<Context>,
        tags: Option<Tags>,
    ) -> Metric {
        self.collect(name, value, MetricType::Count, context, tags)
    }

    /// Count a single occurrence
    pub fn increment(&mut self, name: &str) -> Metric {
        self.count(name, 1, None, None)
    }

    pub fn timing(
        &mut self,
        name: &str,
        duration_ms: f64,
        context: Option<Context>,
        tags: Option<Tags>,
    ) -> Metric {
        self.collect(name, duration_ms, MetricType::Duration, context, tags)
    }

    pub fn gauge(
        &mut self,
        name: &str,
        value: f64,
        context: Option<Context>,
        tags: Option<Tags>,
    ) -> Metric {
        self.collect(name, value, MetricType::Custom, context, tags)
    }

    pub fn success(&mut self, name: &str, context: Option<Context>, tags: Option<Tags>) -> Metric {
        self.collect(name, 1, MetricType::SuccessCount, context, tags)
    }

    pub fn error(&mut self, name: &str, context: Option<Context>, tags: Option<Tags>) -> Metric {
        self.collect(name, 1, MetricType::ErrorCount, context, tags)
    }

    /// Record `success_count / total_count`; a zero total records 0.0
    pub fn rate(
        &mut self,
        name: &str,
        success_count: u64,
        total_count: u64,
        context: Option<Context>,
        tags: Option<Tags>,
    ) -> Metric {
        let rate = if total_count == 0 {
            0.0
        } else {
            success_count as f64 / total_count as f64
        };
        self.collect(name, rate, MetricType::Rate, context, tags)
    }

    /// Start timing a block of work.
    ///
    /// The elapsed wall-clock time in milliseconds is recorded as a
    /// `DURATION` metric exactly once when the returned guard is dropped,
    /// including when the block unwinds. The guard dereferences to the
    /// collector so the timed block can keep recording.
    pub fn measure_time(
        &mut self,
        name: &str,
        context: Option<Context>,
        tags: Option<Tags>,
    ) -> TimingGuard<'_> {
        TimingGuard {
            collector: self,
            name: name.to_string(),
            context,
            tags,
            started: Instant::now(),
        }
    }

    /// Run `work` under [`MetricCollector::measure_time`] and return its result
    pub fn time<T, F>(&mut self, name: &str, context: Option<Context>, tags: Option<Tags>, work: F) -> T
    where
        F: FnOnce(&mut MetricCollector) -> T,
    {
        let mut guard = self.measure_time(name, context, tags);
        let output = work(&mut *guard);
        drop(guard);
        output
    }

    pub fn get_metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn get_metrics_by_type(&self, metric_type: MetricType) -> Vec<&Metric> {
        self.metrics
            .iter()
            .filter(|m| m.metric_type == metric_type)
            .collect()
    }

    /// Match on the full (namespaced) name
    pub fn get_metrics_by_name(&self, name: &str) -> Vec<&Metric> {
        self.metrics.iter().filter(|m| m.name == name).collect()
    }

    /// Match on tag presence, or on an exact tag value when one is given
    pub fn get_metrics_by_tag(&self, key: &str, value: Option<&str>) -> Vec<&Metric> {
        self.metrics
            .iter()
            .filter(|m| match (m.tag(key), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn clear(&mut self) {
        debug!(prefix = ?self.prefix, discarded = self.metrics.len(), "Cleared collector");
        self.metrics.clear();
    }
}

/// Records the elapsed time of a scope as a `DURATION` metric on drop
pub struct TimingGuard<'a> {
    collector: &'a mut MetricCollector,
    name: String,
    context: Option<Context>,
    tags: Option<Tags>,
    started: Instant,
}

impl TimingGuard<'_> {
    /// Milliseconds elapsed so far
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Deref for TimingGuard<'_> {
    type Target = MetricCollector;

    fn deref(&self) -> &Self::Target {
        self.collector
    }
}

impl DerefMut for TimingGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.collector
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        let name = std::mem::take(&mut self.name);
        self.collector
            .timing(&name, elapsed, self.context.take(), self.tags.take());
    }
}
