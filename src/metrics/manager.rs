//! Analytics Manager
//!
//! Owns the named collectors of a session, aggregates across them and
//! persists metric sets under a storage directory.

use super::{Metric, MetricCollector, MetricType};
use crate::analysis::Analyzer;
use crate::config::StorageConfig;
use crate::error::AnalyticsError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const METRICS_EXTENSION: &str = "json";

/// Session-wide registry of metric collectors.
///
/// Collectors are iterated in name order, so aggregate queries concatenate
/// each collector's metrics in a stable order. Aggregates are recomputed on
/// every call.
#[derive(Debug)]
pub struct AnalyticsManager {
    collectors: BTreeMap<String, MetricCollector>,
    storage_dir: PathBuf,
}

impl AnalyticsManager {
    /// Create a manager, creating `storage_dir` (and parents) if absent
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self, AnalyticsError> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir)?;

        info!(storage_dir = %storage_dir.display(), "Analytics manager initialised");

        Ok(Self {
            collectors: BTreeMap::new(),
            storage_dir,
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, AnalyticsError> {
        Self::new(config.storage_dir.clone())
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Look up a collector, creating one namespaced by `name` when allowed
    pub fn get_collector(&mut self, name: &str, create_if_missing: bool) -> Option<&mut MetricCollector> {
        if !self.collectors.contains_key(name) {
            if !create_if_missing {
                return None;
            }
            debug!(collector = %name, "Creating collector");
            self.collectors
                .insert(name.to_string(), MetricCollector::with_prefix(name));
        }
        self.collectors.get_mut(name)
    }

    /// Shorthand for `get_collector(name, true)`
    pub fn collector(&mut self, name: &str) -> &mut MetricCollector {
        self.collectors
            .entry(name.to_string())
            .or_insert_with(|| MetricCollector::with_prefix(name))
    }

    /// Register a collector under `name`, returning any collector it replaced
    pub fn register_collector(&mut self, name: &str, collector: MetricCollector) -> Option<MetricCollector> {
        let previous = self.collectors.insert(name.to_string(), collector);
        if previous.is_some() {
            warn!(collector = %name, "Replaced existing collector");
        }
        previous
    }

    pub fn remove_collector(&mut self, name: &str) -> Option<MetricCollector> {
        self.collectors.remove(name)
    }

    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.keys().map(String::as_str).collect()
    }

    fn iter_metrics(&self) -> impl Iterator<Item = &Metric> {
        self.collectors.values().flat_map(|c| c.get_metrics().iter())
    }

    pub fn get_all_metrics(&self) -> Vec<Metric> {
        self.iter_metrics().cloned().collect()
    }

    pub fn get_metrics_by_type(&self, metric_type: MetricType) -> Vec<Metric> {
        self.iter_metrics()
            .filter(|m| m.metric_type == metric_type)
            .cloned()
            .collect()
    }

    pub fn get_metrics_by_tag(&self, key: &str, value: Option<&str>) -> Vec<Metric> {
        self.collectors
            .values()
            .flat_map(|c| c.get_metrics_by_tag(key, value))
            .cloned()
            .collect()
    }

    pub fn total_metric_count(&self) -> usize {
        self.collectors.values().map(MetricCollector::len).sum()
    }

    pub fn get_metric_names(&self) -> BTreeSet<String> {
        self.iter_metrics().map(|m| m.name.clone()).collect()
    }

    pub fn get_metric_types(&self) -> BTreeSet<MetricType> {
        self.iter_metrics().map(|m| m.metric_type).collect()
    }

    pub fn get_tag_keys(&self) -> BTreeSet<String> {
        self.iter_metrics()
            .flat_map(|m| m.tags.keys().cloned())
            .collect()
    }

    pub fn get_tag_values(&self, key: &str) -> BTreeSet<String> {
        self.iter_metrics()
            .filter_map(|m| m.tag(key).map(str::to_string))
            .collect()
    }

    /// Empty every collector; the collectors stay registered
    pub fn clear_all_metrics(&mut self) {
        for collector in self.collectors.values_mut() {
            collector.clear();
        }
        info!(collectors = self.collectors.len(), "Cleared all metrics");
    }

    /// Run an analyzer over every metric currently held
    pub fn analyze<A: Analyzer>(&self, analyzer: &A) -> A::Output {
        let metrics = self.get_all_metrics();
        analyzer.analyze(&metrics)
    }

    fn metrics_path(&self, filename: &str) -> Result<PathBuf, AnalyticsError> {
        let trimmed = filename.trim();
        if trimmed.is_empty()
            || trimmed.contains('/')
            || trimmed.contains('\\')
            || trimmed == "."
            || trimmed == ".."
        {
            return Err(AnalyticsError::InvalidFilename(filename.to_string()));
        }

        let suffix = format!(".{}", METRICS_EXTENSION);
        let file = if trimmed.ends_with(&suffix) {
            trimmed.to_string()
        } else {
            format!("{}{}", trimmed, suffix)
        };
        Ok(self.storage_dir.join(file))
    }

    /// Write every metric to `<storage_dir>/<filename>.json`.
    ///
    /// The file is written beside its target and renamed into place.
    pub fn save_metrics(&self, filename: &str) -> Result<PathBuf, AnalyticsError> {
        let path = self.metrics_path(filename)?;
        let records = self
            .iter_metrics()
            .map(Metric::to_json)
            .collect::<Result<Vec<Value>, _>>()?;
        let body = serde_json::to_vec_pretty(&records)?;

        let staging = path.with_extension(format!("{}.tmp", METRICS_EXTENSION));
        if let Err(e) = write_then_rename(&staging, &path, &body) {
            if let Err(cleanup) = fs::remove_file(&staging) {
                debug!(path = %staging.display(), error = %cleanup, "Staging file not removed");
            }
            return Err(e.into());
        }

        info!(
            path = %path.display(),
            metric_count = records.len(),
            "Saved metrics"
        );
        Ok(path)
    }

    /// Read a saved metric set back.
    ///
    /// Loaded metrics are returned to the caller; they are not inserted into
    /// any collector.
    pub fn load_metrics(&self, filename: &str) -> Result<Vec<Metric>, AnalyticsError> {
        let path = self.metrics_path(filename)?;
        if !path.is_file() {
            return Err(AnalyticsError::NotFound { path });
        }

        let body = fs::read(&path)?;
        let records: Vec<Value> = serde_json::from_slice(&body)?;
        let metrics = records
            .iter()
            .enumerate()
            .map(|(index, record)| Metric::from_json(record).map_err(|e| e.at_index(index)))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            path = %path.display(),
            metric_count = metrics.len(),
            "Loaded metrics"
        );
        Ok(metrics)
    }

    /// Names (without extension) of the metric sets in `storage_dir`
    pub fn list_saved_metrics(&self) -> Result<Vec<String>, AnalyticsError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.storage_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(METRICS_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn delete_saved_metrics(&self, filename: &str) -> Result<(), AnalyticsError> {
        let path = self.metrics_path(filename)?;
        if !path.is_file() {
            return Err(AnalyticsError::NotFound { path });
        }
        fs::remove_file(&path)?;
        info!(path = %path.display(), "Deleted saved metrics");
        Ok(())
    }
}

fn write_then_rename(staging: &Path, target: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(staging)?;
    file.write_all(body)?;
    file.sync_all()?;
    drop(file);
    fs::rename(staging, target)
}
