//! Configuration Manager

use super::AnalyticsConfig;
use crate::Result;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with priority: config file > environment > defaults.
    ///
    /// Keys the file leaves out keep their environment or default value.
    pub fn load(path: &Path) -> Result<AnalyticsConfig> {
        Self::load_layered(path, |key| std::env::var(key).ok())
    }

    /// Load configuration from file, ignoring the environment
    pub fn load_from_file(path: &Path) -> Result<AnalyticsConfig> {
        Self::load_layered(path, |_| None)
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<AnalyticsConfig> {
        let mut config = AnalyticsConfig::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Layer the file at `path` over defaults with `lookup` overrides applied
    pub fn load_layered(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<AnalyticsConfig> {
        let mut config = AnalyticsConfig::default();
        config.apply_env_overrides(lookup)?;

        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let file: toml::Value = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            let mut merged =
                toml::Value::try_from(&config).context("Failed to encode base configuration")?;
            overlay(&mut merged, file);

            config = AnalyticsConfig::deserialize(merged)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        } else {
            tracing::warn!("Configuration file not found at {}, using defaults", path.display());
        }

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        tracing::info!("Configuration loaded and validated successfully");
        Ok(config)
    }
}

/// Recursively replace the entries of `base` with those set in `layer`
fn overlay(base: &mut toml::Value, layer: toml::Value) {
    match (base, layer) {
        (toml::Value::Table(base), toml::Value::Table(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

impl AnalyticsConfig {
    /// Apply `ANALYTICS_*` overrides read through `lookup`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("ANALYTICS_STORAGE_DIR") {
            self.storage.storage_dir = PathBuf::from(dir);
        }

        if let Some(interval) = lookup("ANALYTICS_INTERVAL") {
            self.time_series.interval = humantime::parse_duration(&interval)
                .with_context(|| format!("Invalid ANALYTICS_INTERVAL: {}", interval))?;
        }

        if let Some(min_points) = lookup("ANALYTICS_MIN_POINTS") {
            self.time_series.min_points_for_trend = min_points
                .parse::<usize>()
                .with_context(|| format!("Invalid ANALYTICS_MIN_POINTS: {}", min_points))?;
        }

        if let Some(log_level) = lookup("ANALYTICS_LOG_LEVEL") {
            self.logging.log_level = log_level;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_storage_config()
            .with_context(|| "Storage configuration validation failed")?;

        self.validate_time_series_config()
            .with_context(|| "Time series configuration validation failed")?;

        self.validate_performance_config()
            .with_context(|| "Performance configuration validation failed")?;

        self.validate_logging_config()
            .with_context(|| "Logging configuration validation failed")?;

        Ok(())
    }

    fn validate_storage_config(&self) -> Result<()> {
        if self.storage.storage_dir.as_os_str().is_empty() {
            bail!("storage.storage_dir must not be empty");
        }
        Ok(())
    }

    fn validate_time_series_config(&self) -> Result<()> {
        let interval = self.time_series.interval;
        if interval < Duration::from_secs(60) {
            bail!("time_series.interval must be at least 1 minute");
        }

        if interval.as_secs() % 60 != 0 || interval.subsec_nanos() != 0 {
            bail!("time_series.interval must be a whole number of minutes");
        }

        if interval > Duration::from_secs(60 * 60) {
            bail!("time_series.interval cannot exceed 60 minutes");
        }

        if self.time_series.min_points_for_trend < 2 {
            bail!("time_series.min_points_for_trend must be at least 2");
        }

        Ok(())
    }

    fn validate_performance_config(&self) -> Result<()> {
        let t = &self.performance;
        let limits = [
            ("high_avg_duration_ms", t.high_avg_duration_ms),
            ("medium_avg_duration_ms", t.medium_avg_duration_ms),
            ("max_duration_ms", t.max_duration_ms),
            ("high_resource_usage", t.high_resource_usage),
            ("medium_resource_usage", t.medium_resource_usage),
        ];
        for (name, value) in limits {
            if !value.is_finite() || value < 0.0 {
                bail!("performance.{} must be a non-negative number", name);
            }
        }

        if t.medium_avg_duration_ms > t.high_avg_duration_ms {
            bail!("performance.medium_avg_duration_ms cannot exceed high_avg_duration_ms");
        }

        if t.medium_resource_usage > t.high_resource_usage {
            bail!("performance.medium_resource_usage cannot exceed high_resource_usage");
        }

        if t.p95_min_samples == 0 || t.p99_min_samples == 0 {
            bail!("performance percentile sample minimums must be greater than 0");
        }

        Ok(())
    }

    fn validate_logging_config(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.log_level.as_str()) {
            bail!("logging.log_level must be one of: {}", valid_log_levels.join(", "));
        }
        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        storage_dir: Option<&Path>,
        interval: Option<Duration>,
        min_points: Option<usize>,
        log_level: Option<&str>,
    ) {
        if let Some(dir) = storage_dir {
            self.storage.storage_dir = dir.to_path_buf();
            tracing::info!("CLI override: storage dir set to {}", dir.display());
        }

        if let Some(interval) = interval {
            self.time_series.interval = interval;
            tracing::info!(
                "CLI override: interval set to {}",
                humantime::format_duration(interval)
            );
        }

        if let Some(min_points) = min_points {
            self.time_series.min_points_for_trend = min_points;
            tracing::info!("CLI override: min points for trend set to {}", min_points);
        }

        if let Some(level) = log_level {
            self.logging.log_level = level.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_series.interval_minutes(), 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnalyticsConfig = toml::from_str(
            r#"
            [time_series]
            interval = "15m"

            [performance]
            high_avg_duration_ms = 1500.0
            "#,
        )
        .unwrap();

        assert_eq!(config.time_series.interval_minutes(), 15);
        assert_eq!(config.time_series.min_points_for_trend, 3);
        assert_eq!(config.performance.high_avg_duration_ms, 1500.0);
        assert_eq!(config.performance.medium_avg_duration_ms, 500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_fractional_interval() {
        let mut config = AnalyticsConfig::default();
        config.time_series.interval = Duration::from_secs(90);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = AnalyticsConfig::default();
        config.performance.medium_avg_duration_ms = 2000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = AnalyticsConfig::default();
        config.logging.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ANALYTICS_STORAGE_DIR", "/tmp/runs"),
            ("ANALYTICS_INTERVAL", "10m"),
            ("ANALYTICS_MIN_POINTS", "4"),
        ]
        .into_iter()
        .collect();

        let mut config = AnalyticsConfig::default();
        config
            .apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage.storage_dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.time_series.interval_minutes(), 10);
        assert_eq!(config.time_series.min_points_for_trend, 4);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = AnalyticsConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "ANALYTICS_MIN_POINTS").then(|| "many".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigManager::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.storage_dir, PathBuf::from("metrics_data"));
    }

    #[test]
    fn test_file_layers_over_environment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analytics.toml");
        std::fs::write(
            &path,
            r#"
            [time_series]
            interval = "15m"
            "#,
        )
        .unwrap();

        let vars: HashMap<&str, &str> = [
            ("ANALYTICS_INTERVAL", "10m"),
            ("ANALYTICS_MIN_POINTS", "7"),
            ("ANALYTICS_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let config =
            ConfigManager::load_layered(&path, |key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.time_series.interval_minutes(), 15);
        assert_eq!(config.time_series.min_points_for_trend, 7);
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.storage.storage_dir, PathBuf::from("metrics_data"));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AnalyticsConfig::default();
        config.merge_with_cli_args(
            Some(Path::new("out")),
            Some(Duration::from_secs(30 * 60)),
            None,
            Some("debug"),
        );
        assert_eq!(config.storage.storage_dir, PathBuf::from("out"));
        assert_eq!(config.time_series.interval_minutes(), 30);
        assert_eq!(config.logging.log_level, "debug");
    }
}
