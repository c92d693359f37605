//! Analytics manager aggregation and persistence tests

use anyhow::Result;
use run_analytics::metrics::{AnalyticsManager, MetricCollector, MetricType, Tags};
use run_analytics::AnalyticsError;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn populated_manager(dir: &TempDir) -> Result<AnalyticsManager> {
    let mut manager = AnalyticsManager::new(dir.path())?;

    let auth = manager.collector("auth");
    auth.increment("login");
    auth.timing("login", 320.0, None, Some(tags(&[("browser", "firefox")])));
    auth.rate("login_success", 0, 0, None, None);

    let mut context = serde_json::Map::new();
    context.insert("operation".to_string(), json!("capture"));
    let shots = manager.collector("screenshots");
    shots.collect("size_kb", 512, MetricType::DiskUsage, Some(context), None);
    shots.error("capture", None, Some(tags(&[("browser", "chrome")])));

    Ok(manager)
}

#[test]
fn test_aggregate_queries_span_collectors() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = populated_manager(&dir)?;

    assert_eq!(manager.get_all_metrics().len(), 5);
    assert_eq!(manager.total_metric_count(), 5);
    assert_eq!(manager.collector_names(), vec!["auth", "screenshots"]);

    // Each collector's order is preserved and collectors are concatenated by name
    let names: Vec<_> = manager.get_all_metrics().into_iter().map(|m| m.name).collect();
    assert_eq!(
        names,
        vec![
            "auth.login",
            "auth.login",
            "auth.login_success",
            "screenshots.size_kb",
            "screenshots.capture"
        ]
    );

    assert_eq!(manager.get_metrics_by_type(MetricType::Count).len(), 1);
    assert_eq!(manager.get_metrics_by_tag("browser", None).len(), 2);
    assert_eq!(manager.get_metrics_by_tag("browser", Some("chrome")).len(), 1);

    assert!(manager.get_metric_names().contains("auth.login"));
    assert_eq!(manager.get_metric_names().len(), 4);
    assert!(manager.get_metric_types().contains(&MetricType::DiskUsage));
    assert_eq!(
        manager.get_tag_keys().into_iter().collect::<Vec<_>>(),
        vec!["browser"]
    );
    assert_eq!(
        manager.get_tag_values("browser").into_iter().collect::<Vec<_>>(),
        vec!["chrome", "firefox"]
    );
    Ok(())
}

#[test]
fn test_clear_all_keeps_collectors() -> Result<()> {
    let dir = TempDir::new()?;
    let mut manager = populated_manager(&dir)?;

    manager.clear_all_metrics();

    assert!(manager.get_all_metrics().is_empty());
    assert_eq!(manager.collector_names().len(), 2);
    assert!(manager.get_collector("auth", false).is_some());
    Ok(())
}

#[test]
fn test_save_then_load_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = populated_manager(&dir)?;

    let saved = manager.get_all_metrics();
    let path = manager.save_metrics("run1")?;
    assert_eq!(path, dir.path().join("run1.json"));

    let loaded = manager.load_metrics("run1")?;
    assert_eq!(loaded.len(), saved.len());
    for (original, restored) in saved.iter().zip(&loaded) {
        assert_eq!(restored.name, original.name);
        assert_eq!(restored.value, original.value);
        assert_eq!(restored.metric_type, original.metric_type);
        assert_eq!(restored, original);
    }

    // Loading does not feed the metrics back into any collector
    assert_eq!(manager.total_metric_count(), saved.len());
    Ok(())
}

#[test]
fn test_saved_file_format() -> Result<()> {
    let dir = TempDir::new()?;
    let mut manager = AnalyticsManager::new(dir.path())?;
    manager.collector("ui").count("clicks", 3, None, Some(tags(&[("page", "home")])));
    manager.save_metrics("format.json")?;

    let body: serde_json::Value = serde_json::from_str(&fs::read_to_string(dir.path().join("format.json"))?)?;
    let record = &body[0];
    assert_eq!(record["name"], json!("ui.clicks"));
    assert_eq!(record["value"], json!(3));
    assert_eq!(record["type"], json!("COUNT"));
    assert_eq!(record["tags"], json!({"page": "home"}));
    assert_eq!(record["context"], json!({}));
    assert!(record["timestamp"].as_str().unwrap().contains('T'));
    assert!(!dir.path().join("format.json.tmp").exists());
    Ok(())
}

#[test]
fn test_load_missing_file_is_not_found() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = AnalyticsManager::new(dir.path())?;

    match manager.load_metrics("missing") {
        Err(AnalyticsError::NotFound { path }) => assert_eq!(path, dir.path().join("missing.json")),
        other => panic!("expected not found, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_load_unknown_type_is_malformed() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = AnalyticsManager::new(dir.path())?;
    let body = json!([
        {"name": "ok", "value": 1, "type": "COUNT", "timestamp": "2024-01-01T00:00:00Z", "context": {}, "tags": {}},
        {"name": "bad", "value": 1, "type": "THROUGHPUT", "timestamp": "2024-01-01T00:00:00Z", "context": {}, "tags": {}}
    ]);
    fs::write(dir.path().join("broken.json"), body.to_string())?;

    match manager.load_metrics("broken") {
        Err(AnalyticsError::MalformedMetric { index, reason }) => {
            assert_eq!(index, 1);
            assert!(reason.contains("THROUGHPUT"));
        }
        other => panic!("expected malformed metric, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_list_and_delete_saved_metrics() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = populated_manager(&dir)?;
    manager.save_metrics("run_b")?;
    manager.save_metrics("run_a")?;
    fs::write(dir.path().join("notes.txt"), "ignored")?;

    assert_eq!(manager.list_saved_metrics()?, vec!["run_a", "run_b"]);

    manager.delete_saved_metrics("run_a")?;
    assert_eq!(manager.list_saved_metrics()?, vec!["run_b"]);
    assert!(manager.delete_saved_metrics("run_a").unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test_register_replaces_collector() -> Result<()> {
    let dir = TempDir::new()?;
    let mut manager = populated_manager(&dir)?;

    let replaced = manager.register_collector("auth", MetricCollector::with_prefix("auth"));
    assert_eq!(replaced.map(|c| c.len()), Some(3));
    assert_eq!(manager.total_metric_count(), 2);
    Ok(())
}

#[test]
fn test_non_finite_values_survive_save_and_load() -> Result<()> {
    let dir = TempDir::new()?;
    let mut manager = AnalyticsManager::new(dir.path())?;

    let render = manager.collector("render");
    render.timing("ok", 12.0, None, None);
    render.gauge("ratio", f64::NAN, None, None);
    render.gauge("ceiling", f64::INFINITY, None, None);

    let path = manager.save_metrics("run1")?;
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    assert_eq!(raw[1]["value"], json!("NaN"));
    assert_eq!(raw[2]["value"], json!("Infinity"));

    let restored = manager.load_metrics("run1")?;
    assert_eq!(restored.len(), 3);
    assert_eq!(restored[0].value.as_f64(), Some(12.0));
    assert!(restored[1].value.as_f64().is_some_and(f64::is_nan));
    assert_eq!(restored[2].value.as_f64(), Some(f64::INFINITY));
    Ok(())
}

