//! Metrics System Demo
//!
//! Records metrics for a simulated automation run, prints the analyses and
//! persists the run to a temporary storage directory.

use run_analytics::analysis::{Analyzer, StatisticalAnalyzer, TimeSeriesAnalyzer};
use run_analytics::metrics::{export_report_json, AnalyticsManager, PerformanceReport, Tags};
use std::thread::sleep;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let storage_dir = std::env::temp_dir().join("run-analytics-demo");
    let mut manager = AnalyticsManager::new(&storage_dir)?;

    println!("Simulating an automation run...");
    simulate_run(&mut manager);

    let metrics = manager.get_all_metrics();
    println!("Collected {} metrics", metrics.len());

    let statistics = StatisticalAnalyzer::new().analyze(&metrics);
    for (key, stats) in &statistics {
        println!(
            "{}: count={} mean={:.2} p95={:.2}",
            key, stats.count, stats.mean, stats.percentiles.p95
        );
    }

    let trends = TimeSeriesAnalyzer::new(1, 2).analyze(&metrics);
    for (key, series) in &trends {
        println!("{}: trend={:?}", key, series.trend.direction);
    }

    let mut report = PerformanceReport::default();
    report.collect_data(&metrics);
    for recommendation in report.get_recommendations() {
        println!(
            "[{:?}] {}: {}",
            recommendation.priority, recommendation.operation, recommendation.recommendation
        );
    }
    println!("{}", export_report_json(&report)?);

    let path = manager.save_metrics("demo_run")?;
    println!("Saved run to {}", path.display());

    let restored = manager.load_metrics("demo_run")?;
    println!("Reloaded {} metrics", restored.len());

    Ok(())
}

fn simulate_run(manager: &mut AnalyticsManager) {
    let steps = ["open_page", "login", "fill_form", "submit"];

    for (i, step) in steps.iter().cycle().take(12).enumerate() {
        let mut tags = Tags::new();
        tags.insert("operation".to_string(), step.to_string());

        let workflow = manager.collector("workflow");
        {
            let _timer = workflow.measure_time("step", None, Some(tags.clone()));
            sleep(Duration::from_millis(5 + (i as u64 % 4) * 10));
        }

        if i % 5 == 4 {
            workflow.error("step", None, Some(tags));
        } else {
            workflow.success("step", None, Some(tags));
        }
    }

    let system = manager.collector("system");
    for usage in [35.0, 48.5, 72.0, 66.0] {
        system.collect(
            "cpu",
            usage,
            run_analytics::MetricType::CpuUsage,
            None,
            None,
        );
    }
    system.rate("step_success", 10, 12, None, None);
}
