//! Run Analytics - offline analysis of saved metric sets
//!
//! Loads a metric set persisted by an `AnalyticsManager` and prints the
//! statistical, time-series and performance analyses as JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use run_analytics::{
    analysis::{Analyzer, AnyAnalyzer},
    config::ConfigManager,
    metrics::{export_report_csv, export_report_json},
    AnalyticsConfig, AnalyticsManager, Metric, PerformanceAnalyzer, PerformanceReport,
    StatisticalAnalyzer, TimeSeriesAnalyzer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AnalyzerKind {
    Statistical,
    TimeSeries,
    Performance,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

/// CLI arguments for Run Analytics
#[derive(Parser, Debug)]
#[command(name = "run-analytics")]
#[command(about = "Run Analytics - statistics, trends and bottlenecks for saved metric sets")]
#[command(version)]
#[command(long_about = "
Run Analytics - statistics, trends and bottlenecks for saved metric sets

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  ANALYTICS_STORAGE_DIR  - Directory holding saved metric sets
  ANALYTICS_INTERVAL     - Time-series bucket width (e.g., 5m, 15m)
  ANALYTICS_MIN_POINTS   - Minimum points before a series is analyzed
  ANALYTICS_LOG_LEVEL    - Log level (trace, debug, info, warn, error)
")]
struct CliArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "analytics.toml")]
    config: PathBuf,

    /// Storage directory (overrides config file)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Saved metric set to analyze (with or without .json)
    #[arg(short, long)]
    input: Option<String>,

    /// Analyzer to run
    #[arg(short, long, value_enum, default_value = "all")]
    analyzer: AnalyzerKind,

    /// Output format; csv is only available for the performance analyzer
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Time-series bucket width (e.g., 5m)
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Minimum points before a series is analyzed for trends
    #[arg(long)]
    min_points: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// List saved metric sets and exit
    #[arg(long)]
    list: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate_config: bool,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Load configuration with priority: CLI args > config file > environment > defaults
    let mut config = ConfigManager::load(&args.config)?;

    config.merge_with_cli_args(
        args.storage_dir.as_deref(),
        args.interval,
        args.min_points,
        args.log_level.as_deref(),
    );

    config
        .validate()
        .context("Final configuration validation failed")?;

    init_tracing(&args, &config)?;

    info!("Starting run-analytics v{}", env!("CARGO_PKG_VERSION"));

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Storage dir: {}", config.storage.storage_dir.display());
        info!(
            "  Interval: {}",
            humantime::format_duration(config.time_series.interval)
        );
        info!(
            "  Min points for trend: {}",
            config.time_series.min_points_for_trend
        );
        info!(
            "  High avg duration: {} ms",
            config.performance.high_avg_duration_ms
        );
        return Ok(());
    }

    let manager = AnalyticsManager::from_config(&config.storage)
        .context("Failed to open storage directory")?;

    if args.list {
        for name in manager.list_saved_metrics()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let Some(input) = args.input.as_deref() else {
        bail!("--input is required unless --list or --validate-config is given");
    };

    let metrics = manager
        .load_metrics(input)
        .with_context(|| format!("Failed to load metric set '{}'", input))?;

    let output = render(args.analyzer, args.format, &config, &metrics)?;
    println!("{}", output);

    Ok(())
}

fn render(
    kind: AnalyzerKind,
    format: OutputFormat,
    config: &AnalyticsConfig,
    metrics: &[Metric],
) -> Result<String> {
    if format == OutputFormat::Csv {
        if kind != AnalyzerKind::Performance {
            bail!("csv output is only available with --analyzer performance");
        }
        return export_report_csv(&performance_report(config, metrics));
    }

    let analyzers: Vec<(&str, AnyAnalyzer)> = match kind {
        AnalyzerKind::Performance => {
            return export_report_json(&performance_report(config, metrics));
        }
        AnalyzerKind::Statistical => vec![("statistical", StatisticalAnalyzer::new().into())],
        AnalyzerKind::TimeSeries => vec![(
            "time_series",
            TimeSeriesAnalyzer::from_config(&config.time_series).into(),
        )],
        AnalyzerKind::All => vec![
            ("statistical", StatisticalAnalyzer::new().into()),
            (
                "time_series",
                TimeSeriesAnalyzer::from_config(&config.time_series).into(),
            ),
            (
                "performance",
                PerformanceAnalyzer::with_thresholds(config.performance.clone()).into(),
            ),
        ],
    };

    let mut results = serde_json::Map::new();
    for (key, analyzer) in analyzers {
        info!(analyzer = analyzer.get_name(), metric_count = metrics.len(), "Running analyzer");
        let output = serde_json::to_value(analyzer.analyze(metrics))
            .with_context(|| format!("Failed to serialize {} output", analyzer.get_name()))?;
        results.insert(key.to_string(), output);
    }

    serde_json::to_string_pretty(&results).context("Failed to render analysis output")
}

fn performance_report(config: &AnalyticsConfig, metrics: &[Metric]) -> PerformanceReport {
    let mut report =
        PerformanceReport::new(PerformanceAnalyzer::with_thresholds(config.performance.clone()));
    report.collect_data(metrics);
    report
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs, config: &AnalyticsConfig) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        config.logging.log_level.as_str()
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}
