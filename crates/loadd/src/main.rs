//! loadd: the loadgrid runner.
//!
//! Starts a placement grid from a config file (or the built-in three-node
//! default), feeds it a synthetic workload and stops after a fixed time or
//! on Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! loadd init-config > grid.toml
//! loadd run --config grid.toml --jobs 60 --arrival-interval 80ms --run-for 20s
//! ```

mod pusher;
mod workload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tracing::info;

use loadgrid_cluster::Grid;
use loadgrid_core::{GridConfig, parse_duration};
use loadgrid_metrics::render_prometheus;
use loadgrid_node::SleepExecutor;
use loadgrid_report::{ReportFormat, TracingObserver, UtilizationObserver, WriterObserver};

use crate::workload::WorkloadSpec;

#[derive(Parser, Debug)]
#[command(name = "loadd", about = "Feedback-driven job placement grid")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a grid against a synthetic workload.
    Run(RunArgs),
    /// Print the default configuration as TOML.
    InitConfig,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Grid configuration file. Defaults to three nodes of capacity 8.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of jobs to generate.
    #[arg(long, default_value = "60")]
    jobs: usize,

    /// Delay between job arrivals.
    #[arg(long, default_value = "80ms", value_parser = duration_arg)]
    arrival_interval: Duration,

    /// How long to run before shutting down.
    #[arg(long, default_value = "20s", value_parser = duration_arg)]
    run_for: Duration,

    /// Seed for the workload generator. Random when unset.
    #[arg(long)]
    seed: Option<u64>,

    /// Where utilization reports go.
    #[arg(long, value_enum, default_value_t = ReportTarget::Text)]
    report: ReportTarget,

    /// Have every node push its own load sample at this interval, on top
    /// of the collector's periodic sampling.
    #[arg(long, value_parser = duration_arg)]
    push_interval: Option<Duration>,

    /// Print Prometheus metrics on exit.
    #[arg(long)]
    metrics_dump: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportTarget {
    /// Text block on stdout.
    Text,
    /// JSON lines on stdout.
    Json,
    /// Structured log events.
    Log,
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("invalid duration {s:?} (expected e.g. 300ms, 1s, 2m, at most 30 days)"))
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,loadd=debug,loadgrid_scheduler=debug"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::InitConfig => {
            print!("{}", GridConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn observer_for(target: ReportTarget) -> Arc<dyn UtilizationObserver> {
    match target {
        ReportTarget::Text => Arc::new(WriterObserver::stdout(ReportFormat::Text)),
        ReportTarget::Json => Arc::new(WriterObserver::stdout(ReportFormat::Json)),
        ReportTarget::Log => Arc::new(TracingObserver),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => GridConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GridConfig::default(),
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let jobs = workload::generate(
        &WorkloadSpec {
            jobs: args.jobs,
            ..WorkloadSpec::default()
        },
        &mut rng,
    )?;

    let grid = Grid::start(config, Arc::new(SleepExecutor), vec![observer_for(args.report)])?;
    info!(
        jobs = jobs.len(),
        arrival_interval_ms = args.arrival_interval.as_millis() as u64,
        run_for_ms = args.run_for.as_millis() as u64,
        "loadd running"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let feeder = tokio::spawn(workload::feed(
        grid.submitter(),
        jobs,
        args.arrival_interval,
        stop_rx.clone(),
    ));
    let pusher = args.push_interval.map(|interval| {
        tokio::spawn(pusher::push_samples(
            grid.nodes().to_vec(),
            grid.metrics_sender(),
            interval,
            stop_rx,
        ))
    });

    tokio::select! {
        _ = tokio::time::sleep(args.run_for) => info!("run time elapsed"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl-C")?;
            info!("shutdown signal received");
        }
    }

    stop_tx.send_replace(true);
    let submitted = feeder.await?;
    let pushed = match pusher {
        Some(handle) => handle.await?,
        None => 0,
    };

    let gauges = grid.gauges().await;
    let totals = grid.shutdown().await;
    info!(submitted, pushed, "loadd stopped");

    if args.metrics_dump {
        print!("{}", render_prometheus(&gauges, &totals));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_match_builtin_workload() {
        let cli = Cli::try_parse_from(["loadd", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.jobs, 60);
        assert_eq!(args.arrival_interval, Duration::from_millis(80));
        assert_eq!(args.run_for, Duration::from_secs(20));
        assert_eq!(args.report, ReportTarget::Text);
        assert!(args.seed.is_none());
        assert!(!args.metrics_dump);
        assert!(args.push_interval.is_none());
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "loadd",
            "--log-format",
            "json",
            "run",
            "--config",
            "grid.toml",
            "--jobs",
            "5",
            "--arrival-interval",
            "10ms",
            "--run-for",
            "2m",
            "--seed",
            "9",
            "--report",
            "log",
            "--metrics-dump",
            "--push-interval",
            "1s",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(args.config, Some(PathBuf::from("grid.toml")));
        assert_eq!(args.jobs, 5);
        assert_eq!(args.arrival_interval, Duration::from_millis(10));
        assert_eq!(args.run_for, Duration::from_secs(120));
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.report, ReportTarget::Log);
        assert!(args.metrics_dump);
        assert_eq!(args.push_interval, Some(Duration::from_secs(1)));
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(Cli::try_parse_from(["loadd", "run", "--run-for", "soon"]).is_err());
    }

    #[test]
    fn overflowing_duration_is_rejected() {
        for args in [
            ["loadd", "run", "--run-for", "307445734561825861m"],
            ["loadd", "run", "--arrival-interval", "18446744073709551615s"],
            ["loadd", "run", "--push-interval", "50000m"],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "{args:?} accepted");
        }
    }

    #[test]
    fn init_config_parses() {
        let cli = Cli::try_parse_from(["loadd", "init-config"]).unwrap();
        assert!(matches!(cli.command, Command::InitConfig));
    }
}
