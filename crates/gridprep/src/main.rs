use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gridprep_core::aggregate::{
    net_power_batch, report_batch, write_batch, write_net_power, write_report,
};
use gridprep_core::report::render_report_table;
use gridprep_core::{run_batch, FailurePolicy, PipelineConfig, SensorSelection};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "GRIDPREP_CONFIG";

#[derive(Parser, Debug)]
#[command(author, version, about = "Grid-align and aggregate per-sensor power and voltage exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Align every sensor and write the combined tables (default)
    Process(RunArgs),
    /// Write the per-sensor missing-data report and print it
    Report(RunArgs),
    /// Write net active/reactive power per sensor
    NetPower(RunArgs),
}

#[derive(Args, Debug, Default, Clone)]
struct RunArgs {
    /// TOML configuration file (falls back to $GRIDPREP_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Average into 30 minute buckets before merging or reporting
    #[arg(long)]
    resample: bool,

    /// Outer-join power and voltage into one table per sensor
    #[arg(long)]
    merge: bool,

    /// Abort on the first sensor that fails instead of skipping it
    #[arg(long)]
    fail_fast: bool,

    #[arg(long)]
    power_dir: Option<PathBuf>,

    #[arg(long)]
    voltage_dir: Option<PathBuf>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Sensor ids such as `1,2,5-9`
    #[arg(long)]
    sensors: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Process(cli.run));

    match command {
        Command::Process(args) => {
            let config = resolve_config(&args)?;
            let mut result = run_batch(&config).context("batch processing failed")?;
            let written = write_batch(&mut result, &config).context("failed to write outputs")?;
            for output in &written {
                info!(path = %output.path.display(), rows = output.rows, "output ready");
            }
            report_skipped(result.skipped.len());
        }
        Command::Report(args) => {
            let config = resolve_config(&args)?;
            let mut report = report_batch(&config).context("missing-data report failed")?;
            let written =
                write_report(&mut report, &config).context("failed to write report")?;
            println!("{}", render_report_table(&report.summaries));
            info!(path = %written.path.display(), rows = written.rows, "report ready");
            report_skipped(report.skipped.len());
        }
        Command::NetPower(args) => {
            let config = resolve_config(&args)?;
            let mut result =
                net_power_batch(&config).context("net power computation failed")?;
            let written =
                write_net_power(&mut result, &config).context("failed to write net power")?;
            info!(path = %written.path.display(), rows = written.rows, "net power ready");
            report_skipped(result.skipped.len());
        }
    }

    Ok(())
}

/// Config file (flag, then environment), then command-line overrides.
fn resolve_config(args: &RunArgs) -> Result<PipelineConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config = match path {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    apply_overrides(config, args)
}

fn apply_overrides(mut config: PipelineConfig, args: &RunArgs) -> Result<PipelineConfig> {
    if args.resample {
        config.resample = true;
    }
    if args.merge {
        config.merge = true;
    }
    if args.fail_fast {
        config.failure_policy = FailurePolicy::FailFast;
    }
    if let Some(dir) = &args.power_dir {
        config.power_dir = dir.clone();
    }
    if let Some(dir) = &args.voltage_dir {
        config.voltage_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(list) = &args.sensors {
        config.sensors = SensorSelection::parse_list(list)
            .with_context(|| format!("invalid --sensors value '{list}'"))?;
    }
    config.validate()?;
    Ok(config)
}

fn report_skipped(count: usize) {
    if count > 0 {
        warn!(skipped = count, "some sensors were skipped; see run_summary.json");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_defaults_to_process() {
        let cli = Cli::try_parse_from(["gridprep", "--merge"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.run.merge);
    }

    #[test]
    fn subcommand_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "gridprep",
            "report",
            "--resample",
            "--fail-fast",
            "--sensors",
            "1-3,7",
            "--output-dir",
            "out",
        ])
        .unwrap();
        let Some(Command::Report(args)) = cli.command else {
            panic!("expected report command");
        };

        let config = apply_overrides(PipelineConfig::default(), &args).unwrap();
        assert!(config.resample);
        assert!(!config.merge);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(
            config.sensors,
            SensorSelection::List {
                ids: vec![1, 2, 3, 7]
            }
        );
    }

    #[test]
    fn malformed_sensor_list_is_rejected() {
        let args = RunArgs {
            sensors: Some("4-2".to_string()),
            ..RunArgs::default()
        };
        assert!(apply_overrides(PipelineConfig::default(), &args).is_err());
    }
}
