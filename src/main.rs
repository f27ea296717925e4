use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use mbtrace::config::{CleanConfig, ClipConfig, StatsConfig, trim_columns};
use mbtrace::manager;
use mbtrace::stats::OutlierMethod;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge recordings into a single CSV file.
    Load {
        /// Glob pattern of the recordings (e.g. 'P*_boring.csv').
        #[arg(long)]
        pattern: String,
        #[arg(long)]
        output: PathBuf,
        /// Condition label of the loaded samples.
        #[arg(long, default_value = "")]
        condition: String,
    },

    /// Remove samples with missing data or outliers.
    Clean {
        #[arg(long)]
        input: String,
        #[arg(long)]
        output: PathBuf,
        /// Comma-separated list of required columns.
        #[arg(long, value_delimiter = ',')]
        required: Vec<String>,
        #[arg(long)]
        remove_outliers: bool,
        /// Outlier detection method: 'iqr' or 'zscore'.
        #[arg(long, default_value = "iqr")]
        outlier_method: String,
        /// Maximum percentage of missing required columns per sample (0-100).
        #[arg(long, default_value_t = 0.0)]
        max_missing: f64,
        #[arg(long, default_value_t = 3.0)]
        z_threshold: f64,
    },

    /// Extract a time range.
    Clip {
        #[arg(long)]
        input: String,
        #[arg(long)]
        output: PathBuf,
        /// Start time in seconds (default: first sample).
        #[arg(long)]
        start: Option<f64>,
        /// End time in seconds (default: last sample).
        #[arg(long)]
        end: Option<f64>,
    },

    /// Compute descriptive statistics.
    Stats {
        /// Comma-separated list of input files.
        #[arg(long, value_delimiter = ',', required = true)]
        inputs: Vec<String>,
        /// Comma-separated list of columns to analyze (default: all).
        #[arg(long, value_delimiter = ',')]
        analyze: Vec<String>,
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        by_condition: bool,
        #[arg(long)]
        by_participant: bool,
        /// Report file ('.msgpack' for MessagePack, text otherwise).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run the pipeline described by a TOML file.
    Run {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    match args.command {
        Command::Load {
            pattern,
            output,
            condition,
        } => manager::run_load(&pattern, &condition, output)?,
        Command::Clean {
            input,
            output,
            required,
            remove_outliers,
            outlier_method,
            max_missing,
            z_threshold,
        } => {
            let cfg = CleanConfig {
                required_columns: trim_columns(&required),
                remove_outliers,
                outlier_method: OutlierMethod::from_name(&outlier_method),
                max_missing_percent: max_missing,
                z_threshold,
            };
            manager::run_clean(&input, output, &cfg)?
        }
        Command::Clip {
            input,
            output,
            start,
            end,
        } => {
            let cfg = ClipConfig {
                start_time: start,
                end_time: end,
            };
            manager::run_clip(&input, output, &cfg)?
        }
        Command::Stats {
            inputs,
            analyze,
            by_condition,
            by_participant,
            output,
        } => {
            let cfg = StatsConfig {
                analyze_columns: trim_columns(&analyze),
                by_condition,
                by_participant,
            };
            manager::run_stats(&inputs, &cfg, output.as_deref())?
        }
        Command::Run { config } => manager::run_pipeline(config)?,
    }

    Ok(())
}
