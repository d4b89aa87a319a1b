//! WPM pipeline CLI
//!
//! Segments sensor recordings into protocol activities and builds labeled
//! window stacks for training.

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wpm_segmentation::{
    config::Config,
    core::{ActivitySegmenter, BodySegment, ChannelSelector},
    io::{save_segmented, save_stack},
    pipeline::{self, ExistingOutput, StackOptions},
    PipelineReport, VERSION,
};

#[derive(Parser)]
#[command(name = "wpm-pipeline")]
#[command(version = VERSION)]
#[command(
    about = "Activity segmentation and windowing for WPM sensor recordings",
    long_about = None
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut a CSV recording into one matrix per protocol activity
    Segment {
        /// Recording CSV (timestamp in ms, then sensor channels)
        csv: PathBuf,

        /// Activity schedule as a flat JSON object
        schedule: PathBuf,

        /// Where the device was worn (Thigh, Wrist or Hip)
        body_segment: BodySegment,

        /// IANA timezone the schedule times are written in
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Output archive (defaults to <csv stem>_segmented.npz)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Window segmented archives and stack the windows with labels
    Stack {
        /// Segmented archives, one per body segment
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Samples per window
        #[arg(long, value_parser = parse_positive)]
        window_size: usize,

        /// Samples between window starts (defaults to the window size)
        #[arg(long, value_parser = parse_positive)]
        step_size: Option<usize>,

        /// Columns to keep from each archive, e.g. "1:7" or "1,2,3"
        #[arg(long, default_value = "1:7")]
        crop_columns: ChannelSelector,

        /// Output archive
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Merge stacked archives into one
    Merge {
        /// Stacked archives
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output archive
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Run the configured stages for one subject
    Run {
        /// Configuration file (defaults to the user config location)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Regenerate outputs that already exist instead of skipping their stage
        #[arg(long)]
        force: bool,
    },

    /// Show configuration
    Config {
        /// Write a sample configuration to this path
        #[arg(long)]
        init: Option<PathBuf>,
    },
}

fn parse_positive(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be a positive integer".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Segment {
            csv,
            schedule,
            body_segment,
            timezone,
            output,
        } => cmd_segment(&csv, &schedule, body_segment, &timezone, output),
        Commands::Stack {
            inputs,
            window_size,
            step_size,
            crop_columns,
            output,
        } => cmd_stack(&inputs, window_size, step_size, crop_columns, output),
        Commands::Merge { inputs, output } => cmd_merge(&inputs, &output),
        Commands::Run { config, force } => cmd_run(config, existing_output(force)),
        Commands::Config { init } => cmd_config(init),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn cmd_segment(
    csv: &Path,
    schedule: &Path,
    body_segment: BodySegment,
    timezone: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| anyhow!("unknown timezone '{timezone}'"))?;
    let output = output.unwrap_or_else(|| {
        let stem = csv
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        csv.with_file_name(format!("{stem}_segmented.npz"))
    });

    let mut report = PipelineReport::new();
    let segmenter = ActivitySegmenter::new(tz);
    let segmented =
        pipeline::segment_recording(csv, schedule, body_segment, &segmenter, &mut report)
            .with_context(|| format!("Failed to segment {}", csv.display()))?;

    println!("Segmented {} ({body_segment}, {tz})", csv.display());
    println!();
    for (name, matrix) in &segmented {
        println!("  {name:<30} {:>8} rows", matrix.nrows());
    }

    let path = save_segmented(&output, &segmented)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!();
    println!("Saved to {}", path.display());
    Ok(())
}

fn cmd_stack(
    inputs: &[PathBuf],
    window_size: usize,
    step_size: Option<usize>,
    crop_columns: ChannelSelector,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut options = StackOptions::new(window_size).with_crop_columns(crop_columns);
    options.step_size = step_size;

    let mut report = PipelineReport::new();
    let stack = pipeline::load_concat_window_stack(inputs, &options, &mut report)
        .context("Failed to build stack")?;

    println!(
        "Stacked {} windows, shape {:?}",
        stack.len(),
        stack.data.shape()
    );
    if let Some(output) = output {
        let path = save_stack(&output, &stack)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        report.record_file(&path);
        println!("Saved to {}", path.display());
    }
    println!();
    println!("{}", report.summary());
    Ok(())
}

fn cmd_merge(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let merged = pipeline::merge_stack_files(inputs).context("Failed to merge stacks")?;
    let path = save_stack(output, &merged)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Merged {} archive(s): {} rows, shape {:?}",
        inputs.len(),
        merged.len(),
        merged.data.shape()
    );
    println!("Saved to {}", path.display());
    Ok(())
}

fn existing_output(force: bool) -> ExistingOutput {
    if force {
        ExistingOutput::Overwrite
    } else {
        ExistingOutput::Keep
    }
}

fn cmd_run(config_path: Option<PathBuf>, existing: ExistingOutput) -> Result<()> {
    let config = match &config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    println!("WPM pipeline v{VERSION}: subject {}", config.project.subject_name);
    let report = pipeline::run(&config, existing).context("Pipeline run failed")?;

    println!();
    println!("{}", report.summary());
    Ok(())
}

fn cmd_config(init: Option<PathBuf>) -> Result<()> {
    if let Some(path) = init {
        let path = if path.extension().is_none() {
            path.with_extension("json")
        } else {
            path
        };
        Config::default()
            .save_to(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Sample configuration written to {}", path.display());
        println!("Edit it and pass it to 'wpm-pipeline run --config'.");
        return Ok(());
    }

    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
