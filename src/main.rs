//! Activity Segmenter CLI
//!
//! Turns a sensor event log into labeled feature vectors.

use activity_segmenter::{
    config::{Config, PolicyOverrides, WindowPolicy},
    core::{DatasetBuilder, SegmentationEngine},
    stream::load_records,
    LAYOUT_DECLARATION, VERSION,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "activity-segment")]
#[command(version = VERSION)]
#[command(about = "Segment smart-home sensor logs into labeled feature vectors", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment an event log and write the dataset
    Segment {
        /// JSON array of event records
        #[arg(long, short)]
        input: PathBuf,

        /// Window policy (fixed_count, duration or gap_bounded)
        #[arg(long)]
        policy: Option<String>,

        /// Events per window (fixed_count)
        #[arg(long)]
        window_size: Option<usize>,

        /// Keep a final window shorter than the window size (fixed_count)
        #[arg(long)]
        emit_partial: bool,

        /// Target window duration in seconds (duration)
        #[arg(long)]
        target_secs: Option<f64>,

        /// Allowed deviation from the target in seconds (duration)
        #[arg(long)]
        tolerance_secs: Option<f64>,

        /// Events per chunk inside a gap (gap_bounded)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Produce vectors without labels
        #[arg(long)]
        unlabeled: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Dump)]
        format: OutputFormat,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show the feature layout
    Layout,

    /// Show configuration
    Config,

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text blocks
    Dump,
    /// One pretty-printed JSON document
    Json,
    /// One JSON record per line
    Jsonl,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Segment {
            input,
            policy,
            window_size,
            emit_partial,
            target_secs,
            tolerance_secs,
            chunk_size,
            unlabeled,
            format,
            output,
        } => {
            let overrides = PolicyOverrides {
                window_size,
                emit_partial: emit_partial.then_some(true),
                target_secs,
                tolerance_secs,
                chunk_size,
            };
            cmd_segment(
                config_path.as_deref(),
                &input,
                policy.as_deref(),
                &overrides,
                unlabeled,
                format,
                output.as_deref(),
            )
        }
        Commands::Layout => cmd_layout(config_path.as_deref()),
        Commands::Config => cmd_config(config_path.as_deref()),
        Commands::InitConfig { force } => cmd_init_config(config_path.as_deref(), force),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from(p).with_context(|| format!("loading config {}", p.display())),
        None => Config::load().context("loading default config"),
    }
}

fn cmd_segment(
    config_path: Option<&Path>,
    input: &Path,
    policy: Option<&str>,
    overrides: &PolicyOverrides,
    unlabeled: bool,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?;

    let window = match policy {
        Some(name) => name.parse::<WindowPolicy>()?,
        None => config.window.clone(),
    };
    config.window = window.with_overrides(overrides);
    if unlabeled {
        config.labeled = false;
    }

    let mut engine = SegmentationEngine::new(&config)?;
    let records =
        load_records(input).with_context(|| format!("reading events from {}", input.display()))?;
    info!(
        records = records.len(),
        policy = engine.policy_name(),
        labeled = config.labeled,
        "segmenting"
    );

    let output_data = engine.segment_records(&records)?;
    let summary = output_data.stats.summary();

    let builder = DatasetBuilder::new(
        engine.policy_name(),
        engine.layout().clone(),
        engine.is_labeled(),
    );
    let dataset = builder.build(output_data);

    match output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_dataset(&dataset, format, &mut writer)?;
            writer.flush()?;
            eprintln!("Wrote {} vectors to {}", dataset.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_dataset(&dataset, format, &mut writer)?;
        }
    }

    eprintln!();
    eprintln!("Run ID: {}", builder.run_id());
    eprintln!("{summary}");
    Ok(())
}

fn write_dataset<W: Write>(
    dataset: &activity_segmenter::Dataset,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Dump => dataset.write_dump(out)?,
        OutputFormat::Json => writeln!(out, "{}", dataset.to_json_pretty()?)?,
        OutputFormat::Jsonl => write!(out, "{}", dataset.to_json_lines()?)?,
    }
    Ok(())
}

fn cmd_layout(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = SegmentationEngine::new(&config)?;
    let layout = engine.layout();

    println!("Feature Layout");
    println!("==============");
    println!();
    println!("Time encoding: {:?}", layout.time_encoding);
    println!("Vector length: {}", layout.vector_len());
    println!();
    for (i, name) in layout.names().iter().enumerate() {
        println!("{i:>4}  {name}");
    }
    println!("{LAYOUT_DECLARATION}");
    Ok(())
}

fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!("Policy: {}", config.window.name());
    println!("Unmatched end: {:?}", config.unmatched_end_policy());
    match config.validate() {
        Ok(()) => println!("Valid: yes"),
        Err(e) => println!("Valid: no ({e})"),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_init_config(config_path: Option<&Path>, force: bool) -> Result<()> {
    let target = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }

    let config = Config::default();
    let written = match config_path {
        Some(path) => {
            config.save_to(path)?;
            path.to_path_buf()
        }
        None => config.save()?,
    };
    println!("Wrote default configuration to {}", written.display());
    Ok(())
}
