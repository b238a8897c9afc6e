//! rrd-transfer CLI
//!
//! Command-line interface for moving logged history between devices:
//! - Inject CSV exports into a device's round-robin archives
//! - Export archives as CSV files
//! - Inspect a metadata file

use anyhow::Context;
use chrono::DateTime;
use clap::{Parser, Subcommand};
use rrd_transfer::archive::{Buffer, Cutoff, DecodedMetadata};
use rrd_transfer::config::{Config, LoggingConfig};
use rrd_transfer::names::DeviceNames;
use rrd_transfer::transfer::{TransferConfig, TransferEngine};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rrd-transfer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Transfer logged history into round-robin archives")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge CSV exports into the archives
    Inject {
        /// Directory with the .dat and .rra files
        #[arg(long)]
        archive_dir: Option<PathBuf>,
        /// Directory with the CSV files to import
        #[arg(long)]
        import_dir: Option<PathBuf>,
        /// Logger configuration XML with the device names
        #[arg(long)]
        names: Option<PathBuf>,
        /// Import samples up to and including this day (YYYY-mm-dd)
        #[arg(long)]
        until: Option<String>,
        /// Compute merges without writing the archives
        #[arg(long)]
        dry_run: bool,
    },

    /// Write every archive buffer as an importable CSV file
    Export {
        /// Directory with the .dat and .rra files
        #[arg(long)]
        archive_dir: Option<PathBuf>,
        /// Output directory
        #[arg(long)]
        out_dir: PathBuf,
        /// Logger configuration XML with the device names
        #[arg(long)]
        names: Option<PathBuf>,
    },

    /// Show the contents of a metadata file
    Inspect {
        /// Path to the .dat file
        path: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        /// Logger configuration XML with the device names
        #[arg(long)]
        names: Option<PathBuf>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Inject {
            archive_dir,
            import_dir,
            names,
            until,
            dry_run,
        } => {
            let settings = &config.transfer;
            let until = until.or_else(|| settings.until.clone());
            let cutoff = match until.as_deref() {
                Some(date) => Cutoff::from_date_str(date)?,
                None => Cutoff::unbounded(),
            };

            let transfer = TransferConfig::new(
                archive_dir.unwrap_or_else(|| PathBuf::from(&settings.archive_dir)),
                import_dir.unwrap_or_else(|| PathBuf::from(&settings.import_dir)),
            )
            .cutoff(cutoff)
            .dry_run(dry_run || settings.dry_run);

            let names = load_names(names.as_deref(), &config)?;
            let report = TransferEngine::new(transfer, names).inject()?;

            println!("{}", report);
            if dry_run || settings.dry_run {
                println!();
                println!("(Dry run - no archive was modified)");
            }
        }

        Commands::Export {
            archive_dir,
            out_dir,
            names,
        } => {
            let archive_dir =
                archive_dir.unwrap_or_else(|| PathBuf::from(&config.transfer.archive_dir));
            let transfer = TransferConfig::new(archive_dir, &out_dir);
            let names = load_names(names.as_deref(), &config)?;

            let report = TransferEngine::new(transfer, names).export(&out_dir)?;
            println!("{}", report);
        }

        Commands::Inspect { path, json, names } => {
            let names = match names {
                Some(file) => load_names(Some(&file), &config)?,
                None => load_names(None, &config).unwrap_or_default(),
            };
            let archive_dir = path.parent().unwrap_or(Path::new("."));
            let engine = TransferEngine::new(TransferConfig::new(archive_dir, archive_dir), names);

            let decoded = engine
                .inspect(&path)
                .with_context(|| format!("Failed to decode {:?}", path))?;
            if json {
                let value = serde_json::json!({
                    "device": &decoded.device,
                    "corruption": decoded.corruption.as_ref().map(|e| e.to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_metadata(&decoded);
            }
        }

        Commands::Config { output } => {
            let config = rrd_transfer::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("rrd_transfer={}", logging.level)),
    );

    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = logging.file.is_none();

    let (pretty, json) = if logging.format == "json" {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false);
        (None, Some(layer))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
    Ok(())
}

fn load_names(path: Option<&Path>, config: &Config) -> anyhow::Result<DeviceNames> {
    let path = path.unwrap_or(Path::new(&config.transfer.names_file));
    let names = DeviceNames::from_xml_path(path)
        .with_context(|| format!("Failed to load device names from {:?}", path))?;
    tracing::info!("Loaded {} device names from {:?}", names.len(), path);
    Ok(names)
}

fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_buffer(index: usize, buffer: &Buffer) {
    println!(
        "  [{}] {:<8} {} slots, newest at slot {}, step {}s, consolidator {}",
        index,
        buffer.interval,
        buffer.n_samples,
        buffer.newest_slot(),
        buffer.step(),
        buffer.consolidator
    );
    if let Some((oldest, newest)) = buffer.window() {
        println!(
            "      {} .. {}",
            format_timestamp(oldest),
            format_timestamp(newest)
        );
    }
}

fn print_metadata(decoded: &DecodedMetadata) {
    let device = &decoded.device;
    println!("Device:   {}", device.id);
    println!("Name:     {}", device.name.as_deref().unwrap_or("(unknown)"));
    println!("Variable: {}", device.variable);
    println!("Service:  {}", device.service);
    println!("Type:     {} ({})", device.sample_type, device.kind);

    if device.is_placeholder() {
        println!();
        println!("Placeholder archive, no buffers");
        return;
    }

    println!();
    println!("Buffers:");
    for (index, buffer) in device.buffers.iter().enumerate() {
        print_buffer(index, buffer);
    }

    if let Some(e) = &decoded.corruption {
        println!();
        println!("Warning: {}", e);
    }
}
