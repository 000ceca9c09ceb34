//! Scull command-line front-end
//!
//! Creates the device table from defaults, an optional TOML file and
//! flags/environment, then runs one operation against it.
//!
//! # Examples
//!
//! ```bash
//! # Show the effective configuration
//! scull --quantum 512 config
//!
//! # Copy a file into device 1 at offset 1M and verify it reads back
//! scull store --minor 1 --input image.bin --offset 1048576
//!
//! # See what a single sparse write allocates
//! scull probe --offset 9000000 --len 10
//! ```

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use scull::{AccessMode, ScullConfig, ScullRegistry};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Scull - sparse in-memory byte devices
#[derive(Parser, Debug)]
#[command(name = "scull")]
#[command(version = scull::VERSION)]
#[command(about = "Scull - sparse, lazily allocated in-memory byte devices", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, global = true, env = "SCULL_CONFIG")]
    config: Option<PathBuf>,

    /// Quantum size in bytes
    #[arg(long, global = true, env = "SCULL_QUANTUM")]
    quantum: Option<usize>,

    /// Quanta per quantum set
    #[arg(long, global = true, env = "SCULL_QSET")]
    qset: Option<usize>,

    /// Number of devices
    #[arg(long, global = true, env = "SCULL_NR_DEVS")]
    nr_devs: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long, global = true, env = "SCULL_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective configuration as TOML
    Config,

    /// Copy a file into a device and read it back
    Store(StoreArgs),

    /// Write at a sparse offset and report what was allocated
    Probe(ProbeArgs),
}

/// Store arguments
#[derive(Args, Debug)]
struct StoreArgs {
    /// Device minor number
    #[arg(short, long, default_value = "0")]
    minor: usize,

    /// Input file path
    #[arg(short, long)]
    input: PathBuf,

    /// Byte offset to store at
    #[arg(long, default_value = "0")]
    offset: u64,

    /// Write the read-back bytes to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Probe arguments
#[derive(Args, Debug)]
struct ProbeArgs {
    /// Device minor number
    #[arg(short, long, default_value = "0")]
    minor: usize,

    /// Byte offset of the write
    #[arg(long)]
    offset: u64,

    /// Number of bytes to write
    #[arg(long, default_value = "1")]
    len: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let _guard = setup_logging(&cli)?;

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Commands::Store(args) => store_command(config, args),
        Commands::Probe(args) => probe_command(config, args),
    }
}

/// Setup console logging, plus rolling files when a log directory is given
fn setup_logging(cli: &Cli) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    let (file_layer, guard) = match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "scull.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(guard)
}

/// Defaults, then the config file, then flags and environment
fn load_config(cli: &Cli) -> anyhow::Result<ScullConfig> {
    let mut config = match &cli.config {
        Some(path) => ScullConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScullConfig::default(),
    };

    if let Some(quantum) = cli.quantum {
        config.quantum = quantum;
    }
    if let Some(qset) = cli.qset {
        config.qset = qset;
    }
    if let Some(nr_devs) = cli.nr_devs {
        config.nr_devs = nr_devs;
    }

    config.validate()?;
    Ok(config)
}

/// Store command - write a file into a device, then verify it
fn store_command(config: ScullConfig, args: StoreArgs) -> anyhow::Result<()> {
    let data = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let registry = ScullRegistry::new(config)?;

    let mut file = registry.open(args.minor, AccessMode::WriteOnly)?;
    file.write_all_at(args.offset, &data)?;
    info!(
        minor = args.minor,
        offset = args.offset,
        bytes = data.len(),
        "Stored input"
    );
    registry.release(file);

    let mut file = registry.open(args.minor, AccessMode::ReadOnly)?;
    let mut readback = vec![0u8; data.len()];
    let n = file.read_at(args.offset, &mut readback)?;
    let stats = file.stats();
    registry.release(file);

    if n != data.len() || readback != data {
        bail!(
            "Read-back mismatch: stored {} bytes, read {} matching bytes",
            data.len(),
            readback.iter().zip(&data).take_while(|(a, b)| a == b).count()
        );
    }

    if let Some(output) = &args.output {
        std::fs::write(output, &readback)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!(path = %output.display(), "Wrote read-back copy");
    }

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Probe command - one sparse write, then report allocation
fn probe_command(config: ScullConfig, args: ProbeArgs) -> anyhow::Result<()> {
    let registry = ScullRegistry::new(config)?;
    let mut file = registry.open(args.minor, AccessMode::ReadWrite)?;

    let pattern: Vec<u8> = (0..args.len).map(|i| (i % 251) as u8).collect();
    file.write_all_at(args.offset, &pattern)?;

    let stats = file.stats();
    let span = stats.size.saturating_sub(args.offset);
    if stats.allocated_bytes > span + 2 * config.quantum as u64 {
        warn!(
            allocated = stats.allocated_bytes,
            span, "Allocation exceeds the written span"
        );
    }
    registry.release(file);

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
