//! fourcell: process entry points for the Connect Four game cell
//!
//! Each long-running subcommand is one process of the cell:
//! - `camera` publishes frames into shared memory
//! - `coordinator` runs the turn state machine over the shared record
//! - `robot` hands the automated side's columns to the arm controller
//!
//! The rest are operator helpers working on the shared record.

mod commands;
mod perception;
mod play;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, value_parser};
use fourcell_core::{CameraBackend, CellConfig, MoveSourceKind};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "fourcell", version, about = "Vision-guided Connect Four cell")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Shared game record path
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log verbosity (1: INFO, 2: DEBUG); RUST_LOG takes precedence
    #[arg(long, global = true, default_value_t = 1, value_parser = value_parser!(u8).range(1..=2))]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture frames and publish them to a shared region
    Camera(CameraArgs),
    /// Run the turn state machine
    Coordinator(CoordinatorArgs),
    /// Execute the automated side's moves on the arm
    Robot(RobotArgs),
    /// Start a new session
    Reset,
    /// Show the shared record
    Status {
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report the human's column (1-7)
    Submit {
        #[arg(value_parser = value_parser!(u8).range(1..=7))]
        column: u8,
    },
    /// Absorb a perception grid (file or stdin)
    Absorb {
        /// Grid file; stdin when omitted
        file: Option<PathBuf>,
        /// Overwrite the board instead of deriving a move
        #[arg(long)]
        replace: bool,
    },
    /// Ask every process to end the session
    Stop,
    /// Play against the engine in the terminal
    Play {
        /// Search depth
        #[arg(long)]
        depth: Option<u32>,
        /// Seed for the tie-break order
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Args)]
struct CameraArgs {
    /// Capture backend
    #[arg(long)]
    backend: Option<Backend>,
    /// Device indices to try, in order
    #[arg(long = "index")]
    indices: Vec<u32>,
    /// Device path template, `{index}` is substituted
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    fps: Option<u32>,
    #[arg(long)]
    gamma: Option<f64>,
}

#[derive(Debug, Args)]
struct CoordinatorArgs {
    /// Search depth
    #[arg(long)]
    depth: Option<u32>,
    /// Store poll interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,
    /// Reset the record before starting
    #[arg(long)]
    reset: bool,
}

#[derive(Debug, Args)]
struct RobotArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Where moves come from: store or engine
    #[arg(long)]
    source: Option<MoveSource>,
    /// Read the handshake variables once and exit
    #[arg(long)]
    once: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Backend {
    V4l,
    Raw,
}

impl From<Backend> for CameraBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::V4l => CameraBackend::V4l,
            Backend::Raw => CameraBackend::Raw,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum MoveSource {
    Store,
    Engine,
}

impl From<MoveSource> for MoveSourceKind {
    fn from(source: MoveSource) -> Self {
        match source {
            MoveSource::Store => MoveSourceKind::Store,
            MoveSource::Engine => MoveSourceKind::Engine,
        }
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = if verbose >= 2 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Token cancelled on Ctrl-C
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("User cancelled the operation (Ctrl+C), shutting down...");
            trigger.cancel();
        }
    });
    cancel
}

fn apply_overrides(config: &mut CellConfig, cli: &Cli) {
    if let Some(path) = &cli.store {
        config.store.path = path.clone();
    }

    match &cli.command {
        Command::Camera(args) => {
            if let Some(backend) = args.backend {
                config.camera.backend = backend.into();
            }
            if !args.indices.is_empty() {
                config.camera.device_indices = args.indices.clone();
            }
            if let Some(device) = &args.device {
                config.camera.device_path_template = device.clone();
            }
            if let Some(fps) = args.fps {
                config.camera.fps = fps;
            }
            if let Some(gamma) = args.gamma {
                config.camera.gamma = gamma;
            }
        }
        Command::Coordinator(args) => {
            if let Some(depth) = args.depth {
                config.engine.depth = depth;
            }
            if let Some(poll_ms) = args.poll_ms {
                config.coordinator.poll_interval_ms = poll_ms;
            }
        }
        Command::Robot(args) => {
            if let Some(host) = &args.host {
                config.robot.host = host.clone();
            }
            if let Some(port) = args.port {
                config.robot.port = port;
            }
            if let Some(source) = args.source {
                config.robot.move_source = source.into();
            }
        }
        Command::Play {
            depth: Some(depth), ..
        } => config.engine.depth = *depth,
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut config = CellConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    match cli.command {
        Command::Camera(_) => commands::camera(&config, shutdown_token()).await,
        Command::Coordinator(args) => {
            commands::coordinator(&config, args.reset, shutdown_token()).await
        }
        Command::Robot(args) => commands::robot(&config, args.once, shutdown_token()).await,
        Command::Reset => commands::reset(&config).await,
        Command::Status { json } => commands::status(&config, json).await,
        Command::Submit { column } => commands::submit(&config, column).await,
        Command::Absorb { file, replace } => {
            commands::absorb(&config, file.as_deref(), replace).await
        }
        Command::Stop => commands::stop(&config).await,
        Command::Play { seed, .. } => commands::play(&config, seed).await,
    }
}
