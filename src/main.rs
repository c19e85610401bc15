// SPDX-License-Identifier: GPL-3.0-only

use camera_preview::Config;
use camera_preview::app::{self, PreviewOptions};
use camera_preview::backends::camera::{CameraFacing, SourceSpec};
use camera_preview::constants::app_info;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-preview")]
#[command(about = "Live NV21 camera preview rendered on the GPU")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Debug logging for this crate (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Frame source selection shared by commands
#[derive(Args, Debug, Clone, Default)]
struct SourceArgs {
    /// V4L2 device node (default: from config, else first NV21 device)
    #[arg(short, long, conflicts_with = "synthetic")]
    device: Option<String>,

    /// Use the built-in color-bar source instead of a camera
    #[arg(long)]
    synthetic: bool,

    /// Start with the front camera
    #[arg(long)]
    front: bool,

    /// Capture width
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Capture height
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Store the device, facing and size as the new defaults
    #[arg(long)]
    save: bool,
}

impl SourceArgs {
    /// Apply flags over the saved configuration
    fn apply(&self, config: &mut Config) -> (SourceSpec, CameraFacing) {
        if let (Some(width), Some(height)) = (self.width, self.height) {
            config.preview_width = width;
            config.preview_height = height;
        }
        if self.device.is_some() {
            config.device_path = self.device.clone();
        }

        let source = if self.synthetic {
            SourceSpec::Synthetic
        } else {
            SourceSpec::V4l2 {
                device_path: config.device_path.clone(),
            }
        };
        let facing = if self.front { CameraFacing::Front } else { config.facing };
        config.facing = facing;
        (source, facing)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Open the preview window (default)
    Run {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// List available cameras
    List,

    /// Render one frame to a PNG
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file path (default: ~/Pictures/Camera/snapshot_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output size as WIDTHxHEIGHT (default: frame size, portrait)
        #[arg(long, value_parser = cli::parse_viewport)]
        viewport: Option<(u32, u32)>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_preview=debug, RUST_LOG=info
    let default_filter = if cli.verbose { "camera_preview=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let mut config = Config::load();

    match cli.command {
        None => run_preview(config, &SourceArgs::default())?,
        Some(Commands::Run { source }) => run_preview(config, &source)?,
        Some(Commands::List) => cli::list_cameras()?,
        Some(Commands::Snapshot {
            source,
            output,
            viewport,
        }) => {
            let (spec, facing) = source.apply(&mut config);
            save_if_requested(&config, &source);
            cli::take_snapshot(&config, spec, facing, viewport, output)?;
        }
    }

    Ok(())
}

fn run_preview(mut config: Config, args: &SourceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (source, facing) = args.apply(&mut config);
    save_if_requested(&config, args);
    let options = PreviewOptions {
        source,
        facing,
        width: config.preview_width,
        height: config.preview_height,
        retry: config.retry_policy(),
        fps_window: config.fps_window,
        cpu_sample_interval: config.cpu_sample_interval(),
        cpu_average_window: config.cpu_average_window,
    };
    app::run(options)?;
    Ok(())
}

fn save_if_requested(config: &Config, args: &SourceArgs) {
    if !args.save {
        return;
    }
    match config.save() {
        Ok(()) => tracing::info!("Configuration saved"),
        Err(e) => tracing::warn!(error = %e, "Failed to save configuration"),
    }
}
