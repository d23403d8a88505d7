use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facelink_core::{CameraSource, Controller, DisplayState, Purpose};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod capture;
mod config;
mod http;
mod render;

use capture::{ImageFileSource, V4lCameraSource};
use config::Config;
use http::HttpRecognitionService;

#[derive(Parser)]
#[command(
    name = "facelink",
    version,
    about = "Webcam face verification and analysis client"
)]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/facelink/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a frame and check it against the enrolled identities
    Verify {
        /// Read the frame from an image file instead of the camera
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Capture a frame and estimate age, gender, race and emotion
    Analyze {
        /// Read the frame from an image file instead of the camera
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Interactive session: verify or analyze on demand
    Session {
        /// Read frames from an image file instead of the camera
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List V4L2 capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { image } => {
            let controller = start(cli.config.as_deref(), image).await?;
            let state = controller.run(Purpose::Verify, DisplayState::default()).await;
            print_state(&state);
        }
        Commands::Analyze { image } => {
            let controller = start(cli.config.as_deref(), image).await?;
            let state = controller.run(Purpose::Analyze, DisplayState::default()).await;
            print_state(&state);
        }
        Commands::Session { image } => {
            let controller = start(cli.config.as_deref(), image).await?;
            run_session(&controller).await?;
        }
        Commands::Devices => {
            let devices = facelink_hw::Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

/// Load configuration, build the controller and acquire the frame source.
async fn start(
    config_path: Option<&Path>,
    image: Option<PathBuf>,
) -> Result<Controller<HttpRecognitionService>> {
    let config = Config::load(config_path)?;
    tracing::info!(
        endpoint = %config.service_endpoint,
        model = %config.settings.model_name,
        detector = %config.settings.detector_backend,
        metric = %config.settings.distance_metric,
        anti_spoofing = config.settings.anti_spoofing,
        identities = config.registry.len(),
        "configuration loaded"
    );

    let service = HttpRecognitionService::new(config.service_endpoint.as_str())
        .context("failed to build HTTP client")?;
    let mut controller = Controller::new(service, config.settings, config.registry);

    let source: Box<dyn CameraSource> = match image {
        Some(path) => Box::new(ImageFileSource::new(path)),
        None => Box::new(V4lCameraSource::new(config.camera_device, config.warmup_frames)),
    };
    controller.acquire_camera(source.as_ref()).await;

    Ok(controller)
}

async fn run_session(controller: &Controller<HttpRecognitionService>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = DisplayState::default();

    loop {
        print!("[v]erify, [a]nalyze, [q]uit> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let purpose = match line.trim() {
            "v" | "verify" => Purpose::Verify,
            "a" | "analyze" => Purpose::Analyze,
            "q" | "quit" | "exit" => break,
            "" => continue,
            other => {
                println!("unknown command: {other}");
                continue;
            }
        };

        state = controller.run(purpose, state).await;
        print_state(&state);
    }

    Ok(())
}

fn print_state(state: &DisplayState) {
    for line in render::render(state) {
        println!("{line}");
    }
}
