//! Shotcraft CLI: batch export of app-store screenshots and preview videos.
//!
//! Usage:
//!   shotcraft export <PROJECT>     Export every screen for every device and language
//!   shotcraft poster <PROJECT>     Render one poster-frame still
//!   shotcraft layout <PROJECT>     Print computed screenshot rects as JSON
//!   shotcraft devices              List the device catalogue
//!   shotcraft check                Check FFmpeg, encoder, and font availability

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use shotcraft_common::config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "shotcraft",
    about = "Composite app-store screenshots and preview videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a project: videos first, then stills
    Export {
        /// Path to project.json
        project: PathBuf,

        /// Output root directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Still image format: png|jpeg
        #[arg(long)]
        format: Option<String>,

        /// Render video items as poster stills instead of re-encoding
        #[arg(long)]
        posters: bool,

        /// Restrict to these devices (repeatable)
        #[arg(long = "device")]
        devices: Vec<String>,

        /// Restrict to these language codes (repeatable)
        #[arg(long = "language")]
        languages: Vec<String>,
    },

    /// Render a single screen as a poster-frame still
    Poster {
        /// Path to project.json
        project: PathBuf,

        /// Screen name or id
        #[arg(long)]
        screen: String,

        /// Device name
        #[arg(long)]
        device: String,

        /// Language code
        #[arg(long, default_value = "en")]
        language: String,

        /// Output file (.png or .jpeg)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the computed layout for each screen as JSON
    Layout {
        /// Path to project.json
        project: PathBuf,

        /// Restrict to these devices (repeatable)
        #[arg(long = "device")]
        devices: Vec<String>,

        /// Language whose media is probed for fitted layouts
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// List the built-in device catalogue
    Devices {
        /// Only this category (e.g. iPhone, iPad, mac)
        #[arg(long)]
        category: Option<String>,
    },

    /// Check FFmpeg, H.264 encoder, and font availability
    Check {
        /// Font family to resolve
        #[arg(long, default_value = "SF Pro Display")]
        font: String,

        /// Also probe this video file
        #[arg(long)]
        probe: Option<PathBuf>,
    },
}

/// Config plus a warning to log once the subscriber is up.
fn load_config(path: Option<&Path>) -> anyhow::Result<(AppConfig, Option<String>)> {
    match path {
        Some(path) => {
            let config = AppConfig::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            Ok((config, None))
        }
        None => Ok(AppConfig::load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let (config, config_warning) = load_config(cli.config.as_deref())?;

    // Initialize logging
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    shotcraft_common::logging::init_logging(&LoggingConfig {
        level,
        json: cli.json_logs || config.logging.json,
        file: config.logging.file.clone(),
    });
    if let Some(warning) = config_warning {
        tracing::warn!("{warning}");
    }

    match cli.command {
        Commands::Export {
            project,
            output,
            format,
            posters,
            devices,
            languages,
        } => {
            commands::export::run(
                commands::export::ExportArgs {
                    project,
                    output,
                    format,
                    posters,
                    devices,
                    languages,
                },
                &config,
            )
            .await
        }
        Commands::Poster {
            project,
            screen,
            device,
            language,
            output,
        } => commands::poster::run(project, screen, device, language, output, &config)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Layout {
            project,
            devices,
            language,
        } => commands::layout::run(project, devices, language, &config).map(|()| ExitCode::SUCCESS),
        Commands::Devices { category } => commands::devices::run(category).map(|()| ExitCode::SUCCESS),
        Commands::Check { font, probe } => {
            commands::check::run(font, probe, &config).map(|()| ExitCode::SUCCESS)
        }
    }
}
