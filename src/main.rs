//! w1-temp-reporter: one-wire temperature sensor reporter
//!
//! Reads a DS18B20-family thermometer and delivers the reading to:
//! - stdout (one-shot `report`, the default command)
//! - an HTTP endpoint, `GET /temperature` (`serve`)
//! - a Google Sheets range, when a sheet id and service account key are configured
//!
//! Features:
//! - server: axum HTTP endpoint
//! - sheets: Google Sheets sink (service-account auth over reqwest)

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// === Modules ===

mod config;
mod format;
mod report;
mod sensor;
mod shared;

#[cfg(feature = "server")]
mod server;

#[cfg(feature = "sheets")]
mod sheets;

use config::{SensorSettings, Settings};
use sensor::{MockSensor, SensorError, SensorReader, W1ThermSensor};

// === CLI ===

#[derive(Parser)]
#[command(name = "w1-temp-reporter")]
#[command(about = "Report one-wire temperature readings over HTTP and to Google Sheets")]
struct Cli {
    /// Config file (default: ~/.config/w1-temp-reporter/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a fixed-temperature mock sensor instead of the one-wire bus
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one reading, print it, and append it to the sheet if configured
    Report,
    /// Serve readings at GET /temperature
    #[cfg(feature = "server")]
    Serve {
        /// Address to listen on (overrides [server].bind)
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },
    /// List thermometers on the one-wire bus
    List,
    /// Open the config file in your editor
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        None | Some(Commands::Report) => {
            run_report(load_settings(config_path)?, cli.mock).await?;
        }
        #[cfg(feature = "server")]
        Some(Commands::Serve { bind }) => {
            run_server(load_settings(config_path)?, bind, cli.mock).await?;
        }
        Some(Commands::List) => {
            run_list(&load_settings(config_path)?.sensor)?;
        }
        Some(Commands::Config) => {
            run_config_command(config_path)?;
        }
    }

    Ok(())
}

/// File, then environment, then validation
fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut config = config::Config::load(path)?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config.validate()?)
}

fn open_reader(sensor: &SensorSettings, mock: bool) -> Result<SensorReader, SensorError> {
    tracing::debug!(
        "Sensor read timeout {}",
        shared::format_duration(sensor.read_timeout)
    );

    if mock {
        tracing::warn!("Using mock sensor fixed at {}°C", sensor.mock_temperature);
        return Ok(SensorReader::new(
            MockSensor::fixed(sensor.mock_temperature),
            sensor.read_timeout,
            sensor.clock,
        ));
    }

    let driver = W1ThermSensor::open(&sensor.devices_dir, sensor.device_id.as_deref())?;
    Ok(SensorReader::new(driver, sensor.read_timeout, sensor.clock))
}

/// One-shot: read, print, optionally append
async fn run_report(settings: Settings, mock: bool) -> anyhow::Result<()> {
    let reader = open_reader(&settings.sensor, mock)?;
    report::report(&reader, settings.sheets.as_ref(), &mut std::io::stdout()).await
}

/// Run the HTTP endpoint
#[cfg(feature = "server")]
async fn run_server(
    settings: Settings,
    bind: Option<std::net::SocketAddr>,
    mock: bool,
) -> anyhow::Result<()> {
    tracing::info!("Starting w1-temp-reporter server");

    let state = server::AppState {
        reader: open_reader(&settings.sensor, mock)?,
        sensor_name: settings.sensor.name.clone(),
    };
    server::serve(state, bind.unwrap_or(settings.server.bind)).await?;

    tracing::info!("w1-temp-reporter server stopped");
    Ok(())
}

fn run_list(sensor: &SensorSettings) -> anyhow::Result<()> {
    let ids = W1ThermSensor::discover(&sensor.devices_dir)?;
    if ids.is_empty() {
        println!("No thermometers found in {}", sensor.devices_dir.display());
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

/// Open config file in user's editor
fn run_config_command(path: Option<&Path>) -> anyhow::Result<()> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => config::Config::path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?,
    };

    // Create config dir if needed
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Create config file from template if it doesn't exist
    if !config_path.exists() {
        let template = include_str!("../config.toml.example");
        std::fs::write(&config_path, template)?;
        println!("Created config file: {}", config_path.display());
    }

    // Get editor from environment or use defaults
    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            { "notepad".to_string() }
            #[cfg(not(target_os = "windows"))]
            { "nano".to_string() }
        });

    println!("Opening {} with {}", config_path.display(), editor);

    std::process::Command::new(&editor)
        .arg(&config_path)
        .status()?;

    Ok(())
}
