//! Configuration module
//!
//! Reads `~/.config/w1-temp-reporter/config.toml`, overlays the environment
//! variables the sensor has always been deployed with, and validates the
//! result into [`Settings`].

use crate::sensor::Clock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SENSOR_NAME: &str = "TEMP_SENSOR_NAME";
pub const ENV_SHEET_ID: &str = "TEMP_SENSOR_SHEET_ID";
pub const ENV_KEY_PATH: &str = "SERVICE_ACCOUNT_KEY_PATH";
pub const ENV_SHEET_NAME: &str = "SHEET_NAME";

const DEFAULT_SHEET_NAME: &str = "sensor_data";
const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com";
const DEFAULT_BIND: &str = "0.0.0.0:5000";
const DEFAULT_READ_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("a sheet id is set but no service account key path (SERVICE_ACCOUNT_KEY_PATH)")]
    MissingKeyPath,
    #[error("a service account key path is set but no sheet id (TEMP_SENSOR_SHEET_ID)")]
    MissingSheetId,
    #[error("invalid bind address {0:?}")]
    InvalidBind(String),
    #[error("sensor read timeout must be greater than zero")]
    InvalidTimeout,
}

// === File Layout ===

/// Config file contents; every field optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sensor: SensorSection,
    pub sheets: SheetsSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    pub name: Option<String>,
    pub device_id: Option<String>,
    pub devices_dir: Option<PathBuf>,
    pub read_timeout_secs: Option<u64>,
    pub utc: bool,
    pub mock_temperature: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSection {
    pub sheet_id: Option<String>,
    pub key_path: Option<PathBuf>,
    pub sheet_name: Option<String>,
    pub range: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: Option<String>,
}

// === Validated Settings ===

#[derive(Debug, Clone)]
pub struct Settings {
    pub sensor: SensorSettings,
    pub sheets: Option<SheetsSettings>,
    pub server: ServerSettings,
}

#[derive(Debug, Clone)]
pub struct SensorSettings {
    pub name: Option<String>,
    pub device_id: Option<String>,
    pub devices_dir: PathBuf,
    pub read_timeout: Duration,
    pub clock: Clock,
    pub mock_temperature: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetsSettings {
    pub sheet_id: String,
    pub key_path: PathBuf,
    pub range: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Get the default config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("w1-temp-reporter").join("config.toml"))
    }

    /// Load config from `path`, or return default if the file does not exist
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path.map(Path::to_path_buf).or_else(Self::path) {
            Some(path) => path,
            None => {
                tracing::warn!("Could not determine config directory, using defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Overlay environment variables; set values win over the file
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = non_empty(lookup(ENV_SENSOR_NAME)) {
            self.sensor.name = Some(name);
        }
        if let Some(sheet_id) = non_empty(lookup(ENV_SHEET_ID)) {
            self.sheets.sheet_id = Some(sheet_id);
        }
        if let Some(key_path) = non_empty(lookup(ENV_KEY_PATH)) {
            self.sheets.key_path = Some(PathBuf::from(key_path));
        }
        if let Some(sheet_name) = non_empty(lookup(ENV_SHEET_NAME)) {
            self.sheets.sheet_name = Some(sheet_name);
        }
    }

    /// Check the combination of values and fill in defaults
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let timeout_secs = self
            .sensor
            .read_timeout_secs
            .unwrap_or(DEFAULT_READ_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let sensor = SensorSettings {
            name: non_empty(self.sensor.name),
            device_id: non_empty(self.sensor.device_id),
            devices_dir: self
                .sensor
                .devices_dir
                .unwrap_or_else(|| PathBuf::from(crate::sensor::w1::DEFAULT_DEVICES_DIR)),
            read_timeout: Duration::from_secs(timeout_secs),
            clock: if self.sensor.utc { Clock::Utc } else { Clock::Local },
            mock_temperature: self.sensor.mock_temperature.unwrap_or(20.0),
        };

        let key_path = self
            .sheets
            .key_path
            .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty());
        let sheets = match (non_empty(self.sheets.sheet_id), key_path) {
            (Some(sheet_id), Some(key_path)) => {
                let sheet_name = non_empty(self.sheets.sheet_name)
                    .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());
                Some(SheetsSettings {
                    sheet_id,
                    key_path,
                    range: non_empty(self.sheets.range)
                        .unwrap_or_else(|| format!("{}!A2:B2", sheet_name)),
                    api_base: non_empty(self.sheets.api_base)
                        .unwrap_or_else(|| DEFAULT_SHEETS_API.to_string()),
                })
            }
            (Some(_), None) => return Err(ConfigError::MissingKeyPath),
            (None, Some(_)) => return Err(ConfigError::MissingSheetId),
            (None, None) => None,
        };

        let bind_raw = self.server.bind.unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_raw.clone()))?;

        Ok(Settings {
            sensor,
            sheets,
            server: ServerSettings { bind },
        })
    }
}
