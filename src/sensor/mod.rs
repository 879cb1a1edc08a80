//! Sensors module - one-wire temperature acquisition
//!
//! A [`SensorReader`] owns a [`TemperatureSensor`] driver and turns each
//! driver read into a timestamped [`Reading`].

pub mod mock;
pub mod w1;

use chrono::{Local, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};

pub use mock::MockSensor;
pub use w1::W1ThermSensor;

// === Data Types ===

/// A timestamped temperature. Only ever built complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(with = "crate::shared::timestamp")]
    pub time: NaiveDateTime,
    pub temperature: f64,
}

impl Reading {
    pub fn new(time: NaiveDateTime, temperature: f64) -> Self {
        Self {
            time: time.trunc_subsecs(0),
            temperature,
        }
    }
}

/// Which clock readings are stamped with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    Local,
    Utc,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn utc_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl Clock {
    fn source(self) -> fn() -> NaiveDateTime {
        match self {
            Clock::Local => local_now,
            Clock::Utc => utc_now,
        }
    }
}

// === Errors ===

/// Why a reading could not be taken
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("no supported one-wire sensor found in {0}")]
    NoSensorFound(PathBuf),
    #[error("sensor {0} not found")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sensor CRC check failed")]
    CrcCheckFailed,
    #[error("sensor not ready (empty scratchpad)")]
    NotReady,
    #[error("sensor returned the power-on reset value")]
    ResetValue,
    #[error("malformed sensor data: {0}")]
    Malformed(String),
    #[error("sensor read timed out after {0:?}")]
    Timeout(Duration),
    #[error("sensor task failed: {0}")]
    Task(String),
    #[error("sensor unavailable")]
    Unavailable,
}

// === Driver Trait ===

/// A blocking temperature driver
pub trait TemperatureSensor: Send + Sync + std::fmt::Debug {
    /// Current temperature in degrees Celsius
    fn read_celsius(&self) -> Result<f64, SensorError>;

    /// Identifier for logs
    fn id(&self) -> &str;
}

// === Reader ===

/// Produces fresh readings on demand. Cheap to clone.
///
/// Clones share one bus permit: at most one driver read runs at a time, so a
/// hung bus holds a single blocking thread and later callers time out waiting
/// for the permit instead of spawning more reads.
#[derive(Debug, Clone)]
pub struct SensorReader {
    sensor: Arc<dyn TemperatureSensor>,
    bus: Arc<Semaphore>,
    timeout: Duration,
    now: fn() -> NaiveDateTime,
}

impl SensorReader {
    pub fn new(sensor: impl TemperatureSensor + 'static, timeout: Duration, clock: Clock) -> Self {
        Self {
            sensor: Arc::new(sensor),
            bus: Arc::new(Semaphore::new(1)),
            timeout,
            now: clock.source(),
        }
    }

    /// Stamp readings from `now` instead of the wall clock
    #[cfg(test)]
    pub fn with_time_source(mut self, now: fn() -> NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Read the sensor once and stamp the value with the current time
    pub async fn acquire(&self) -> Result<Reading, SensorError> {
        let deadline = Instant::now() + self.timeout;

        let permit = match timeout_at(deadline, Arc::clone(&self.bus).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => return Err(SensorError::Task(e.to_string())),
            Err(_) => return Err(SensorError::Timeout(self.timeout)),
        };

        let sensor = Arc::clone(&self.sensor);
        let read = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            sensor.read_celsius()
        });

        let temperature = match timeout_at(deadline, read).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(SensorError::Task(e.to_string())),
            Err(_) => return Err(SensorError::Timeout(self.timeout)),
        };

        let reading = Reading::new((self.now)(), temperature);
        tracing::debug!(
            "Sensor {} read {:.3}°C at {}",
            self.sensor.id(),
            reading.temperature,
            reading.time
        );
        Ok(reading)
    }
}
