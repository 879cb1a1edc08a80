//! Mock sensor for tests and hardware-free deployments

use super::{SensorError, TemperatureSensor};

/// Returns a fixed temperature, or always fails
#[derive(Debug, Clone)]
pub struct MockSensor {
    celsius: Option<f64>,
}

impl MockSensor {
    pub fn fixed(celsius: f64) -> Self {
        Self {
            celsius: Some(celsius),
        }
    }

    pub fn failing() -> Self {
        Self { celsius: None }
    }
}

impl TemperatureSensor for MockSensor {
    fn read_celsius(&self) -> Result<f64, SensorError> {
        self.celsius.ok_or(SensorError::Unavailable)
    }

    fn id(&self) -> &str {
        "mock"
    }
}
