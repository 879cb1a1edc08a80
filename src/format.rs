//! Reading representations for each sink
//!
//! Spreadsheet rows are positional: the target range addresses columns by
//! position, so cells are always (time, temperature).

use crate::sensor::Reading;
use crate::shared::format_timestamp;
use serde::Serialize;
use serde_json::{json, Value};

/// Reading tagged with the sensor's configured name, as sensor hubs expect it
#[derive(Debug, Serialize)]
pub struct NamedReading<'a> {
    pub sensor_name: &'a str,
    pub reading: &'a Reading,
}

/// Row cells in column order: time, temperature
pub fn to_row(reading: &Reading) -> Vec<Value> {
    vec![
        Value::String(format_timestamp(&reading.time)),
        json!(reading.temperature),
    ]
}

/// `{"time": ..., "temperature": ...}`
pub fn to_json(reading: &Reading) -> Value {
    json!({
        "time": format_timestamp(&reading.time),
        "temperature": reading.temperature,
    })
}

/// `{"sensor_name": ..., "reading": {"time": ..., "temperature": ...}}`
pub fn to_named_json(sensor_name: &str, reading: &Reading) -> Value {
    json!(NamedReading {
        sensor_name,
        reading,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reading(temperature: f64) -> Reading {
        let time = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(14, 30, 15)
            .unwrap();
        Reading::new(time, temperature)
    }

    #[test]
    fn test_row_order() {
        let row = to_row(&reading(19.875));
        assert_eq!(row.len(), 2);
        assert_eq!(row[0], json!("2024-06-01 14:30:15"));
        assert_eq!(row[1], json!(19.875));
    }

    #[test]
    fn test_json_shape() {
        let value = to_json(&reading(20.0));
        assert_eq!(
            value,
            json!({"time": "2024-06-01 14:30:15", "temperature": 20.0})
        );
    }

    #[test]
    fn test_json_parses_back() {
        for temperature in [-55.0, 0.0, 21.437, 125.0] {
            let original = reading(temperature);
            let text = to_json(&original).to_string();
            let parsed: Reading = serde_json::from_str(&text).unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn test_named_json_shape() {
        let value = to_named_json("greenhouse", &reading(18.5));
        assert_eq!(
            value,
            json!({
                "sensor_name": "greenhouse",
                "reading": {"time": "2024-06-01 14:30:15", "temperature": 18.5}
            })
        );
    }
}
