//! One-wire thermometers via the kernel's w1_therm sysfs interface
//!
//! Each device shows up as `<devices_dir>/<family>-<serial>/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```

use super::{SensorError, TemperatureSensor};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DEVICES_DIR: &str = "/sys/bus/w1/devices";

/// DS18S20, DS1822, DS18B20, DS1825/MAX31850K, DS28EA00
const THERM_FAMILIES: &[&str] = &["10", "22", "28", "3b", "42"];

/// Scratchpad value a DS18B20 holds right after power-on
const RESET_VALUE_MILLIS: i64 = 85_000;

const EMPTY_SCRATCHPAD: &str = "00 00 00 00 00 00 00 00 00";

// === Helper Functions ===

fn is_therm_device(name: &str) -> bool {
    name.split_once('-')
        .map(|(family, _)| THERM_FAMILIES.contains(&family.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn io_error(path: &Path, source: std::io::Error) -> SensorError {
    SensorError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Parse the contents of a `w1_slave` file into degrees Celsius
pub fn parse_w1_slave(raw: &str) -> Result<f64, SensorError> {
    let mut lines = raw.lines();
    let crc_line = lines
        .next()
        .ok_or_else(|| SensorError::Malformed("empty w1_slave".to_string()))?;

    if crc_line.contains(EMPTY_SCRATCHPAD) {
        return Err(SensorError::NotReady);
    }
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::CrcCheckFailed);
    }

    let data_line = lines
        .next()
        .ok_or_else(|| SensorError::Malformed("missing temperature line".to_string()))?;
    let (_, value) = data_line
        .split_once("t=")
        .ok_or_else(|| SensorError::Malformed(format!("no t= in {:?}", data_line)))?;
    let millis: i64 = value
        .trim()
        .parse()
        .map_err(|_| SensorError::Malformed(format!("bad temperature {:?}", value.trim())))?;

    if millis == RESET_VALUE_MILLIS {
        return Err(SensorError::ResetValue);
    }

    Ok(millis as f64 / 1000.0)
}

// === Driver ===

#[derive(Debug, Clone)]
pub struct W1ThermSensor {
    id: String,
    slave_path: PathBuf,
}

impl W1ThermSensor {
    /// Bind to `device_id`, or to the first thermometer on the bus
    pub fn open(devices_dir: &Path, device_id: Option<&str>) -> Result<Self, SensorError> {
        let id = match device_id {
            Some(id) => {
                if !devices_dir.join(id).is_dir() {
                    return Err(SensorError::NotFound(id.to_string()));
                }
                id.to_string()
            }
            None => Self::discover(devices_dir)?
                .into_iter()
                .next()
                .ok_or_else(|| SensorError::NoSensorFound(devices_dir.to_path_buf()))?,
        };

        let slave_path = devices_dir.join(&id).join("w1_slave");
        tracing::info!("Using one-wire sensor {} at {:?}", id, slave_path);
        Ok(Self { id, slave_path })
    }

    /// List thermometer device ids on the bus, sorted
    pub fn discover(devices_dir: &Path) -> Result<Vec<String>, SensorError> {
        let entries = fs::read_dir(devices_dir).map_err(|e| io_error(devices_dir, e))?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_therm_device(name))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl TemperatureSensor for W1ThermSensor {
    fn read_celsius(&self) -> Result<f64, SensorError> {
        let raw = fs::read_to_string(&self.slave_path).map_err(|e| io_error(&self.slave_path, e))?;
        parse_w1_slave(&raw)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n\
                        72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    fn bus_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("w1-bus-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn add_device(dir: &Path, id: &str, contents: &str) {
        fs::create_dir_all(dir.join(id)).unwrap();
        fs::write(dir.join(id).join("w1_slave"), contents).unwrap();
    }

    #[test]
    fn test_parse_good_reading() {
        assert_eq!(parse_w1_slave(GOOD).unwrap(), 23.125);
    }

    #[test]
    fn test_parse_negative_reading() {
        let raw = "5e ff 4b 46 7f ff 02 10 d8 : crc=d8 YES\n5e ff 4b 46 7f ff 02 10 d8 t=-10125\n";
        assert_eq!(parse_w1_slave(raw).unwrap(), -10.125);
    }

    #[test]
    fn test_parse_crc_failure() {
        let raw = "72 01 4b 46 7f ff 0e 10 57 : crc=57 NO\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";
        assert!(matches!(parse_w1_slave(raw), Err(SensorError::CrcCheckFailed)));
    }

    #[test]
    fn test_parse_not_ready() {
        let raw = "00 00 00 00 00 00 00 00 00 : crc=00 YES\n00 00 00 00 00 00 00 00 00 t=0\n";
        assert!(matches!(parse_w1_slave(raw), Err(SensorError::NotReady)));
    }

    #[test]
    fn test_parse_reset_value() {
        let raw = "50 05 4b 46 7f ff 0c 10 1c : crc=1c YES\n50 05 4b 46 7f ff 0c 10 1c t=85000\n";
        assert!(matches!(parse_w1_slave(raw), Err(SensorError::ResetValue)));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_w1_slave(""), Err(SensorError::Malformed(_))));
        assert!(matches!(
            parse_w1_slave("aa : crc=aa YES\n"),
            Err(SensorError::Malformed(_))
        ));
        assert!(matches!(
            parse_w1_slave("aa : crc=aa YES\naa t=warm\n"),
            Err(SensorError::Malformed(_))
        ));
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = bus_dir("discover");
        add_device(&dir, "28-0000075a3c1f", GOOD);
        add_device(&dir, "10-000802b4d6a1", GOOD);
        fs::create_dir_all(dir.join("w1_bus_master1")).unwrap();
        fs::create_dir_all(dir.join("01-00000a1b2c3d")).unwrap();

        let ids = W1ThermSensor::discover(&dir).unwrap();
        assert_eq!(ids, vec!["10-000802b4d6a1", "28-0000075a3c1f"]);
    }

    #[test]
    fn test_open_first_and_read() {
        let dir = bus_dir("first");
        add_device(&dir, "28-0000075a3c1f", GOOD);

        let sensor = W1ThermSensor::open(&dir, None).unwrap();
        assert_eq!(sensor.id(), "28-0000075a3c1f");
        assert_eq!(sensor.read_celsius().unwrap(), 23.125);
    }

    #[test]
    fn test_open_named_device() {
        let dir = bus_dir("named");
        add_device(&dir, "28-0000075a3c1f", GOOD);
        add_device(&dir, "28-0000075a3c20", GOOD);

        let sensor = W1ThermSensor::open(&dir, Some("28-0000075a3c20")).unwrap();
        assert_eq!(sensor.id(), "28-0000075a3c20");
        assert!(matches!(
            W1ThermSensor::open(&dir, Some("28-ffffffffffff")),
            Err(SensorError::NotFound(_))
        ));
    }

    #[test]
    fn test_open_empty_bus() {
        let dir = bus_dir("empty");
        assert!(matches!(
            W1ThermSensor::open(&dir, None),
            Err(SensorError::NoSensorFound(_))
        ));
    }

    #[test]
    fn test_read_after_unplug() {
        let dir = bus_dir("unplug");
        add_device(&dir, "28-0000075a3c1f", GOOD);
        let sensor = W1ThermSensor::open(&dir, None).unwrap();

        fs::remove_dir_all(dir.join("28-0000075a3c1f")).unwrap();
        assert!(matches!(sensor.read_celsius(), Err(SensorError::Io { .. })));
    }
}
