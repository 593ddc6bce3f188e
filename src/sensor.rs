use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unexpected pin level {0:?}")]
    InvalidLevel(String),
}

/// A presence source. `is_present` is expected to be already debounced.
pub trait PresenceSensor {
    fn init(&mut self) -> Result<(), SensorError>;

    /// Refreshes the reading returned by `is_present`.
    fn poll(&mut self) -> Result<(), SensorError>;

    fn is_present(&self) -> bool;
}

/// Alternates between absent and present every `toggle` interval, starting absent.
#[derive(Debug)]
pub struct SimulatedSensor {
    toggle: Duration,
    started: Instant,
    present: bool,
}

impl SimulatedSensor {
    pub fn new(toggle: Duration) -> Self {
        SimulatedSensor {
            toggle,
            started: Instant::now(),
            present: false,
        }
    }

    fn poll_at(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.started);
        let phase = elapsed.as_millis() / self.toggle.as_millis().max(1);
        self.present = phase % 2 == 1;
    }
}

impl PresenceSensor for SimulatedSensor {
    fn init(&mut self) -> Result<(), SensorError> {
        info!(
            "Simulating occupancy, toggling every {}s",
            self.toggle.as_secs_f32()
        );
        self.started = Instant::now();
        self.present = false;
        Ok(())
    }

    fn poll(&mut self) -> Result<(), SensorError> {
        self.poll_at(Instant::now());
        Ok(())
    }

    fn is_present(&self) -> bool {
        self.present
    }
}

/// Reads the radar's digital presence output through a GPIO value file.
#[derive(Debug)]
pub struct GpioSensor {
    path: PathBuf,
    active_low: bool,
    present: bool,
}

impl GpioSensor {
    pub fn new(path: PathBuf, active_low: bool) -> Self {
        GpioSensor {
            path,
            active_low,
            present: false,
        }
    }

    fn read_level(&self) -> Result<bool, SensorError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| SensorError::Read {
            path: self.path.clone(),
            source,
        })?;
        parse_level(&contents)
    }
}

fn parse_level(contents: &str) -> Result<bool, SensorError> {
    match contents.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(SensorError::InvalidLevel(other.to_string())),
    }
}

impl PresenceSensor for GpioSensor {
    fn init(&mut self) -> Result<(), SensorError> {
        info!("Reading presence pin from {}", self.path.display());
        let level = self.read_level()?;
        debug!("Initial pin level: {}", level);
        Ok(())
    }

    fn poll(&mut self) -> Result<(), SensorError> {
        let level = self.read_level()?;
        self.present = level != self.active_low;
        Ok(())
    }

    fn is_present(&self) -> bool {
        self.present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_simulated_sensor_phases() {
        let mut sensor = SimulatedSensor::new(Duration::from_secs(5));
        let start = sensor.started;

        sensor.poll_at(start + Duration::from_secs(1));
        assert!(!sensor.is_present());
        sensor.poll_at(start + Duration::from_secs(5));
        assert!(sensor.is_present());
        sensor.poll_at(start + Duration::from_millis(9_999));
        assert!(sensor.is_present());
        sensor.poll_at(start + Duration::from_secs(10));
        assert!(!sensor.is_present());
    }

    #[test]
    fn test_parse_level() {
        assert!(parse_level("1\n").unwrap());
        assert!(!parse_level(" 0 ").unwrap());
        assert!(matches!(
            parse_level("high"),
            Err(SensorError::InvalidLevel(level)) if level == "high"
        ));
    }

    #[test]
    fn test_gpio_sensor_reads_pin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1").unwrap();

        let mut sensor = GpioSensor::new(file.path().to_path_buf(), false);
        sensor.init().unwrap();
        assert!(!sensor.is_present());
        sensor.poll().unwrap();
        assert!(sensor.is_present());

        let mut inverted = GpioSensor::new(file.path().to_path_buf(), true);
        inverted.poll().unwrap();
        assert!(!inverted.is_present());
    }

    #[test]
    fn test_gpio_sensor_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sensor = GpioSensor::new(dir.path().join("value"), false);
        assert!(matches!(sensor.init(), Err(SensorError::Read { .. })));
    }
}
