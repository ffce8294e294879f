//! # Step Counter Sensor
//!
//! Cumulative step counter sources.
//!
//! Linux exposes hardware pedometers through the IIO subsystem as an
//! `in_steps_input` attribute holding the total number of steps counted since
//! the sensor was powered up. The value only moves forward until the next
//! reboot, when it restarts from zero.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, TrackerError};

/// Default IIO device directory
pub const IIO_DEVICES_ROOT: &str = "/sys/bus/iio/devices";

/// IIO attribute holding the cumulative step count
pub const STEPS_ATTRIBUTE: &str = "in_steps_input";

/// Trait for cumulative step counter sources
pub trait StepCounterSensor: Send + Sync {
    /// Read the cumulative step count since the counter was last reset
    fn read_cumulative(&self) -> Result<f64>;

    /// Human readable source description for logs
    fn describe(&self) -> String;
}

/// Step counter backed by an IIO `in_steps_input` attribute
#[derive(Debug, Clone)]
pub struct IioStepCounter {
    path: PathBuf,
}

impl IioStepCounter {
    /// Use an explicit attribute file
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Find the first IIO device exposing a step counter under `root`
    ///
    /// Devices are checked in sorted order so the choice is deterministic
    /// when several pedometers are present.
    ///
    /// # Errors
    ///
    /// Returns `SensorNotFound` if no device under `root` has a step counter.
    pub fn detect<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        let mut entries: Vec<PathBuf> = match fs::read_dir(root) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .collect(),
            Err(e) => {
                debug!("Cannot read {}: {}", root.display(), e);
                return Err(TrackerError::SensorNotFound(root.display().to_string()));
            }
        };
        entries.sort();

        for device in entries {
            let candidate = device.join(STEPS_ATTRIBUTE);
            if candidate.is_file() {
                info!("Found step counter at: {}", candidate.display());
                return Ok(Self::new(candidate));
            }
        }

        Err(TrackerError::SensorNotFound(root.display().to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StepCounterSensor for IioStepCounter {
    fn read_cumulative(&self) -> Result<f64> {
        let raw = fs::read_to_string(&self.path)?;
        let value: f64 = raw.trim().parse().map_err(|_| {
            TrackerError::Sensor(format!(
                "invalid step count '{}' in {}",
                raw.trim(),
                self.path.display()
            ))
        })?;

        if !value.is_finite() || value < 0.0 {
            return Err(TrackerError::Sensor(format!(
                "step count out of range: {}",
                value
            )));
        }

        Ok(value)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Step counter that replays a scripted list of readings.
    ///
    /// Once the script is exhausted the last reading is repeated.
    #[derive(Clone, Default)]
    pub struct ScriptedStepCounter {
        pub readings: Arc<Mutex<VecDeque<Result<f64>>>>,
        pub last: Arc<Mutex<Option<f64>>>,
        pub reads: Arc<Mutex<usize>>,
    }

    impl ScriptedStepCounter {
        pub fn new(readings: &[f64]) -> Self {
            let mock = Self::default();
            for &r in readings {
                mock.push(Ok(r));
            }
            mock
        }

        pub fn push(&self, reading: Result<f64>) {
            self.readings.lock().unwrap().push_back(reading);
        }

        pub fn read_count(&self) -> usize {
            *self.reads.lock().unwrap()
        }
    }

    impl StepCounterSensor for ScriptedStepCounter {
        fn read_cumulative(&self) -> Result<f64> {
            *self.reads.lock().unwrap() += 1;
            let next = self.readings.lock().unwrap().pop_front();
            match next {
                Some(Ok(value)) => {
                    *self.last.lock().unwrap() = Some(value);
                    Ok(value)
                }
                Some(Err(e)) => Err(e),
                None => {
                    let last = *self.last.lock().unwrap();
                    last.ok_or_else(|| TrackerError::Sensor("no reading scripted".to_string()))
                }
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }
}
