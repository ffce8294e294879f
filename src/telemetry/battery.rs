//! # Battery Module
//!
//! Reads the remaining battery capacity from the Linux power supply class.
//!
//! Every power supply appears as a directory under `/sys/class/power_supply`
//! with a `type` attribute (`Battery`, `Mains`, `USB`, ...). Batteries also
//! expose `capacity`, the remaining charge in percent.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::SensorsConfig;
use crate::error::{Result, TrackerError};

/// Default power supply class directory
pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Trait for battery capacity sources
pub trait BatterySource: Send + Sync {
    /// Remaining capacity in percent (0-100)
    fn capacity(&self) -> Result<f32>;
}

/// Battery backed by a power supply directory
#[derive(Debug, Clone)]
pub struct SysfsBattery {
    dir: PathBuf,
}

impl SysfsBattery {
    /// Use an explicit power supply directory (e.g. `/sys/class/power_supply/BAT0`)
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Find the first supply of type `Battery` under `root`, in sorted order
    ///
    /// # Errors
    ///
    /// Returns `SensorNotFound` if `root` holds no battery.
    pub fn detect<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        let mut entries: Vec<PathBuf> = fs::read_dir(root)
            .map_err(|e| {
                debug!("Cannot read {}: {}", root.display(), e);
                TrackerError::SensorNotFound(root.display().to_string())
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for supply in entries {
            let kind = fs::read_to_string(supply.join("type")).unwrap_or_default();
            if kind.trim() == "Battery" {
                info!("Found battery at: {}", supply.display());
                return Ok(Self::new(supply));
            }
        }

        Err(TrackerError::SensorNotFound(format!(
            "no battery under {}",
            root.display()
        )))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BatterySource for SysfsBattery {
    fn capacity(&self) -> Result<f32> {
        let path = self.dir.join("capacity");
        let raw = fs::read_to_string(&path)?;
        let value: f32 = raw.trim().parse().map_err(|_| {
            TrackerError::Sensor(format!(
                "invalid battery capacity '{}' in {}",
                raw.trim(),
                path.display()
            ))
        })?;

        Ok(value.clamp(0.0, 100.0))
    }
}

/// Stand-in used when no battery could be found at startup.
///
/// Every read fails with the detection error, so each send maps it to a
/// retry-or-fail decision instead of the agent refusing to start.
#[derive(Debug, Clone)]
pub struct UnavailableBattery {
    reason: String,
}

impl UnavailableBattery {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl BatterySource for UnavailableBattery {
    fn capacity(&self) -> Result<f32> {
        Err(TrackerError::SensorNotFound(self.reason.clone()))
    }
}

/// Build the battery source from `[sensors] battery_path`, auto-detecting under `root` when empty
pub fn battery_from_config<P: AsRef<Path>>(
    config: &SensorsConfig,
    root: P,
) -> Box<dyn BatterySource> {
    if !config.battery_path.is_empty() {
        return Box::new(SysfsBattery::new(&config.battery_path));
    }

    match SysfsBattery::detect(root) {
        Ok(battery) => Box::new(battery),
        Err(e) => {
            warn!("No battery detected, data sends will fail: {}", e);
            let reason = match e {
                TrackerError::SensorNotFound(reason) => reason,
                other => other.to_string(),
            };
            Box::new(UnavailableBattery::new(reason))
        }
    }
}
