//! # Data Collector
//!
//! Aggregates battery capacity, last-known location and today's step count
//! into one [`TrackerData`] record.
//!
//! Collection is best-effort: a missing or failing location or step source
//! yields the `(0.0, 0.0)` / `0` placeholders instead of failing the whole
//! record. Battery capacity is required, but a missing battery only fails
//! the individual collection.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::steps::current_day;
use crate::steps::storage::StepDataStorage;
use crate::store::KeyValueStore;
use crate::telemetry::battery::{battery_from_config, BatterySource, POWER_SUPPLY_ROOT};
use crate::telemetry::location::{provider_from_config, LocationProvider};
use crate::telemetry::types::{Location, TrackerData};

/// Collects one telemetry record per call
pub struct TrackerDataCollector {
    battery: Box<dyn BatterySource>,
    location: Box<dyn LocationProvider>,
    steps: StepDataStorage,
    location_permission_warned: AtomicBool,
    steps_permission_warned: AtomicBool,
}

impl TrackerDataCollector {
    pub fn new(
        battery: Box<dyn BatterySource>,
        location: Box<dyn LocationProvider>,
        steps: StepDataStorage,
    ) -> Self {
        Self {
            battery,
            location,
            steps,
            location_permission_warned: AtomicBool::new(false),
            steps_permission_warned: AtomicBool::new(false),
        }
    }

    /// Build from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_at(config, POWER_SUPPLY_ROOT)
    }

    /// Build from configuration, auto-detecting the battery under `power_supply_root`.
    ///
    /// A missing battery does not fail construction; each `collect_data` call
    /// reports it instead.
    pub fn from_config_at<P: AsRef<Path>>(config: &Config, power_supply_root: P) -> Self {
        Self::new(
            battery_from_config(&config.sensors, power_supply_root),
            provider_from_config(&config.location),
            StepDataStorage::new(KeyValueStore::open(&config.storage.state_path)),
        )
    }

    /// Collect battery, location and step count
    ///
    /// # Errors
    ///
    /// Only a battery read failure is returned; location and step failures
    /// fall back to placeholders.
    pub async fn collect_data(&self) -> Result<TrackerData> {
        let power = self.battery.capacity()?;
        let location = self.location().await;
        let steps = self.step_count();

        let data = TrackerData::new(power, location, steps);
        debug!("Collected data: {:?}", data);
        Ok(data)
    }

    async fn location(&self) -> Location {
        match self.location.last_location().await {
            Ok(Some(location)) => location,
            Ok(None) => {
                debug!("No location fix available, using placeholder");
                Location::UNKNOWN
            }
            Err(e) => {
                self.report_failure("location", &e, &self.location_permission_warned);
                Location::UNKNOWN
            }
        }
    }

    /// Today's count. A count saved on an earlier day reads as 0.
    fn step_count(&self) -> u32 {
        match self.steps.today_step_count(&current_day()) {
            Ok(steps) => steps,
            Err(e) => {
                self.report_failure("step count", &e, &self.steps_permission_warned);
                0
            }
        }
    }

    fn report_failure(&self, source: &str, error: &TrackerError, warned: &AtomicBool) {
        if error.is_permission_denied() {
            if !warned.swap(true, Ordering::Relaxed) {
                warn!("Permission denied reading {}, sending placeholder values", source);
            }
        } else {
            warn!("Failed to read {}: {}", source, error);
        }
    }
}
