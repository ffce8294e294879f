//! # Steps Module
//!
//! Daily step counting on top of a cumulative step counter.
//!
//! This module handles:
//! - Polling the cumulative counter once per sampling period
//! - Delivering changed readings to the baseline tracker over a channel
//! - Resetting the baseline on day rollover and after a reboot
//! - Persisting the latest "steps today" value for later collection

pub mod baseline;
pub mod sensor;
pub mod storage;

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::store::KeyValueStore;
use baseline::DATE_FORMAT;
use sensor::{IioStepCounter, StepCounterSensor, IIO_DEVICES_ROOT};
use storage::StepDataStorage;

/// Readings buffered between the poller and the baseline tracker
const READING_CHANNEL_CAPACITY: usize = 16;

/// Today's calendar day in the device-local timezone
pub fn current_day() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

/// Apply a reading taken on `today` to the persisted state and return today's count
pub fn record_reading(storage: &StepDataStorage, reading: f64, today: &str) -> Result<u32> {
    let previous = storage.load_state()?;
    let next = previous.apply_reading(reading, today);

    if next.baseline_changed(&previous) {
        info!(
            "Step baseline reset to {} for {} (previous {} on {:?})",
            next.baseline, today, previous.baseline, previous.baseline_date
        );
    }

    storage.save_state(&next)?;
    debug!("Steps today: {} (reading {})", next.latest_step_count, reading);
    Ok(next.latest_step_count)
}

/// Poll `sensor` every `period` and forward readings that differ from the previous one.
///
/// Returns when the receiving side is dropped.
async fn poll_sensor(
    sensor: Arc<dyn StepCounterSensor>,
    period: Duration,
    tx: mpsc::Sender<f64>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<f64> = None;

    loop {
        ticker.tick().await;

        match sensor.read_cumulative() {
            Ok(reading) => {
                if last == Some(reading) {
                    continue;
                }
                last = Some(reading);
                if tx.send(reading).await.is_err() {
                    break;
                }
            }
            Err(e) => debug!("Step counter read failed ({}): {}", sensor.describe(), e),
        }
    }
}

struct Listener {
    poller: JoinHandle<()>,
    handler: JoinHandle<()>,
}

/// Step sensor manager
///
/// Owns the optional step counter and the persisted baseline state.
pub struct StepSensorManager {
    sensor: Option<Arc<dyn StepCounterSensor>>,
    storage: StepDataStorage,
    sampling_period: Duration,
    listener: Option<Listener>,
}

impl std::fmt::Debug for StepSensorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepSensorManager")
            .field("sensor", &self.sensor.as_ref().map(|s| s.describe()))
            .field("sampling_period", &self.sampling_period)
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

impl StepSensorManager {
    pub fn new(
        sensor: Option<Arc<dyn StepCounterSensor>>,
        storage: StepDataStorage,
        sampling_period: Duration,
    ) -> Self {
        Self {
            sensor,
            storage,
            sampling_period,
            listener: None,
        }
    }

    /// Build from configuration, auto-detecting the step counter when no path is set
    pub fn from_config(config: &Config) -> Self {
        let sensor = if config.sensors.step_counter_path.is_empty() {
            match IioStepCounter::detect(IIO_DEVICES_ROOT) {
                Ok(sensor) => Some(Arc::new(sensor) as Arc<dyn StepCounterSensor>),
                Err(e) => {
                    info!("No step counter detected: {}", e);
                    None
                }
            }
        } else {
            let sensor = IioStepCounter::new(&config.sensors.step_counter_path);
            Some(Arc::new(sensor) as Arc<dyn StepCounterSensor>)
        };

        let storage = StepDataStorage::new(KeyValueStore::open(&config.storage.state_path));
        Self::new(sensor, storage, config.sensors.sampling_period())
    }

    pub fn has_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    pub fn storage(&self) -> &StepDataStorage {
        &self.storage
    }

    /// Start delivering readings to the baseline tracker.
    ///
    /// Without a sensor this only logs a warning; the persisted count stays as is.
    pub fn start_listening(&mut self) {
        if self.listener.is_some() {
            return;
        }

        let Some(sensor) = self.sensor.clone() else {
            warn!("No step sensor available on this device");
            return;
        };

        debug!(
            "Listening to step counter {} every {:?}",
            sensor.describe(),
            self.sampling_period
        );

        let (tx, mut rx) = mpsc::channel(READING_CHANNEL_CAPACITY);
        let poller = tokio::spawn(poll_sensor(sensor, self.sampling_period, tx));

        let storage = self.storage.clone();
        let handler = tokio::spawn(async move {
            while let Some(reading) = rx.recv().await {
                // Store commits are blocking file writes
                let storage = storage.clone();
                let recorded = task::spawn_blocking(move || {
                    record_reading(&storage, reading, &current_day())
                })
                .await;

                match recorded {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("Failed to record step reading: {}", e),
                    Err(e) => warn!("Step recording task failed: {}", e),
                }
            }
        });

        self.listener = Some(Listener { poller, handler });
    }

    /// Stop polling and wait until already delivered readings are recorded
    pub async fn stop_listening(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.poller.abort();
            // The handler exits once the aborted poller drops its sender
            let _ = listener.handler.await;
            debug!("Stopped listening to step counter");
        }
    }

    /// Apply a single reading taken now
    pub fn on_sensor_changed(&self, reading: f64) -> Result<u32> {
        record_reading(&self.storage, reading, &current_day())
    }

    /// Last persisted count for today. Best-effort: not refreshed by this call.
    ///
    /// A count persisted on an earlier day reads as 0.
    pub fn latest_step_count(&self) -> Result<u32> {
        self.storage.today_step_count(&current_day())
    }

    /// Listen for `duration` so the persisted count catches up with the counter
    pub async fn warm_up(&mut self, duration: Duration) {
        if !self.has_sensor() {
            return;
        }

        self.start_listening();
        sleep(duration).await;
        self.stop_listening().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::sensor::mocks::ScriptedStepCounter;
    use tempfile::TempDir;

    fn manager_with(sensor: Option<ScriptedStepCounter>) -> (TempDir, StepSensorManager) {
        let dir = TempDir::new().unwrap();
        let storage = StepDataStorage::new(KeyValueStore::open(dir.path().join("steps.json")));
        let sensor = sensor.map(|s| Arc::new(s) as Arc<dyn StepCounterSensor>);
        let manager = StepSensorManager::new(sensor, storage, Duration::from_secs(5));
        (dir, manager)
    }

    #[test]
    fn test_record_reading_persists_state() {
        let (_dir, manager) = manager_with(None);
        let storage = manager.storage();

        assert_eq!(record_reading(storage, 900.0, "2024-05-01").unwrap(), 0);
        assert_eq!(record_reading(storage, 960.0, "2024-05-01").unwrap(), 60);
        assert_eq!(record_reading(storage, 975.0, "2024-05-02").unwrap(), 0);

        let state = storage.load_state().unwrap();
        assert_eq!(state.baseline, 975.0);
        assert_eq!(state.baseline_date.as_deref(), Some("2024-05-02"));
        assert_eq!(state.latest_step_count, 0);
    }

    #[test]
    fn test_record_reading_after_reboot() {
        let (_dir, manager) = manager_with(None);
        let storage = manager.storage();

        record_reading(storage, 5000.0, "2024-05-01").unwrap();
        assert_eq!(record_reading(storage, 5400.0, "2024-05-01").unwrap(), 400);
        assert_eq!(record_reading(storage, 3.0, "2024-05-01").unwrap(), 0);
        assert_eq!(record_reading(storage, 30.0, "2024-05-01").unwrap(), 27);
    }

    #[test]
    fn test_on_sensor_changed_uses_today() {
        let (_dir, manager) = manager_with(None);
        manager.on_sensor_changed(42.0).unwrap();

        let state = manager.storage().load_state().unwrap();
        assert_eq!(state.baseline_date, Some(current_day()));
        assert_eq!(manager.latest_step_count().unwrap(), 0);
    }

    #[test]
    fn test_latest_step_count_defaults_to_zero() {
        let (_dir, manager) = manager_with(None);
        assert_eq!(manager.latest_step_count().unwrap(), 0);
    }

    #[test]
    fn test_latest_step_count_from_earlier_day_is_zero() {
        let (_dir, manager) = manager_with(None);
        record_reading(manager.storage(), 1000.0, "2000-01-01").unwrap();
        record_reading(manager.storage(), 9000.0, "2000-01-01").unwrap();

        assert_eq!(manager.storage().latest_step_count().unwrap(), 8000);
        assert_eq!(manager.latest_step_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_start_listening_without_sensor_is_noop() {
        let (_dir, mut manager) = manager_with(None);
        assert!(!manager.has_sensor());

        manager.start_listening();
        assert!(!manager.is_listening());

        manager.warm_up(Duration::from_secs(1)).await;
        assert_eq!(manager.latest_step_count().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_up_records_readings() {
        let sensor = ScriptedStepCounter::new(&[100.0, 100.0, 150.0, 170.0]);
        let (_dir, mut manager) = manager_with(Some(sensor.clone()));

        manager.warm_up(Duration::from_secs(20)).await;

        assert!(!manager.is_listening());
        assert!(sensor.read_count() >= 4);
        assert_eq!(manager.latest_step_count().unwrap(), 70);
        assert_eq!(manager.storage().baseline().unwrap(), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_are_skipped() {
        let sensor = ScriptedStepCounter::default();
        sensor.push(Ok(10.0));
        sensor.push(Err(crate::error::TrackerError::Sensor("glitch".to_string())));
        sensor.push(Ok(25.0));
        let (_dir, mut manager) = manager_with(Some(sensor));

        manager.warm_up(Duration::from_secs(16)).await;

        assert_eq!(manager.latest_step_count().unwrap(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_restart_listening() {
        let sensor = ScriptedStepCounter::new(&[10.0]);
        let (_dir, mut manager) = manager_with(Some(sensor.clone()));

        manager.start_listening();
        assert!(manager.is_listening());
        tokio::time::sleep(Duration::from_secs(1)).await;
        manager.stop_listening().await;
        assert!(!manager.is_listening());

        sensor.push(Ok(35.0));
        manager.warm_up(Duration::from_secs(6)).await;
        assert_eq!(manager.latest_step_count().unwrap(), 25);
    }
}
