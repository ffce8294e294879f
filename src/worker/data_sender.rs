//! Data send job: refresh the step count, collect a record and POST it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::network::api::TrackerApi;
use crate::steps::StepSensorManager;
use crate::telemetry::collector::TrackerDataCollector;
use crate::worker::policy::{classify_response, handle_error, WorkResult};
use crate::worker::scheduler::Job;

/// Name of the periodic data send job
pub const DATA_SENDER_WORK: &str = "DataSenderWork";

/// Tag logged for manually triggered sends
pub const MANUAL_DATA_SEND_TAG: &str = "manual_data_send";

/// Collects and sends one telemetry record per run
pub struct DataSenderWorker {
    collector: TrackerDataCollector,
    api: Box<dyn TrackerApi>,
    steps: Arc<Mutex<StepSensorManager>>,
    warmup: Duration,
    max_retry_attempts: u32,
}

impl DataSenderWorker {
    pub fn new(
        collector: TrackerDataCollector,
        api: Box<dyn TrackerApi>,
        steps: Arc<Mutex<StepSensorManager>>,
        warmup: Duration,
        max_retry_attempts: u32,
    ) -> Self {
        Self {
            collector,
            api,
            steps,
            warmup,
            max_retry_attempts,
        }
    }

    /// Run once and map every outcome to a retry-or-fail decision
    pub async fn do_work(&self, run_attempt_count: u32) -> WorkResult {
        match self.send(run_attempt_count).await {
            Ok(result) => result,
            Err(e) => {
                error!("Error in data send: {}", e);
                handle_error(run_attempt_count, self.max_retry_attempts)
            }
        }
    }

    async fn send(&self, run_attempt_count: u32) -> Result<WorkResult> {
        // Give the step counter a chance to deliver before the count is read
        self.steps.lock().await.warm_up(self.warmup).await;

        let data = self.collector.collect_data().await?;
        info!(
            "Sending data - Battery: {}, Location: ({}, {}), Steps: {}",
            data.power, data.latitude, data.longitude, data.steps
        );

        let status = self.api.send_data(&data).await?;
        let result = classify_response(status, run_attempt_count, self.max_retry_attempts);
        match result {
            WorkResult::Success => info!("Data sent successfully"),
            WorkResult::Retry if (500..=599).contains(&status) => {
                warn!("Server error, will retry. Response code: {}", status)
            }
            _ => warn!("Failed to send data, response code: {}", status),
        }

        Ok(result)
    }
}

#[async_trait]
impl Job for DataSenderWorker {
    fn name(&self) -> &str {
        DATA_SENDER_WORK
    }

    fn requires_network(&self) -> bool {
        true
    }

    async fn run(&self, run_attempt_count: u32) -> WorkResult {
        self.do_work(run_attempt_count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::TrackerError;
    use crate::network::api::MockTrackerApi;
    use crate::steps::sensor::mocks::ScriptedStepCounter;
    use crate::steps::sensor::StepCounterSensor;
    use crate::steps::storage::StepDataStorage;
    use crate::store::KeyValueStore;
    use crate::telemetry::battery::BatterySource;
    use crate::telemetry::location::MockLocationProvider;
    use crate::telemetry::types::Location;
    use tempfile::TempDir;

    struct FixedBattery(Option<f32>);

    impl BatterySource for FixedBattery {
        fn capacity(&self) -> Result<f32> {
            self.0
                .ok_or_else(|| TrackerError::Sensor("battery unavailable".to_string()))
        }
    }

    struct Fixture {
        dir: TempDir,
        storage: StepDataStorage,
        steps: Arc<Mutex<StepSensorManager>>,
    }

    impl Fixture {
        fn new(sensor: Option<ScriptedStepCounter>) -> Self {
            let dir = TempDir::new().unwrap();
            let storage = StepDataStorage::new(KeyValueStore::open(dir.path().join("steps.json")));
            let sensor = sensor.map(|s| Arc::new(s) as Arc<dyn StepCounterSensor>);
            let manager = StepSensorManager::new(sensor, storage.clone(), Duration::from_secs(5));
            Self {
                dir,
                storage,
                steps: Arc::new(Mutex::new(manager)),
            }
        }

        fn worker(
            &self,
            battery: Option<f32>,
            location: Option<Location>,
            api: MockTrackerApi,
        ) -> DataSenderWorker {
            let mut provider = MockLocationProvider::new();
            provider
                .expect_last_location()
                .returning(move || Ok(location));

            let collector = TrackerDataCollector::new(
                Box::new(FixedBattery(battery)),
                Box::new(provider),
                self.storage.clone(),
            );

            DataSenderWorker::new(
                collector,
                Box::new(api),
                self.steps.clone(),
                Duration::from_secs(19),
                3,
            )
        }
    }

    fn api_returning(status: u16) -> MockTrackerApi {
        let mut api = MockTrackerApi::new();
        api.expect_send_data().returning(move |_| Ok(status));
        api
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_sends_warmed_up_step_count() {
        let fixture = Fixture::new(Some(ScriptedStepCounter::new(&[500.0, 640.0])));

        let mut api = MockTrackerApi::new();
        api.expect_send_data()
            .withf(|data| {
                data.power == 81.0
                    && data.latitude == 47.37
                    && data.longitude == 8.54
                    && data.steps == 140
            })
            .times(1)
            .returning(|_| Ok(200));

        let worker = fixture.worker(Some(81.0), Some(Location::new(47.37, 8.54)), api);
        assert_eq!(worker.do_work(0).await, WorkResult::Success);
    }

    #[tokio::test]
    async fn test_missing_location_still_sends_placeholders() {
        let fixture = Fixture::new(None);

        let mut api = MockTrackerApi::new();
        api.expect_send_data()
            .withf(|data| {
                data.power == 33.0
                    && data.latitude == 0.0
                    && data.longitude == 0.0
                    && data.steps == 0
            })
            .times(1)
            .returning(|_| Ok(200));

        let worker = fixture.worker(Some(33.0), None, api);
        assert_eq!(worker.do_work(0).await, WorkResult::Success);
    }

    #[tokio::test]
    async fn test_server_error_retries() {
        let fixture = Fixture::new(None);
        let worker = fixture.worker(Some(50.0), None, api_returning(503));

        assert_eq!(worker.do_work(0).await, WorkResult::Retry);
        assert_eq!(worker.do_work(3).await, WorkResult::Retry);
    }

    #[tokio::test]
    async fn test_not_found_retries_until_cap() {
        let fixture = Fixture::new(None);
        let worker = fixture.worker(Some(50.0), None, api_returning(404));

        assert_eq!(worker.do_work(0).await, WorkResult::Retry);
        assert_eq!(worker.do_work(2).await, WorkResult::Retry);
        assert_eq!(worker.do_work(3).await, WorkResult::Failure);
    }

    #[tokio::test]
    async fn test_transport_error_uses_retry_cap() {
        let fixture = Fixture::new(None);
        let mut api = MockTrackerApi::new();
        api.expect_send_data()
            .returning(|_| Err(TrackerError::Location("unreachable".to_string())));
        let worker = fixture.worker(Some(50.0), None, api);

        assert_eq!(worker.do_work(1).await, WorkResult::Retry);
        assert_eq!(worker.do_work(3).await, WorkResult::Failure);
    }

    #[tokio::test]
    async fn test_battery_failure_skips_send() {
        let fixture = Fixture::new(None);
        let mut api = MockTrackerApi::new();
        api.expect_send_data().never();
        let worker = fixture.worker(None, None, api);

        assert_eq!(worker.do_work(0).await, WorkResult::Retry);
        assert_eq!(worker.do_work(3).await, WorkResult::Failure);
    }

    #[tokio::test]
    async fn test_missing_battery_at_startup_retries_then_fails() {
        let fixture = Fixture::new(None);
        let power_supply = TempDir::new().unwrap();
        let mut config = Config::default();
        config.location.provider = "disabled".to_string();
        config.storage.state_path = fixture.dir.path().join("steps.json").display().to_string();

        let collector = TrackerDataCollector::from_config_at(&config, power_supply.path());
        let mut api = MockTrackerApi::new();
        api.expect_send_data().never();
        let worker = DataSenderWorker::new(
            collector,
            Box::new(api),
            fixture.steps.clone(),
            Duration::from_secs(19),
            3,
        );

        assert_eq!(worker.do_work(0).await, WorkResult::Retry);
        assert_eq!(worker.do_work(2).await, WorkResult::Retry);
        assert_eq!(worker.do_work(3).await, WorkResult::Failure);
    }

    #[test]
    fn test_job_metadata() {
        let fixture = Fixture::new(None);
        let worker = fixture.worker(Some(1.0), None, MockTrackerApi::new());
        assert_eq!(worker.name(), "DataSenderWork");
        assert!(worker.requires_network());
    }
}
