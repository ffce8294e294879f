//! Step refresh job: listen to the step counter for a while so the persisted
//! count stays current between data sends.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::steps::StepSensorManager;
use crate::worker::policy::WorkResult;
use crate::worker::scheduler::Job;

/// Name of the periodic step refresh job
pub const STEP_COUNTER_WORK: &str = "StepCounterWork";

pub struct StepCounterWorker {
    steps: Arc<Mutex<StepSensorManager>>,
    warmup: Duration,
}

impl StepCounterWorker {
    pub fn new(steps: Arc<Mutex<StepSensorManager>>, warmup: Duration) -> Self {
        Self { steps, warmup }
    }

    /// Always succeeds: a missing or failing sensor only leaves the count unchanged
    pub async fn do_work(&self) -> WorkResult {
        self.steps.lock().await.warm_up(self.warmup).await;
        WorkResult::Success
    }
}

#[async_trait]
impl Job for StepCounterWorker {
    fn name(&self) -> &str {
        STEP_COUNTER_WORK
    }

    async fn run(&self, _run_attempt_count: u32) -> WorkResult {
        self.do_work().await
    }
}
