//! # Work Scheduler
//!
//! Runs jobs on periodic triggers or once on demand.
//!
//! Every run of a job goes through the same path:
//!
//! 1. Take the job's named lock, so one job never runs twice at the same time
//! 2. Wait for network connectivity if the job needs it
//! 3. Run the job with the current attempt number
//! 4. On `Retry`, sleep for the linear backoff and go back to 2
//!
//! A job that still asks for a retry after `max_retry_attempts` retries is
//! reported as a terminal failure.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::network::connectivity::{is_network_connected, NET_CLASS_ROOT};
use crate::worker::policy::{LinearBackoff, WorkResult};

/// A unit of background work
#[async_trait]
pub trait Job: Send + Sync {
    /// Unique name; runs of jobs sharing a name are serialized
    fn name(&self) -> &str;

    /// Whether the job must wait for network connectivity
    fn requires_network(&self) -> bool {
        false
    }

    /// Run once. `run_attempt_count` is 0 for the first run of a trigger.
    async fn run(&self, run_attempt_count: u32) -> WorkResult;
}

/// Connectivity predicate
pub type ConnectivityCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Retry, backoff and constraint settings
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: LinearBackoff,
    pub max_retry_attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self {
            backoff: LinearBackoff::new(config.backoff_delay()),
            max_retry_attempts: config.max_retry_attempts,
        }
    }
}

/// Job scheduler
pub struct WorkScheduler {
    policy: RetryPolicy,
    connectivity: ConnectivityCheck,
    connectivity_poll: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkScheduler {
    pub fn new(policy: RetryPolicy, connectivity_poll: Duration) -> Self {
        Self {
            policy,
            connectivity: Arc::new(|| is_network_connected(NET_CLASS_ROOT)),
            connectivity_poll,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(RetryPolicy::from_config(config), config.connectivity_poll())
    }

    /// Replace the connectivity predicate
    #[must_use]
    pub fn with_connectivity_check(mut self, check: ConnectivityCheck) -> Self {
        self.connectivity = check;
        self
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn wait_for_network(&self, name: &str) {
        let mut logged = false;
        while !(self.connectivity)() {
            if !logged {
                info!("{} waiting for network connectivity", name);
                logged = true;
            }
            sleep(self.connectivity_poll).await;
        }
    }

    /// Run `job` to completion, retrying with backoff
    pub async fn run_once(&self, job: &dyn Job) -> WorkResult {
        let lock = self.lock_for(job.name());
        let _guard = lock.lock().await;

        let mut attempt: u32 = 0;
        loop {
            if job.requires_network() {
                self.wait_for_network(job.name()).await;
            }

            debug!("Running {} (attempt {})", job.name(), attempt);
            match job.run(attempt).await {
                WorkResult::Success => {
                    info!("{} succeeded (attempt {})", job.name(), attempt);
                    return WorkResult::Success;
                }
                WorkResult::Failure => {
                    error!("{} failed (attempt {})", job.name(), attempt);
                    return WorkResult::Failure;
                }
                WorkResult::Retry if attempt >= self.policy.max_retry_attempts => {
                    error!(
                        "{} giving up after {} retries",
                        job.name(),
                        self.policy.max_retry_attempts
                    );
                    return WorkResult::Failure;
                }
                WorkResult::Retry => {
                    attempt += 1;
                    let delay = self.policy.backoff.delay_for(attempt);
                    warn!("{} will retry in {:?} (attempt {})", job.name(), delay, attempt);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Run `job` now and again every `period`. The first run starts immediately.
    ///
    /// A run that outlasts its period delays the next one rather than overlapping it.
    pub fn spawn_periodic(self: &Arc<Self>, job: Arc<dyn Job>, period: Duration) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        info!("Scheduling {} every {:?}", job.name(), period);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                scheduler.run_once(job.as_ref()).await;
            }
        })
    }

    /// Run `job` once in the background
    pub fn spawn_one_time(self: &Arc<Self>, job: Arc<dyn Job>, tag: &str) -> JoinHandle<WorkResult> {
        let scheduler = Arc::clone(self);
        info!("Enqueued one-time {} ({})", job.name(), tag);

        tokio::spawn(async move { scheduler.run_once(job.as_ref()).await })
    }
}
