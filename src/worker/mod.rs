//! # Worker Module
//!
//! Background jobs and the scheduler that runs them.
//!
//! This module handles:
//! - The periodic data send job and its manual one-time trigger
//! - The periodic step count refresh job
//! - Mapping send outcomes to success, retry or failure
//! - Linear backoff between retries and the retry cap
//! - Waiting for network connectivity before a send

pub mod data_sender;
pub mod policy;
pub mod scheduler;
pub mod step_counter;

pub use data_sender::{DataSenderWorker, DATA_SENDER_WORK, MANUAL_DATA_SEND_TAG};
pub use policy::{classify_response, handle_error, LinearBackoff, WorkResult};
pub use scheduler::{Job, RetryPolicy, WorkScheduler};
pub use step_counter::{StepCounterWorker, STEP_COUNTER_WORK};
