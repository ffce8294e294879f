//! # d-tracker Library
//!
//! Periodically report battery level, location and today's step count to a
//! tracking server.
//!
//! This library provides the building blocks of the `d-tracker` agent: the
//! daily step baseline tracker, the telemetry collector, the HTTP client and
//! the job scheduler with its retry policy.

pub mod config;
pub mod error;
pub mod network;
pub mod steps;
pub mod store;
pub mod telemetry;
pub mod worker;
