//! # Telemetry Module
//!
//! Builds the telemetry record sent to the tracking server.
//!
//! This module handles:
//! - Reading battery capacity from the power supply class
//! - Reading the last-known location from gpsd or configuration
//! - Reading today's persisted step count
//! - Aggregating all three into a `TrackerData` record

pub mod battery;
pub mod collector;
pub mod location;
pub mod types;

pub use collector::TrackerDataCollector;
pub use types::{Location, TrackerData};
