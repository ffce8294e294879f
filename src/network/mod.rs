//! # Network Module
//!
//! Communication with the tracking server.
//!
//! This module handles:
//! - Serializing telemetry records as JSON
//! - POSTing them with the authorization header and fixed timeouts
//! - Checking for network connectivity before a send is attempted

pub mod api;
pub mod connectivity;

pub use api::{TrackerApi, TrackerApiService};
pub use connectivity::is_network_connected;
