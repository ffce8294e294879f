//! Telemetry record types.

use serde::{Deserialize, Serialize};

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Placeholder sent when no fix is available
    pub const UNKNOWN: Location = Location {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One telemetry record, serialized as the POST body
///
/// ```
/// use d_tracker::telemetry::types::TrackerData;
///
/// let data = TrackerData { power: 87.0, latitude: 52.5, longitude: 13.4, steps: 4200 };
/// let json = serde_json::to_string(&data).unwrap();
/// assert_eq!(json, r#"{"power":87.0,"latitude":52.5,"longitude":13.4,"steps":4200}"#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerData {
    /// Battery capacity in percent (0-100)
    pub power: f32,
    pub latitude: f64,
    pub longitude: f64,
    /// Steps counted today
    pub steps: u32,
}

impl TrackerData {
    pub fn new(power: f32, location: Location, steps: u32) -> Self {
        Self {
            power,
            latitude: location.latitude,
            longitude: location.longitude,
            steps,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}
