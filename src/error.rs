//! # Error Types
//!
//! Custom error types for d-tracker using `thiserror`.

use thiserror::Error;

/// Main error type for d-tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Persisted key-value store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Sensor read or parse errors
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// No matching sensor found under the searched paths
    #[error("Sensor not found: {0}")]
    SensorNotFound(String),

    /// Location provider errors
    #[error("Location error: {0}")]
    Location(String),
}

impl TrackerError {
    /// Returns true if the underlying cause is a permission failure.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, TrackerError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }
}

/// Result type alias for d-tracker
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_detection() {
        let err = TrackerError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(err.is_permission_denied());

        let err = TrackerError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(!err.is_permission_denied());

        assert!(!TrackerError::Sensor("bad value".to_string()).is_permission_denied());
    }

    #[test]
    fn test_error_display() {
        let err = TrackerError::SensorNotFound("/sys/bus/iio/devices".to_string());
        assert_eq!(err.to_string(), "Sensor not found: /sys/bus/iio/devices");
    }
}
