//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TrackerError};

/// Location providers accepted in `[location] provider`
pub const LOCATION_PROVIDERS: &[&str] = &["gpsd", "fixed", "disabled"];

/// Log levels accepted in `[logging] level`
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub sensors: SensorsConfig,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracking server endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,

    #[serde(default)]
    pub authorization_key: String,
}

/// Periodic trigger and retry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_send_interval_min")]
    pub send_interval_min: u64,

    #[serde(default = "default_step_refresh_interval_min")]
    pub step_refresh_interval_min: u64,

    #[serde(default = "default_backoff_delay_min")]
    pub backoff_delay_min: u64,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    #[serde(default = "default_sensor_warmup_secs")]
    pub sensor_warmup_secs: u64,

    #[serde(default = "default_step_sensor_delay_secs")]
    pub step_sensor_delay_secs: u64,

    #[serde(default = "default_connectivity_poll_secs")]
    pub connectivity_poll_secs: u64,
}

/// Battery and step counter sources
#[derive(Debug, Deserialize, Clone)]
pub struct SensorsConfig {
    /// Power supply directory (e.g. /sys/class/power_supply/BAT0). Empty = auto-detect.
    #[serde(default)]
    pub battery_path: String,

    /// Cumulative step counter attribute file. Empty = auto-detect.
    #[serde(default)]
    pub step_counter_path: String,

    #[serde(default = "default_sampling_period_ms")]
    pub sampling_period_ms: u64,
}

/// Location provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LocationConfig {
    #[serde(default = "default_location_provider")]
    pub provider: String,

    #[serde(default = "default_gpsd_addr")]
    pub gpsd_addr: String,

    #[serde(default = "default_location_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub latitude: f64,

    #[serde(default)]
    pub longitude: f64,
}

/// Persisted state configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Empty = stdout.
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_server_url() -> String { "http://localhost:8080/api/tracker".to_string() }

fn default_send_interval_min() -> u64 { 30 }
fn default_step_refresh_interval_min() -> u64 { 15 }
fn default_backoff_delay_min() -> u64 { 10 }
fn default_max_retry_attempts() -> u32 { 3 }
fn default_sensor_warmup_secs() -> u64 { 10 }
fn default_step_sensor_delay_secs() -> u64 { 9 }
fn default_connectivity_poll_secs() -> u64 { 30 }

fn default_sampling_period_ms() -> u64 { 5000 }

fn default_location_provider() -> String { "gpsd".to_string() }
fn default_gpsd_addr() -> String { "127.0.0.1:2947".to_string() }
fn default_location_timeout_ms() -> u64 { 5000 }

fn default_state_path() -> String { "./state/step_sensor_prefs.json".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            authorization_key: String::new(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            send_interval_min: default_send_interval_min(),
            step_refresh_interval_min: default_step_refresh_interval_min(),
            backoff_delay_min: default_backoff_delay_min(),
            max_retry_attempts: default_max_retry_attempts(),
            sensor_warmup_secs: default_sensor_warmup_secs(),
            step_sensor_delay_secs: default_step_sensor_delay_secs(),
            connectivity_poll_secs: default_connectivity_poll_secs(),
        }
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            battery_path: String::new(),
            step_counter_path: String::new(),
            sampling_period_ms: default_sampling_period_ms(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: default_location_provider(),
            gpsd_addr: default_gpsd_addr(),
            timeout_ms: default_location_timeout_ms(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { state_path: default_state_path() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

impl ScheduleConfig {
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_min * 60)
    }

    pub fn step_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.step_refresh_interval_min * 60)
    }

    pub fn backoff_delay(&self) -> Duration {
        Duration::from_secs(self.backoff_delay_min * 60)
    }

    /// Total time the step sensor listens before a data send
    pub fn send_warmup(&self) -> Duration {
        Duration::from_secs(self.sensor_warmup_secs + self.step_sensor_delay_secs)
    }

    /// Time the step sensor listens during a standalone step refresh
    pub fn step_warmup(&self) -> Duration {
        Duration::from_secs(self.step_sensor_delay_secs)
    }

    pub fn connectivity_poll(&self) -> Duration {
        Duration::from_secs(self.connectivity_poll_secs)
    }
}

impl SensorsConfig {
    pub fn sampling_period(&self) -> Duration {
        Duration::from_millis(self.sampling_period_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> TrackerError {
    TrackerError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use d_tracker::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Server
        if self.server.url.is_empty() {
            return Err(invalid("server url cannot be empty"));
        }

        if !self.server.url.starts_with("http://") && !self.server.url.starts_with("https://") {
            return Err(invalid("server url must start with http:// or https://"));
        }

        if self.server.authorization_key.is_empty() {
            return Err(invalid("server authorization_key cannot be empty"));
        }

        // Schedule
        if self.schedule.send_interval_min == 0 || self.schedule.send_interval_min > 1440 {
            return Err(invalid("send_interval_min must be between 1 and 1440"));
        }

        if self.schedule.step_refresh_interval_min == 0
            || self.schedule.step_refresh_interval_min > 1440
        {
            return Err(invalid("step_refresh_interval_min must be between 1 and 1440"));
        }

        if self.schedule.backoff_delay_min == 0 || self.schedule.backoff_delay_min > 300 {
            return Err(invalid("backoff_delay_min must be between 1 and 300"));
        }

        if self.schedule.max_retry_attempts > 10 {
            return Err(invalid("max_retry_attempts must be between 0 and 10"));
        }

        if self.schedule.sensor_warmup_secs > 300 || self.schedule.step_sensor_delay_secs > 300 {
            return Err(invalid("sensor warm-up delays must be at most 300 seconds"));
        }

        if self.schedule.connectivity_poll_secs == 0 || self.schedule.connectivity_poll_secs > 3600 {
            return Err(invalid("connectivity_poll_secs must be between 1 and 3600"));
        }

        // Sensors
        if self.sensors.sampling_period_ms < 100 || self.sensors.sampling_period_ms > 60000 {
            return Err(invalid("sampling_period_ms must be between 100 and 60000"));
        }

        // Location
        if !LOCATION_PROVIDERS.contains(&self.location.provider.as_str()) {
            return Err(invalid(format!(
                "location provider must be one of: {}",
                LOCATION_PROVIDERS.join(", ")
            )));
        }

        if self.location.provider == "gpsd" && self.location.gpsd_addr.is_empty() {
            return Err(invalid("gpsd_addr cannot be empty when provider is gpsd"));
        }

        if self.location.timeout_ms == 0 || self.location.timeout_ms > 60000 {
            return Err(invalid("location timeout_ms must be between 1 and 60000"));
        }

        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(invalid("latitude must be between -90.0 and 90.0"));
        }

        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(invalid("longitude must be between -180.0 and 180.0"));
        }

        // Storage
        if self.storage.state_path.is_empty() {
            return Err(invalid("storage state_path cannot be empty"));
        }

        // Logging
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}
