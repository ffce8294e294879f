//! # Location Module
//!
//! Last-known location providers.
//!
//! The main provider talks to a local `gpsd` over its JSON protocol: after a
//! `?WATCH` command the daemon streams one JSON object per line, and `TPV`
//! (time-position-velocity) reports carry the current fix. A report with
//! `mode` 2 (2D) or 3 (3D) holds a usable position.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::LocationConfig;
use crate::error::{Result, TrackerError};
use crate::telemetry::types::Location;

/// Command enabling JSON reports on a gpsd connection
const GPSD_WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Minimum gpsd fix mode carrying a position (2 = 2D fix)
const GPSD_MIN_FIX_MODE: u8 = 2;

/// Trait for last-known location sources
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Best available position, or `None` when no fix is available
    async fn last_location(&self) -> Result<Option<Location>>;
}

/// A gpsd report line. Only the fields of `TPV` reports are of interest.
#[derive(Debug, Deserialize)]
struct GpsdReport {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl GpsdReport {
    fn position(&self) -> Option<Location> {
        if self.class != "TPV" || self.mode < GPSD_MIN_FIX_MODE {
            return None;
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Location::new(lat, lon)),
            _ => None,
        }
    }
}

/// Location from a gpsd daemon
#[derive(Debug, Clone)]
pub struct GpsdLocationProvider {
    addr: String,
    timeout: Duration,
}

impl GpsdLocationProvider {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    async fn read_fix(&self) -> Result<Option<Location>> {
        let stream = TcpStream::connect(&self.addr).await?;
        let (reader, mut writer) = stream.into_split();

        writer.write_all(GPSD_WATCH_COMMAND).await?;
        writer.flush().await?;

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            trace!("gpsd: {}", line);

            let report: GpsdReport = match serde_json::from_str(&line) {
                Ok(report) => report,
                Err(e) => {
                    debug!("Skipping unparseable gpsd line: {}", e);
                    continue;
                }
            };

            if let Some(location) = report.position() {
                return Ok(Some(location));
            }
        }

        // gpsd closed the connection without a fix
        Ok(None)
    }
}

#[async_trait]
impl LocationProvider for GpsdLocationProvider {
    async fn last_location(&self) -> Result<Option<Location>> {
        match timeout(self.timeout, self.read_fix()).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::Location(format!(
                "no fix from gpsd at {} within {:?}",
                self.addr, self.timeout
            ))),
        }
    }
}

/// Location configured by hand, for stationary hosts
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationProvider {
    location: Location,
}

impl FixedLocationProvider {
    pub fn new(location: Location) -> Self {
        Self { location }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn last_location(&self) -> Result<Option<Location>> {
        Ok(Some(self.location))
    }
}

/// Provider that never has a fix
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLocationProvider;

#[async_trait]
impl LocationProvider for DisabledLocationProvider {
    async fn last_location(&self) -> Result<Option<Location>> {
        Ok(None)
    }
}

/// Build the provider selected in `[location] provider`
pub fn provider_from_config(config: &LocationConfig) -> Box<dyn LocationProvider> {
    match config.provider.as_str() {
        "fixed" => Box::new(FixedLocationProvider::new(Location::new(
            config.latitude,
            config.longitude,
        ))),
        "disabled" => Box::new(DisabledLocationProvider),
        _ => Box::new(GpsdLocationProvider::new(
            config.gpsd_addr.clone(),
            Duration::from_millis(config.timeout_ms),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection, check for the WATCH command, then send `lines`
    async fn fake_gpsd(lines: Vec<&'static str>, hold_open: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();

            let mut reader = BufReader::new(reader);
            let mut command = String::new();
            reader.read_line(&mut command).await.unwrap();
            assert!(command.starts_with("?WATCH="));

            for line in lines {
                writer.write_all(line.as_bytes()).await.unwrap();
                writer.write_all(b"\n").await.unwrap();
            }

            if hold_open {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });

        addr
    }

    #[test]
    fn test_report_position() {
        let tpv: GpsdReport =
            serde_json::from_str(r#"{"class":"TPV","mode":3,"lat":48.85,"lon":2.35}"#).unwrap();
        assert_eq!(tpv.position(), Some(Location::new(48.85, 2.35)));

        let no_fix: GpsdReport = serde_json::from_str(r#"{"class":"TPV","mode":1}"#).unwrap();
        assert_eq!(no_fix.position(), None);

        let sky: GpsdReport =
            serde_json::from_str(r#"{"class":"SKY","mode":3,"lat":1.0,"lon":1.0}"#).unwrap();
        assert_eq!(sky.position(), None);
    }

    #[tokio::test]
    async fn test_gpsd_returns_first_fix() {
        let addr = fake_gpsd(
            vec![
                r#"{"class":"VERSION","release":"3.25"}"#,
                r#"{"class":"DEVICES","devices":[]}"#,
                r#"{"class":"TPV","mode":1}"#,
                "not json",
                r#"{"class":"TPV","mode":2,"lat":59.33,"lon":18.07}"#,
                r#"{"class":"TPV","mode":3,"lat":0.5,"lon":0.5}"#,
            ],
            false,
        )
        .await;

        let provider = GpsdLocationProvider::new(addr, Duration::from_secs(2));
        let location = provider.last_location().await.unwrap();
        assert_eq!(location, Some(Location::new(59.33, 18.07)));
    }

    #[tokio::test]
    async fn test_gpsd_closed_without_fix() {
        let addr = fake_gpsd(vec![r#"{"class":"TPV","mode":1}"#], false).await;

        let provider = GpsdLocationProvider::new(addr, Duration::from_secs(2));
        assert_eq!(provider.last_location().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_gpsd_timeout() {
        let addr = fake_gpsd(vec![r#"{"class":"TPV","mode":0}"#], true).await;

        let provider = GpsdLocationProvider::new(addr, Duration::from_millis(200));
        match provider.last_location().await {
            Err(TrackerError::Location(msg)) => assert!(msg.contains("no fix")),
            other => panic!("Expected Location error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gpsd_connection_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let provider = GpsdLocationProvider::new(addr, Duration::from_secs(2));
        assert!(matches!(
            provider.last_location().await,
            Err(TrackerError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_fixed_and_disabled_providers() {
        let fixed = FixedLocationProvider::new(Location::new(1.5, -2.5));
        assert_eq!(fixed.last_location().await.unwrap(), Some(Location::new(1.5, -2.5)));
        assert_eq!(DisabledLocationProvider.last_location().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_provider_from_config() {
        let mut config = LocationConfig::default();
        config.provider = "fixed".to_string();
        config.latitude = 10.0;
        config.longitude = 20.0;

        let provider = provider_from_config(&config);
        assert_eq!(
            provider.last_location().await.unwrap(),
            Some(Location::new(10.0, 20.0))
        );

        config.provider = "disabled".to_string();
        let provider = provider_from_config(&config);
        assert_eq!(provider.last_location().await.unwrap(), None);
    }
}
