//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, and a section missing from the file falls back
//! to its defaults, so an empty file is a valid configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{PadTrackerError, Result};
use crate::link::protocol::{TELLO_COMMAND_PORT, TELLO_STATE_PORT};
use crate::link::DetectionDirection;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub vehicle: VehicleConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Vehicle addressing and marker detection setup
#[derive(Debug, Deserialize, Clone)]
pub struct VehicleConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub detection_direction: DetectionDirection,
}

/// UDP link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_command_port")]
    pub command_port: u16,

    /// Local port state datagrams arrive on (0 = ephemeral)
    #[serde(default = "default_state_port")]
    pub state_port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    #[serde(default = "default_motion_timeout_ms")]
    pub motion_timeout_ms: u64,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_state_timeout_ms")]
    pub state_timeout_ms: u64,
}

/// Mission pad layout
///
/// Pads are numbered from 1 in row-major order, `columns` pads per row,
/// `spacing` apart in both directions.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GridConfig {
    #[serde(default = "default_spacing")]
    pub spacing: f64,

    #[serde(default = "default_columns")]
    pub columns: u32,

    /// Highest pad id present in the layout
    #[serde(default = "default_max_marker_id")]
    pub max_marker_id: u32,
}

/// Telemetry poller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Status display configuration (binary only)
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,

    #[serde(default = "default_display_format")]
    pub format: String,

    /// Directory for rolling log files; empty logs to stdout only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_host() -> String { "192.168.10.1".to_string() }

fn default_command_port() -> u16 { TELLO_COMMAND_PORT }
fn default_state_port() -> u16 { TELLO_STATE_PORT }
fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_response_timeout_ms() -> u64 { 1000 }
fn default_motion_timeout_ms() -> u64 { 20000 }
fn default_retry_count() -> u32 { 1 }
fn default_state_timeout_ms() -> u64 { 1000 }

fn default_spacing() -> f64 { 40.0 }
fn default_columns() -> u32 { 3 }
fn default_max_marker_id() -> u32 { 8 }

fn default_interval_ms() -> u64 { 500 }

fn default_refresh_ms() -> u64 { 100 }
fn default_display_format() -> String { "text".to_string() }

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            detection_direction: DetectionDirection::default(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            command_port: default_command_port(),
            state_port: default_state_port(),
            bind_address: default_bind_address(),
            response_timeout_ms: default_response_timeout_ms(),
            motion_timeout_ms: default_motion_timeout_ms(),
            retry_count: default_retry_count(),
            state_timeout_ms: default_state_timeout_ms(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: default_spacing(),
            columns: default_columns(),
            max_marker_id: default_max_marker_id(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms() }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            format: default_display_format(),
            log_dir: String::new(),
        }
    }
}

impl LinkConfig {
    /// Reply timeout for configuration commands
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Reply timeout for takeoff, land and moves
    pub fn motion_timeout(&self) -> Duration {
        Duration::from_millis(self.motion_timeout_ms)
    }

    /// Maximum age of a state datagram before queries report it stale
    pub fn state_timeout(&self) -> Duration {
        Duration::from_millis(self.state_timeout_ms)
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
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
    /// use pad_tracker::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_tracker::config::Config;
    ///
    /// let config = Config::parse("[grid]\nspacing = 50.0\n").unwrap();
    /// assert_eq!(config.grid.spacing, 50.0);
    /// assert_eq!(config.grid.columns, 3);
    /// ```
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.vehicle.host.trim().is_empty() {
            return Err(invalid("vehicle host cannot be empty"));
        }

        // Grid layout
        if !self.grid.spacing.is_finite() || self.grid.spacing <= 0.0 {
            return Err(invalid("grid spacing must be a positive number"));
        }

        if self.grid.columns == 0 {
            return Err(invalid("grid columns must be greater than 0"));
        }

        if self.grid.max_marker_id == 0 {
            return Err(invalid("grid max_marker_id must be greater than 0"));
        }

        // Timing fields
        if self.poller.interval_ms < 10 || self.poller.interval_ms > 60000 {
            return Err(invalid("poller interval_ms must be between 10 and 60000"));
        }

        for (name, value) in [
            ("response_timeout_ms", self.link.response_timeout_ms),
            ("motion_timeout_ms", self.link.motion_timeout_ms),
            ("state_timeout_ms", self.link.state_timeout_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(invalid(format!("{} must be between 1 and 60000", name)));
            }
        }

        if self.link.retry_count > 10 {
            return Err(invalid("retry_count must be at most 10"));
        }

        if self.link.command_port == 0 {
            return Err(invalid("command_port cannot be 0"));
        }

        if self.link.bind_address.trim().is_empty() {
            return Err(invalid("bind_address cannot be empty"));
        }

        if self.display.refresh_ms < 10 || self.display.refresh_ms > 60000 {
            return Err(invalid("display refresh_ms must be between 10 and 60000"));
        }

        if !["text", "jsonl"].contains(&self.display.format.as_str()) {
            return Err(invalid("display format must be 'text' or 'jsonl'"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> PadTrackerError {
    PadTrackerError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.vehicle.host, "192.168.10.1");
        assert_eq!(config.vehicle.detection_direction, DetectionDirection::Both);
        assert_eq!(config.grid, GridConfig::default());
        assert_eq!(config.poller.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[vehicle]
host = "192.168.137.25"
detection_direction = "downward"

[link]
retry_count = 3

[grid]
spacing = 50.0
columns = 4
max_marker_id = 8

[poller]
interval_ms = 250

[display]
format = "jsonl"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.vehicle.host, "192.168.137.25");
        assert_eq!(config.vehicle.detection_direction, DetectionDirection::Downward);
        assert_eq!(config.link.retry_count, 3);
        assert_eq!(config.link.command_port, 8889);
        assert_eq!(config.grid.spacing, 50.0);
        assert_eq!(config.grid.columns, 4);
        assert_eq!(config.poller.interval_ms, 250);
        assert_eq!(config.display.format, "jsonl");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/pad-tracker.toml");
        assert!(matches!(result, Err(PadTrackerError::Io(_))));
    }

    #[test]
    fn test_unknown_direction_rejected() {
        let result = Config::parse("[vehicle]\ndetection_direction = \"sideways\"\n");
        assert!(matches!(result, Err(PadTrackerError::Config(_))));
    }

    #[test]
    fn test_empty_host() {
        let mut config = Config::default();
        config.vehicle.host = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spacing_zero() {
        let mut config = Config::default();
        config.grid.spacing = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spacing_not_finite() {
        let mut config = Config::default();
        config.grid.spacing = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_columns_zero() {
        let mut config = Config::default();
        config.grid.columns = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_marker_id_zero() {
        let mut config = Config::default();
        config.grid.max_marker_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_short() {
        let mut config = Config::default();
        config.poller.interval_ms = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_long() {
        let mut config = Config::default();
        config.poller.interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_response_timeout_zero() {
        let mut config = Config::default();
        config.link.response_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_motion_timeout_too_high() {
        let mut config = Config::default();
        config.link.motion_timeout_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_count_too_high() {
        let mut config = Config::default();
        config.link.retry_count = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_command_port_zero() {
        let mut config = Config::default();
        config.link.command_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_port_zero_allowed() {
        let mut config = Config::default();
        config.link.state_port = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_display_format() {
        let mut config = Config::default();
        config.display.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_command_port(), 8889);
        assert_eq!(default_state_port(), 8890);
        assert_eq!(default_response_timeout_ms(), 1000);
        assert_eq!(default_motion_timeout_ms(), 20000);
        assert_eq!(default_retry_count(), 1);
        assert_eq!(default_spacing(), 40.0);
        assert_eq!(default_columns(), 3);
        assert_eq!(default_max_marker_id(), 8);
        assert_eq!(default_interval_ms(), 500);
        assert_eq!(default_display_format(), "text");
    }
}
