//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LinkError, Result};
use crate::protocol::types::{Address, ADDRESS_LENGTH};
use crate::serial::{BRIDGE_BAUD_RATE, DEFAULT_DEVICE_PATHS};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link to the radio co-processor
#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_device_paths")]
    pub device_paths: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Transmitter link behavior
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Own radio address, `aa:bb:cc:dd:ee:ff`
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_packet_rate_hz")]
    pub packet_rate_hz: u32,

    #[serde(default = "default_min_link_quality")]
    pub min_link_quality: u8,

    /// 0 disables the low battery warning
    #[serde(default)]
    pub battery_low_mv: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PairingConfig {
    #[serde(default = "default_pair_timeout_ms")]
    pub timeout_ms: u64,

    /// Pair on startup even when a peer is stored
    #[serde(default)]
    pub pair_on_start: bool,
}

/// Receiver loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct ReceiverConfig {
    #[serde(default = "default_failsafe_timeout_ms")]
    pub failsafe_timeout_ms: u64,

    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write daily log files here
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_device_paths() -> Vec<String> { DEFAULT_DEVICE_PATHS.iter().map(|p| p.to_string()).collect() }
fn default_baud_rate() -> u32 { BRIDGE_BAUD_RATE }

fn default_address() -> String { "02:52:43:00:00:01".to_string() }
fn default_packet_rate_hz() -> u32 { 50 }
fn default_min_link_quality() -> u8 { 5 }

fn default_pair_timeout_ms() -> u64 { 5000 }

fn default_failsafe_timeout_ms() -> u64 { 1250 }
fn default_telemetry_interval_ms() -> u64 { 5000 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

fn default_settings_path() -> String { "./rc-link-settings.json".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_paths: default_device_paths(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            packet_rate_hz: default_packet_rate_hz(),
            min_link_quality: default_min_link_quality(),
            battery_low_mv: 0,
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_pair_timeout_ms(),
            pair_on_start: false,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            failsafe_timeout_ms: default_failsafe_timeout_ms(),
            telemetry_interval_ms: default_telemetry_interval_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: None,
        }
    }
}

impl LinkConfig {
    /// Parsed own address
    pub fn address(&self) -> Result<Address> {
        parse_address(&self.address)
            .ok_or_else(|| invalid(format!("address '{}' is not six hex bytes", self.address)))
    }

    /// Interval between control loop ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.packet_rate_hz.max(1)))
    }
}

impl PairingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ReceiverConfig {
    pub fn failsafe_timeout(&self) -> Duration {
        Duration::from_millis(self.failsafe_timeout_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}

impl SettingsConfig {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

fn parse_address(text: &str) -> Option<Address> {
    let mut bytes = [0u8; ADDRESS_LENGTH];
    let mut parts = text.split(':');
    for byte in bytes.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Address(bytes))
}

fn invalid(message: impl std::fmt::Display) -> LinkError {
    LinkError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields take their defaults.
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
    /// use rc_link::config::Config;
    ///
    /// let config = Config::load("rc-link.toml")?;
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
        // Bridge
        if self.bridge.device_paths.is_empty() || self.bridge.device_paths.iter().any(|p| p.is_empty()) {
            return Err(invalid("device_paths must list at least one non-empty path"));
        }

        if ![9600, 57600, 115200, 230400, 460800, 921600].contains(&self.bridge.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        // Link
        let address = self.link.address()?;
        if address.is_none() || address.is_broadcast() {
            return Err(invalid("address cannot be all zeros or all 0xFF"));
        }

        if self.link.packet_rate_hz == 0 || self.link.packet_rate_hz > 500 {
            return Err(invalid("packet_rate_hz must be between 1 and 500"));
        }

        if self.link.min_link_quality > 100 {
            return Err(invalid("min_link_quality must be between 0 and 100"));
        }

        // Timing fields
        if self.pairing.timeout_ms == 0 || self.pairing.timeout_ms > 60000 {
            return Err(invalid("pairing timeout_ms must be between 1 and 60000"));
        }

        if self.receiver.failsafe_timeout_ms == 0 || self.receiver.failsafe_timeout_ms > 60000 {
            return Err(invalid("failsafe_timeout_ms must be between 1 and 60000"));
        }

        if self.receiver.telemetry_interval_ms == 0 || self.receiver.telemetry_interval_ms > 60000 {
            return Err(invalid("telemetry_interval_ms must be between 1 and 60000"));
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        // Settings and logging
        if self.settings.path.is_empty() {
            return Err(invalid("settings path cannot be empty"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config {
            bridge: BridgeConfig {
                device_paths: default_device_paths(),
                baud_rate: default_baud_rate(),
            },
            link: LinkConfig {
                address: default_address(),
                packet_rate_hz: default_packet_rate_hz(),
                min_link_quality: default_min_link_quality(),
                battery_low_mv: 3300,
            },
            pairing: PairingConfig {
                timeout_ms: default_pair_timeout_ms(),
                pair_on_start: false,
            },
            receiver: ReceiverConfig {
                failsafe_timeout_ms: default_failsafe_timeout_ms(),
                telemetry_interval_ms: default_telemetry_interval_ms(),
            },
            telemetry: TelemetryConfig {
                enabled: default_telemetry_enabled(),
                log_dir: default_log_dir(),
                max_records_per_file: default_max_records_per_file(),
                max_files_to_keep: default_max_files_to_keep(),
                format: default_log_format(),
            },
            settings: SettingsConfig {
                path: default_settings_path(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                file_dir: None,
            },
        }
    }

    #[test]
    fn test_default_config() {
        assert!(Config::default().validate().is_ok());
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[bridge]
device_paths = ["/dev/ttyUSB1"]

[link]
address = "0a:0b:0c:0d:0e:0f"
packet_rate_hz = 100
battery_low_mv = 3400

[pairing]
pair_on_start = true

[logging]
level = "debug"
file_dir = "./log"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.bridge.device_paths, vec!["/dev/ttyUSB1"]);
        assert_eq!(config.bridge.baud_rate, BRIDGE_BAUD_RATE);
        assert_eq!(config.link.address().unwrap(), Address([0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f]));
        assert_eq!(config.link.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.link.battery_low_mv, 3400);
        assert!(config.pairing.pair_on_start);
        assert_eq!(config.pairing.timeout(), Duration::from_millis(5000));
        assert_eq!(config.receiver.failsafe_timeout(), Duration::from_millis(1250));
        assert_eq!(config.logging.file_dir.as_deref(), Some("./log"));
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"").unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.link.packet_rate_hz, 50);
        assert_eq!(config.settings.path(), PathBuf::from("./rc-link-settings.json"));
    }

    #[test]
    fn test_load_invalid_value_fails() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[link]\npacket_rate_hz = 0\n").unwrap();

        assert!(matches!(Config::load(temp_file.path()), Err(LinkError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/rc-link.toml"),
            Err(LinkError::Io(_))
        ));
    }

    #[test]
    fn test_empty_device_paths() {
        let mut config = create_valid_config();
        config.bridge.device_paths.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_device_path() {
        let mut config = create_valid_config();
        config.bridge.device_paths.push(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.bridge.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in &[9600, 57600, 115200, 230400, 460800, 921600] {
            let mut config = create_valid_config();
            config.bridge.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_malformed_addresses() {
        for text in ["", "01:02:03:04:05", "01:02:03:04:05:06:07", "1:02:03:04:05:06", "zz:02:03:04:05:06"] {
            let mut config = create_valid_config();
            config.link.address = text.to_string();
            assert!(config.validate().is_err(), "Address '{}' should be rejected", text);
        }
    }

    #[test]
    fn test_reserved_addresses_rejected() {
        for text in ["00:00:00:00:00:00", "ff:ff:ff:ff:ff:ff"] {
            let mut config = create_valid_config();
            config.link.address = text.to_string();
            assert!(config.validate().is_err(), "Address '{}' should be rejected", text);
        }
    }

    #[test]
    fn test_packet_rate_zero() {
        let mut config = create_valid_config();
        config.link.packet_rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_packet_rate_too_high() {
        let mut config = create_valid_config();
        config.link.packet_rate_hz = 501;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_link_quality_too_high() {
        let mut config = create_valid_config();
        config.link.min_link_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pair_timeout_zero() {
        let mut config = create_valid_config();
        config.pairing.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pair_timeout_too_high() {
        let mut config = create_valid_config();
        config.pairing.timeout_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failsafe_timeout_zero() {
        let mut config = create_valid_config();
        config.receiver.failsafe_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_telemetry_interval_too_high() {
        let mut config = create_valid_config();
        config.receiver.telemetry_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = create_valid_config();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_settings_path() {
        let mut config = create_valid_config();
        config.settings.path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval() {
        let mut config = create_valid_config();
        assert_eq!(config.link.tick_interval(), Duration::from_millis(20));
        config.link.packet_rate_hz = 500;
        assert_eq!(config.link.tick_interval(), Duration::from_millis(2));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_device_paths(), vec!["/dev/ttyACM0", "/dev/ttyUSB0"]);
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_packet_rate_hz(), 50);
        assert_eq!(default_min_link_quality(), 5);
        assert_eq!(default_pair_timeout_ms(), 5000);
        assert_eq!(default_failsafe_timeout_ms(), 1250);
        assert_eq!(default_telemetry_interval_ms(), 5000);
        assert_eq!(default_telemetry_enabled(), true);
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_log_format(), "jsonl");
        assert_eq!(default_log_level(), "info");
    }
}
