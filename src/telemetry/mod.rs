//! # Telemetry Module
//!
//! Handles telemetry logging to JSONL files with rotation.
//!
//! This module handles:
//! - Building records from the peer's battery reading and the link quality
//! - Formatting as JSONL (JSON Lines)
//! - Writing to rotating log files, retaining only the last M files

pub mod logger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use logger::TelemetryLogger;

/// One logged telemetry sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// RFC 3339 UTC timestamp
    pub timestamp: DateTime<Utc>,
    /// Peer battery voltage
    pub battery_mv: u16,
    /// Link quality percentage at the time of the sample
    pub link_quality: u8,
}

impl TelemetryRecord {
    pub fn now(battery_mv: u16, link_quality: u8) -> Self {
        Self {
            timestamp: Utc::now(),
            battery_mv,
            link_quality,
        }
    }
}
