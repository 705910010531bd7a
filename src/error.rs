//! # Error Types
//!
//! Custom error types for the RC link using `thiserror`.
//!
//! Transport and packet failures are absorbed at the link controller boundary;
//! [`LinkError`] is what setup code (config, settings, serial port) reports.

use thiserror::Error;

use crate::protocol::types::PacketType;
use crate::serial::bus::BridgeStatus;

/// Main error type for the RC link
#[derive(Debug, Error)]
pub enum LinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened on any candidate path
    #[error("No bridge serial port found (tried: {0})")]
    SerialPortNotFound(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Settings store errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// JSON encoding errors (settings file, telemetry log)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No transport could be initialized
    #[error("No radio transport available")]
    NoTransport,

    /// Transport errors that escaped to setup code
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors decoding a radio frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Frame shorter than the payload it claims to carry
    #[error("Frame too short: {0} bytes")]
    TooShort(usize),

    /// Discriminant outside the known packet types
    #[error("Unknown packet type: 0x{0:04X}")]
    UnknownType(PacketType),

    /// Pair packet with an unknown status byte
    #[error("Unknown pair status: {0}")]
    UnknownPairStatus(u8),

    /// Command packet with an unknown command value
    #[error("Unknown command: {0}")]
    UnknownCommand(u16),
}

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// Hardware did not come up
    #[error("Transport initialization failed: {0}")]
    InitFailed(String),

    /// No peer address yet
    #[error("Not paired")]
    NotPaired,

    /// Frame was not acknowledged by the peer
    #[error("No acknowledgment from peer")]
    NoAck,

    /// Co-processor never changed its status
    #[error("Bridge timed out in status {0:?}")]
    BusTimeout(BridgeStatus),

    /// Co-processor answered with an unexpected status
    #[error("Bridge reported status {0:?}")]
    Status(BridgeStatus),

    /// Pairing handshake did not complete in time
    #[error("Pairing timed out")]
    PairingTimeout,

    /// Operation not available for this transport or role
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Bus I/O error
    #[error("Bus I/O error: {0}")]
    Bus(#[from] std::io::Error),
}

/// Result type alias for the RC link
pub type Result<T> = std::result::Result<T, LinkError>;
