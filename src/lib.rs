//! # RC Link Library
//!
//! Radio link layer for a low-cost RC transmitter/receiver pair.
//!
//! This library provides the fixed-size packet protocol, the pairing handshake,
//! and the reliability logic (link quality, telemetry, failsafe) on top of
//! interchangeable radio transports: a directly driven packet radio, WiFi
//! peer-to-peer frames, or a radio co-processor behind a serial bus.

pub mod config;
pub mod error;
pub mod link;
pub mod pairing;
pub mod protocol;
pub mod serial;
pub mod settings;
pub mod telemetry;
pub mod transport;
