//! # Link Module
//!
//! Reliability logic on top of a [`Transport`](crate::transport::Transport).
//!
//! This module handles:
//! - Transmitter side: sending, link quality, telemetry latch ([`LinkController`])
//! - Receiver side: failsafe on link loss ([`FailsafeMonitor`]) and the main loop ([`RxController`])
//! - Beep requests for the user ([`Notifier`])

pub mod controller;
pub mod failsafe;
pub mod notifier;
pub mod receiver;

pub use controller::{LinkController, LinkEvent, TelemetryReading};
pub use failsafe::{FailsafeMonitor, NullOutput, OutputSink};
pub use notifier::{BeepPattern, LogNotifier, Notifier};
pub use receiver::{RxController, VoltageSource};
