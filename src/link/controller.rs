//! # Link Controller
//!
//! Transmitter-side owner of the active transport. Every outgoing packet goes
//! through [`LinkController::send_packet`], which tracks success and failure,
//! estimates link quality over a fixed window and turns link state changes
//! into beep requests.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::notifier::{BeepPattern, Notifier};
use crate::protocol::types::{Address, Command, ControlFrame, Packet, PaLevel, RfChannel};
use crate::transport::Transport;

/// Sends per link quality window
pub const LINK_QUALITY_WINDOW: u32 = 100;

/// Default threshold below which the link counts as degraded
pub const DEFAULT_MIN_LINK_QUALITY: u8 = 5;

/// A send error is forgotten after this long
pub const ERROR_GRACE_PERIOD: Duration = Duration::from_millis(250);

/// The success flag is dropped after this long without a send
pub const SUCCESS_HOLD_TIME: Duration = Duration::from_millis(250);

/// A control frame is re-sent after this long without traffic
pub const PING_INTERVAL: Duration = Duration::from_millis(1000);

/// Control frames are retried this soon after an error
pub const RETRY_WINDOW: Duration = Duration::from_millis(150);

/// Link quality threshold crossings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Quality fell below the minimum
    Degraded { quality: u8 },
    /// Quality is back at or above the minimum
    Recovered { quality: u8 },
}

/// Telemetry latched from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryReading {
    pub battery_mv: u16,
    pub received_at: Instant,
}

pub struct LinkController<T, N> {
    transport: T,
    notifier: N,
    min_link_quality: u8,
    battery_low_mv: u16,

    request_send_time: Option<Instant>,
    error_time: Option<Instant>,
    status_success: bool,
    status_failure: bool,
    prev_success: bool,
    prev_failure: bool,

    window_sends: u32,
    window_failures: u32,
    link_quality: u8,
    degraded: bool,
    last_event: Option<LinkEvent>,

    telemetry: Option<TelemetryReading>,
}

impl<T: Transport, N: Notifier> LinkController<T, N> {
    pub fn new(transport: T, notifier: N) -> Self {
        Self {
            transport,
            notifier,
            min_link_quality: DEFAULT_MIN_LINK_QUALITY,
            battery_low_mv: 0,
            request_send_time: None,
            error_time: None,
            status_success: false,
            status_failure: false,
            prev_success: false,
            prev_failure: false,
            window_sends: 0,
            window_failures: 0,
            link_quality: 100,
            degraded: false,
            last_event: None,
            telemetry: None,
        }
    }

    /// Threshold for [`LinkEvent`]s, in percent
    pub fn with_min_link_quality(mut self, min: u8) -> Self {
        self.min_link_quality = min.min(100);
        self
    }

    /// Peer battery level that triggers a warning; 0 disables it
    pub fn with_battery_low_mv(mut self, mv: u16) -> Self {
        self.battery_low_mv = mv;
        self
    }

    /// Send one packet through the transport
    ///
    /// Returns whether the transport reported success. Failures never
    /// propagate; they only show up in the status flags, the link quality
    /// and the beeps.
    pub async fn send_packet(&mut self, packet: &Packet) -> bool {
        debug!("Sending packet type {:#06x}", packet.packet_type());

        let now = Instant::now();
        let ok = match self.transport.send_request(packet).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Send failed: {}", e);
                false
            }
        };

        if ok {
            self.request_send_time = Some(now);
            self.error_time = None;
            self.status_success = true;
            self.status_failure = false;
        } else {
            self.error_time.get_or_insert(now);
            self.request_send_time = None;
            self.status_success = false;
            self.status_failure = true;
            self.notifier.beep(BeepPattern::SEND_FAILED);
        }

        let changed = self.status_success != self.prev_success || self.status_failure != self.prev_failure;
        self.prev_success = self.status_success;
        self.prev_failure = self.status_failure;

        if changed && self.status_success {
            self.notifier.beep(BeepPattern::LINK_UP);
        }

        self.record(ok);
        ok
    }

    fn record(&mut self, ok: bool) {
        self.window_sends += 1;
        if !ok {
            self.window_failures += 1;
        }
        if self.window_sends < LINK_QUALITY_WINDOW {
            return;
        }

        let successes = LINK_QUALITY_WINDOW - self.window_failures;
        self.link_quality = (successes * 100 / LINK_QUALITY_WINDOW) as u8;
        self.window_sends = 0;
        self.window_failures = 0;
        debug!("Link quality: {}%", self.link_quality);

        let degraded = self.link_quality < self.min_link_quality;
        if degraded == self.degraded {
            return;
        }
        self.degraded = degraded;

        let event = if degraded {
            warn!("Link degraded: {}%", self.link_quality);
            self.notifier.beep(BeepPattern::LINK_DEGRADED);
            LinkEvent::Degraded {
                quality: self.link_quality,
            }
        } else {
            info!("Link recovered: {}%", self.link_quality);
            self.notifier.beep(BeepPattern::LINK_RECOVERED);
            LinkEvent::Recovered {
                quality: self.link_quality,
            }
        };
        self.last_event = Some(event);
    }

    /// Per-tick housekeeping: age status flags and latch inbound telemetry
    ///
    /// Returns the telemetry reading latched during this call, if any.
    pub async fn handle(&mut self) -> Option<TelemetryReading> {
        if let Some(error_time) = self.error_time {
            if error_time.elapsed() > ERROR_GRACE_PERIOD {
                self.status_failure = false;
                self.error_time = None;
            }
        }
        if let Some(send_time) = self.request_send_time {
            if send_time.elapsed() > SUCCESS_HOLD_TIME {
                self.status_success = false;
            }
        }

        match self.transport.poll_response().await? {
            Packet::Telemetry { battery_mv } => {
                let reading = TelemetryReading {
                    battery_mv,
                    received_at: Instant::now(),
                };
                self.telemetry = Some(reading);
                debug!("Peer battery: {} mV", battery_mv);

                if self.battery_low_mv > 0 && battery_mv > 0 && battery_mv < self.battery_low_mv {
                    warn!("Peer battery low: {} mV", battery_mv);
                    self.notifier.beep(BeepPattern::BATTERY_LOW);
                }
                Some(reading)
            }
            other => {
                debug!("Ignoring response {:#06x}", other.packet_type());
                None
            }
        }
    }

    /// Whether a control frame should go out now
    ///
    /// Frames are sent when the values changed, as a keep-alive ping after
    /// [`PING_INTERVAL`] of silence, and as retries shortly after an error.
    pub fn control_due(&self, changed: bool) -> bool {
        let ping = self.error_time.is_none()
            && self
                .request_send_time
                .map_or(false, |sent| sent.elapsed() > PING_INTERVAL);
        let retry = self
            .error_time
            .map_or(false, |error| error.elapsed() < RETRY_WINDOW);

        changed || ping || retry
    }

    pub async fn send_control(&mut self, frame: &ControlFrame) -> bool {
        self.send_packet(&Packet::Control(*frame)).await
    }

    /// Move the peer to another channel, then follow it
    pub async fn send_rf_channel(&mut self, channel: RfChannel) -> bool {
        if !self.send_packet(&Packet::SetRfChannel(channel)).await {
            return false;
        }
        match self.transport.set_channel(channel).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Peer switched to channel {} but local switch failed: {}", channel, e);
                false
            }
        }
    }

    pub async fn send_pa_level(&mut self, level: PaLevel) -> bool {
        self.send_packet(&Packet::SetPaLevel(level)).await
    }

    pub async fn send_command(&mut self, command: Command) -> bool {
        self.send_packet(&Packet::Command(command)).await
    }

    /// Run the transport handshake with its usual timeout
    pub async fn pair(&mut self) -> Option<Address> {
        let timeout = self.transport.pairing_timeout();
        self.pair_with_timeout(timeout).await
    }

    pub async fn pair_with_timeout(&mut self, timeout: Duration) -> Option<Address> {
        info!("Pairing via {} for up to {:?}", self.transport.kind(), timeout);
        match self.transport.run_pairing(timeout).await {
            Ok(peer) => {
                self.notifier.beep(BeepPattern::PAIRED);
                Some(peer)
            }
            Err(e) => {
                warn!("Pairing failed: {}", e);
                None
            }
        }
    }

    /// Percentage of successful sends over the last complete window
    pub fn link_quality(&self) -> u8 {
        self.link_quality
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Latest threshold crossing, cleared on read
    pub fn take_event(&mut self) -> Option<LinkEvent> {
        self.last_event.take()
    }

    /// Recent send succeeded
    pub fn is_success(&self) -> bool {
        self.status_success
    }

    /// Recent send failed and the error has not aged out
    pub fn is_failure(&self) -> bool {
        self.status_failure
    }

    pub fn telemetry(&self) -> Option<TelemetryReading> {
        self.telemetry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
