//! # Receiver Loop
//!
//! Responder-side counterpart of the link controller. Each [`RxController::handle`]
//! call takes at most one inbound packet, answers with telemetry on its
//! interval, checks the failsafe timeout and runs pairing when needed.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::failsafe::{FailsafeMonitor, OutputSink};
use crate::config::ReceiverConfig;
use crate::error::Result;
use crate::protocol::types::{Address, Command, Packet};
use crate::settings::{self, LinkSettings, SettingsStore};
use crate::transport::Transport;

/// Interval between telemetry packets
pub const TELEMETRY_INTERVAL: Duration = Duration::from_millis(5000);

/// Battery voltage reading, in millivolts
#[cfg_attr(test, mockall::automock)]
pub trait VoltageSource: Send {
    fn read_millivolts(&mut self) -> u16;
}

pub struct RxController<T, S, O, V> {
    transport: T,
    store: S,
    output: O,
    voltage: V,
    settings: LinkSettings,
    failsafe: FailsafeMonitor,
    failsafe_timeout: Option<Duration>,
    telemetry_interval: Duration,
    last_telemetry: Option<Instant>,
    pairing_requested: bool,
    user_commands: [u64; 2],
}

impl<T, S, O, V> RxController<T, S, O, V>
where
    T: Transport,
    S: SettingsStore,
    O: OutputSink,
    V: VoltageSource,
{
    pub fn new(transport: T, store: S, output: O, voltage: V) -> Self {
        Self {
            transport,
            store,
            output,
            voltage,
            settings: LinkSettings::default(),
            failsafe: FailsafeMonitor::default(),
            failsafe_timeout: None,
            telemetry_interval: TELEMETRY_INTERVAL,
            last_telemetry: None,
            pairing_requested: false,
            user_commands: [0; 2],
        }
    }

    pub fn with_failsafe_timeout(mut self, timeout: Duration) -> Self {
        self.failsafe_timeout = Some(timeout);
        self
    }

    pub fn with_telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }

    /// Apply the `[receiver]` timing section
    pub fn with_config(self, config: &ReceiverConfig) -> Self {
        self.with_failsafe_timeout(config.failsafe_timeout())
            .with_telemetry_interval(config.telemetry_interval())
    }

    /// Load settings and bring the transport up
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LinkError::Transport`] if the transport fails to initialize.
    pub async fn begin(&mut self, own: Address) -> Result<()> {
        self.settings = settings::load_or_default(&mut self.store);

        self.transport
            .initialize(own, self.settings.rf_channel, self.settings.pa_level)
            .await?;

        if !self.settings.peer.is_none() {
            self.transport.set_peer(self.settings.peer).await?;
            info!("Restored peer {}", self.settings.peer);
        } else {
            info!("No stored peer, waiting for pairing");
        }

        let mut failsafe = FailsafeMonitor::new(self.settings.failsafe);
        if let Some(timeout) = self.failsafe_timeout {
            failsafe = failsafe.with_timeout(timeout);
        }
        self.failsafe = failsafe;
        Ok(())
    }

    /// One scheduling tick
    pub async fn handle(&mut self) {
        if self.transport.is_paired() {
            if let Some(packet) = self.transport.poll_response().await {
                self.dispatch(packet).await;
            }
            self.send_telemetry_if_due().await;
        }

        self.failsafe.tick(&mut self.output);

        if self.pairing_requested || !self.transport.is_paired() {
            self.pair().await;
        }
    }

    /// Run pairing on the next tick even if a peer is known
    pub fn request_pairing(&mut self) {
        self.pairing_requested = true;
    }

    async fn dispatch(&mut self, packet: Packet) {
        match packet {
            Packet::Control(frame) => {
                self.failsafe.on_control(&frame, &mut self.output);
            }
            Packet::SetRfChannel(channel) => {
                if let Err(e) = self.transport.set_channel(channel).await {
                    warn!("Failed to switch to channel {}: {}", channel, e);
                    return;
                }
                info!("RF channel set to {}", channel);
                self.settings.rf_channel = self.transport.rf_channel();
                self.persist();
            }
            Packet::SetPaLevel(level) => {
                if let Err(e) = self.transport.set_pa_level(level).await {
                    warn!("Failed to set PA level {}: {}", level, e);
                    return;
                }
                info!("PA level set to {}", level);
                self.settings.pa_level = self.transport.pa_level();
                self.persist();
            }
            Packet::Command(Command::SaveFailsafe) => {
                if let Some(frame) = self.failsafe.save_failsafe() {
                    self.settings.failsafe = frame;
                    self.persist();
                }
            }
            Packet::Command(command @ (Command::UserCommand1 | Command::UserCommand2)) => {
                let slot = if command == Command::UserCommand1 { 0 } else { 1 };
                self.user_commands[slot] += 1;
                info!("Received {:?}", command);
            }
            Packet::Telemetry { .. } | Packet::Pair(_) => {
                debug!("Ignoring packet {:#06x}", packet.packet_type());
            }
        }
    }

    async fn send_telemetry_if_due(&mut self) {
        let due = self
            .last_telemetry
            .map_or(true, |sent| sent.elapsed() >= self.telemetry_interval);
        if !due {
            return;
        }
        self.last_telemetry = Some(Instant::now());

        let battery_mv = self.voltage.read_millivolts();
        match self.transport.send_request(&Packet::Telemetry { battery_mv }).await {
            Ok(()) => debug!("Telemetry queued: {} mV", battery_mv),
            Err(e) => debug!("Telemetry not sent: {}", e),
        }
    }

    async fn pair(&mut self) {
        self.pairing_requested = false;
        let timeout = self.transport.pairing_timeout();

        match self.transport.run_pairing(timeout).await {
            Ok(peer) => {
                info!("Paired with {}", peer);
                self.settings.peer = peer;
                self.settings.rf_channel = self.transport.rf_channel();
                self.persist();
            }
            Err(e) => debug!("Pairing attempt ended: {}", e),
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.settings) {
            warn!("Failed to save settings: {}", e);
        }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn failsafe(&self) -> &FailsafeMonitor {
        &self.failsafe
    }

    /// Times `command` was received; zero for non-user commands
    pub fn user_command_count(&self, command: Command) -> u64 {
        match command {
            Command::UserCommand1 => self.user_commands[0],
            Command::UserCommand2 => self.user_commands[1],
            Command::SaveFailsafe => 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
