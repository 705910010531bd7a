//! # Transport Module
//!
//! The capability every physical radio implements.
//!
//! This module handles:
//! - The [`Transport`] trait: initialize, configure, send, poll, pair
//! - Dispatch over the closed set of backends ([`TransportKind`])
//! - Picking the first backend whose hardware comes up ([`select_transport`])
//!
//! A transport is built for one [`Role`]. An initiator (transmitter) sends
//! requests and polls for responses; a responder (receiver) polls for
//! requests and queues its responses through `send_request`.

pub mod direct_radio;
pub mod serial_bridge;
pub mod wifi_peer;

#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{LinkError, TransportError};
use crate::pairing::{INITIATOR_PAIR_TIMEOUT, RESPONDER_PAIR_TIMEOUT};
use crate::protocol::types::{Address, Packet, PaLevel, RfChannel};

pub use direct_radio::{DirectRadio, RadioChip};
pub use serial_bridge::SerialBridge;
pub use wifi_peer::{InboundFrame, InboundHandle, PeerNetwork, WifiPeer};

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Physical backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Packet radio transceiver driven directly
    DirectRadio,
    /// Peer-to-peer frames over WiFi
    WifiPeer,
    /// Radio owned by a co-processor on a synchronous bus
    SerialBridge,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::DirectRadio => "direct radio",
            TransportKind::WifiPeer => "WiFi peer",
            TransportKind::SerialBridge => "serial bridge",
        };
        f.write_str(name)
    }
}

/// Which side of the link a transport serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Transmitter: sends requests, starts pairing
    Initiator,
    /// Receiver: answers requests, listens for pairing
    Responder,
}

/// Radio link capability
///
/// Operations are strictly sequential; a response is only ever attributed to
/// the most recent request.
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    fn role(&self) -> Role;

    /// Bring the hardware up with the given address and radio settings
    ///
    /// On failure callers must not assume any part of the configuration took effect.
    async fn initialize(&mut self, own: Address, channel: RfChannel, pa_level: PaLevel) -> TransportResult<()>;

    /// Switch to a logical RF channel; out-of-range values are clamped
    async fn set_channel(&mut self, channel: RfChannel) -> TransportResult<()>;

    /// Change the PA level; out-of-range values are clamped
    async fn set_pa_level(&mut self, level: PaLevel) -> TransportResult<()>;

    /// Restore a previously learned peer
    async fn set_peer(&mut self, peer: Address) -> TransportResult<()>;

    /// Transmit one frame (initiator) or queue one response (responder)
    ///
    /// Fails with [`TransportError::NotPaired`] while no peer is known.
    async fn send_request(&mut self, packet: &Packet) -> TransportResult<()>;

    /// Take the newest inbound packet, if one arrived since the last call
    ///
    /// Never blocks and never yields the same frame twice. Frames that do
    /// not decode are dropped.
    async fn poll_response(&mut self) -> Option<Packet>;

    /// Run the pairing handshake for at most `timeout`
    ///
    /// Returns the learned peer. On failure the prior peer and radio
    /// configuration are kept.
    async fn run_pairing(&mut self, timeout: Duration) -> TransportResult<Address>;

    /// Timeout this backend normally pairs with
    fn pairing_timeout(&self) -> Duration {
        match self.role() {
            Role::Initiator => INITIATOR_PAIR_TIMEOUT,
            Role::Responder => RESPONDER_PAIR_TIMEOUT,
        }
    }

    fn is_paired(&self) -> bool {
        !self.peer_address().is_none()
    }

    fn peer_address(&self) -> Address;

    fn own_address(&self) -> Address;

    fn rf_channel(&self) -> RfChannel;

    fn pa_level(&self) -> PaLevel;

    /// Forget the peer
    fn unpair(&mut self);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn kind(&self) -> TransportKind {
        (**self).kind()
    }

    fn role(&self) -> Role {
        (**self).role()
    }

    async fn initialize(&mut self, own: Address, channel: RfChannel, pa_level: PaLevel) -> TransportResult<()> {
        (**self).initialize(own, channel, pa_level).await
    }

    async fn set_channel(&mut self, channel: RfChannel) -> TransportResult<()> {
        (**self).set_channel(channel).await
    }

    async fn set_pa_level(&mut self, level: PaLevel) -> TransportResult<()> {
        (**self).set_pa_level(level).await
    }

    async fn set_peer(&mut self, peer: Address) -> TransportResult<()> {
        (**self).set_peer(peer).await
    }

    async fn send_request(&mut self, packet: &Packet) -> TransportResult<()> {
        (**self).send_request(packet).await
    }

    async fn poll_response(&mut self) -> Option<Packet> {
        (**self).poll_response().await
    }

    async fn run_pairing(&mut self, timeout: Duration) -> TransportResult<Address> {
        (**self).run_pairing(timeout).await
    }

    fn pairing_timeout(&self) -> Duration {
        (**self).pairing_timeout()
    }

    fn is_paired(&self) -> bool {
        (**self).is_paired()
    }

    fn peer_address(&self) -> Address {
        (**self).peer_address()
    }

    fn own_address(&self) -> Address {
        (**self).own_address()
    }

    fn rf_channel(&self) -> RfChannel {
        (**self).rf_channel()
    }

    fn pa_level(&self) -> PaLevel {
        (**self).pa_level()
    }

    fn unpair(&mut self) {
        (**self).unpair()
    }
}

/// Initialize candidates in order and keep the first that comes up
///
/// # Errors
///
/// Returns [`LinkError::NoTransport`] if every candidate fails.
pub async fn select_transport(
    candidates: Vec<Box<dyn Transport>>,
    own: Address,
    channel: RfChannel,
    pa_level: PaLevel,
) -> Result<Box<dyn Transport>, LinkError> {
    for mut candidate in candidates {
        let kind = candidate.kind();
        match candidate.initialize(own, channel, pa_level).await {
            Ok(()) => {
                info!("Using {} transport", kind);
                return Ok(candidate);
            }
            Err(e) => warn!("{} transport unavailable: {}", kind, e),
        }
    }

    Err(LinkError::NoTransport)
}
