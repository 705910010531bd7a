//! # WiFi Peer Transport
//!
//! Connectionless peer-to-peer frames over WiFi (ESP-NOW class networks).
//!
//! Delivery is asynchronous: the network stack hands inbound frames to an
//! [`InboundHandle`], which forwards them over a bounded channel to the
//! owning [`WifiPeer`]. The transport keeps only the newest accepted frame
//! together with a monotonic arrival counter, so a poll yields each arrival
//! at most once and never blocks.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Role, Transport, TransportKind, TransportResult};
use crate::error::TransportError;
use crate::pairing::{
    Deadline, InitiatorSession, ResponderAction, ResponderSession, PAIR_POLL_STEP,
    READY_REPEAT_COUNT, READY_REPEAT_INTERVAL,
};
use crate::protocol::decoder::decode_packet;
use crate::protocol::encoder::encode_packet;
use crate::protocol::types::{
    Address, Packet, PaLevel, RfChannel, DEFAULT_PA_LEVEL, DEFAULT_RF_CHANNEL, MAX_PA_LEVEL, PACKET_SIZE,
};

/// WiFi channel used for logical channel 0 and for pairing
pub const DEFAULT_WIFI_CHANNEL: u8 = 11;

/// Highest WiFi channel
pub const MAX_WIFI_CHANNEL: u8 = 13;

/// Inbound frames buffered between the network callback and the transport
pub const INBOUND_QUEUE_DEPTH: usize = 16;

/// Map a logical channel to a WiFi channel
pub fn wifi_channel(channel: RfChannel) -> u8 {
    if channel == DEFAULT_RF_CHANNEL {
        DEFAULT_WIFI_CHANNEL
    } else {
        channel.min(MAX_WIFI_CHANNEL)
    }
}

/// One frame as delivered by the network stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub from: Address,
    pub data: Vec<u8>,
}

/// Receive-callback side of a [`WifiPeer`]
///
/// Cheap to clone. Delivery never blocks; frames are dropped when the
/// transport has fallen [`INBOUND_QUEUE_DEPTH`] frames behind.
#[derive(Debug, Clone)]
pub struct InboundHandle {
    tx: mpsc::Sender<InboundFrame>,
}

impl InboundHandle {
    /// Hand one received frame to the transport
    pub fn deliver(&self, from: Address, data: &[u8]) -> bool {
        let frame = InboundFrame {
            from,
            data: data.to_vec(),
        };
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping inbound frame from {}: {}", from, e);
                false
            }
        }
    }
}

/// Peer-to-peer network stack
pub trait PeerNetwork: Send {
    /// Start the stack and register the receive callback
    fn init(&mut self, inbound: InboundHandle) -> bool;

    /// Hardware address of this station
    fn mac_address(&self) -> Address;

    /// Make sure `mac` is a known peer on `wifi_channel`
    fn add_or_update_peer(&mut self, mac: Address, wifi_channel: u8);

    /// Send one frame; true if the stack accepted it
    fn send(&mut self, to: Address, frame: &[u8]) -> bool;
}

/// [`Transport`] over a [`PeerNetwork`]
pub struct WifiPeer<N> {
    network: N,
    role: Role,
    own: Address,
    peer: Address,
    rf_channel: RfChannel,
    pa_level: PaLevel,
    pairing: bool,
    handle: InboundHandle,
    inbound: mpsc::Receiver<InboundFrame>,
    latest: Option<InboundFrame>,
    arrivals: u64,
    delivered: u64,
}

impl<N: PeerNetwork> WifiPeer<N> {
    pub fn new(network: N, role: Role) -> Self {
        let (tx, inbound) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        Self {
            network,
            role,
            own: Address::NONE,
            peer: Address::NONE,
            rf_channel: DEFAULT_RF_CHANNEL,
            pa_level: DEFAULT_PA_LEVEL,
            pairing: false,
            handle: InboundHandle { tx },
            inbound,
            latest: None,
            arrivals: 0,
            delivered: 0,
        }
    }

    /// Handle the network stack delivers inbound frames through
    pub fn inbound_handle(&self) -> InboundHandle {
        self.handle.clone()
    }

    fn accepts(&self, frame: &InboundFrame) -> bool {
        if frame.data.len() < PACKET_SIZE {
            debug!("Invalid frame size {} from {}", frame.data.len(), frame.from);
            return false;
        }
        if self.pairing {
            return true;
        }
        if self.peer.is_none() {
            debug!("Ignoring frame from {} while unpaired", frame.from);
            return false;
        }
        if frame.from != self.peer {
            debug!("Ignoring frame from non-paired device {}", frame.from);
            return false;
        }
        true
    }

    /// Move queued frames into the latest-frame slot
    fn pump(&mut self) {
        while let Ok(frame) = self.inbound.try_recv() {
            if self.accepts(&frame) {
                self.latest = Some(frame);
                self.arrivals += 1;
            }
        }
    }

    /// Newest accepted frame not yet handed out, with its sender
    fn take_frame(&mut self) -> Option<(Address, Packet)> {
        self.pump();
        if self.arrivals == self.delivered {
            return None;
        }
        self.delivered = self.arrivals;

        let frame = self.latest.as_ref()?;
        match decode_packet(&frame.data) {
            Ok(packet) => Some((frame.from, packet)),
            Err(e) => {
                debug!("Dropping WiFi frame from {}: {}", frame.from, e);
                None
            }
        }
    }

    async fn pair_as_initiator(&mut self, timeout: Duration) -> TransportResult<Address> {
        let mut session = InitiatorSession::new(self.own);
        let init = encode_packet(&session.init_packet());
        self.network.add_or_update_peer(Address::BROADCAST, DEFAULT_WIFI_CHANNEL);

        let deadline = Deadline::after(timeout);
        while !deadline.expired() {
            self.network.send(Address::BROADCAST, &init);

            if let Some((_, packet)) = self.take_frame() {
                if let Some(peer) = session.on_packet(&packet) {
                    self.peer = peer;
                    self.rf_channel = DEFAULT_RF_CHANNEL;
                    self.network.add_or_update_peer(peer, DEFAULT_WIFI_CHANNEL);
                    if !self.network.send(peer, &encode_packet(&session.paired_packet())) {
                        debug!("PAIRED notice was not accepted by the network");
                    }
                    info!("WiFi paired with {}", peer);
                    return Ok(peer);
                }
            }

            tokio::time::sleep(PAIR_POLL_STEP).await;
        }

        session.fail();
        Err(TransportError::PairingTimeout)
    }

    async fn pair_as_responder(&mut self, timeout: Duration) -> TransportResult<Address> {
        let mut session = ResponderSession::new(self.own);
        let mut reply: Option<(Address, [u8; PACKET_SIZE])> = None;
        let mut ready_count = 0u8;

        let deadline = Deadline::after(timeout);
        while !deadline.expired() {
            match self.take_frame() {
                Some((from, packet)) => match session.on_packet(&packet) {
                    ResponderAction::Reply { to, packet } => {
                        self.network.add_or_update_peer(from, DEFAULT_WIFI_CHANNEL);
                        reply = Some((to, encode_packet(&packet)));
                        ready_count = READY_REPEAT_COUNT;
                    }
                    ResponderAction::Commit(peer) => {
                        self.peer = peer;
                        self.rf_channel = DEFAULT_RF_CHANNEL;
                        self.network.add_or_update_peer(peer, DEFAULT_WIFI_CHANNEL);
                        info!("WiFi paired with {}", peer);
                        return Ok(peer);
                    }
                    ResponderAction::Ignore => {}
                },
                None => tokio::time::sleep(PAIR_POLL_STEP).await,
            }

            if ready_count > 0 {
                if let Some((to, frame)) = &reply {
                    ready_count -= 1;
                    if !self.network.send(*to, frame) {
                        warn!("Error sending pair ready response");
                    }
                    tokio::time::sleep(READY_REPEAT_INTERVAL).await;
                }
            }
        }

        session.fail();
        Err(TransportError::PairingTimeout)
    }
}

#[async_trait]
impl<N: PeerNetwork> Transport for WifiPeer<N> {
    fn kind(&self) -> TransportKind {
        TransportKind::WifiPeer
    }

    fn role(&self) -> Role {
        self.role
    }

    async fn initialize(&mut self, _own: Address, channel: RfChannel, pa_level: PaLevel) -> TransportResult<()> {
        if !self.network.init(self.handle.clone()) {
            warn!("WiFi peer network failed to start");
            return Err(TransportError::InitFailed("peer network did not start".into()));
        }

        // The station address is fixed by the hardware
        self.own = self.network.mac_address();
        self.rf_channel = channel;
        self.pa_level = pa_level.min(MAX_PA_LEVEL);

        if !self.peer.is_none() {
            self.network.add_or_update_peer(self.peer, wifi_channel(channel));
        }
        info!("WiFi up: MAC {}, RF channel {} (WiFi {})", self.own, channel, wifi_channel(channel));
        Ok(())
    }

    async fn set_channel(&mut self, channel: RfChannel) -> TransportResult<()> {
        self.rf_channel = channel;
        if !self.peer.is_none() {
            self.network.add_or_update_peer(self.peer, wifi_channel(channel));
        }
        info!("RF channel: {} (WiFi {})", channel, wifi_channel(channel));
        Ok(())
    }

    async fn set_pa_level(&mut self, level: PaLevel) -> TransportResult<()> {
        // Stored for reporting only; transmit power is fixed by the stack
        self.pa_level = level.min(MAX_PA_LEVEL);
        Ok(())
    }

    async fn set_peer(&mut self, peer: Address) -> TransportResult<()> {
        self.peer = peer;
        if !peer.is_none() {
            self.network.add_or_update_peer(peer, wifi_channel(self.rf_channel));
        }
        Ok(())
    }

    async fn send_request(&mut self, packet: &Packet) -> TransportResult<()> {
        if !self.is_paired() {
            return Err(TransportError::NotPaired);
        }

        if self.network.send(self.peer, &encode_packet(packet)) {
            Ok(())
        } else {
            Err(TransportError::NoAck)
        }
    }

    async fn poll_response(&mut self) -> Option<Packet> {
        let (_, packet) = self.take_frame()?;
        if !self.is_paired() && packet.as_pair().is_none() {
            return None;
        }
        Some(packet)
    }

    async fn run_pairing(&mut self, timeout: Duration) -> TransportResult<Address> {
        self.pairing = true;
        let result = match self.role {
            Role::Initiator => self.pair_as_initiator(timeout).await,
            Role::Responder => self.pair_as_responder(timeout).await,
        };
        self.pairing = false;
        // Frames accepted only because pairing was open must not leak out
        self.delivered = self.arrivals;
        result
    }

    fn peer_address(&self) -> Address {
        self.peer
    }

    fn own_address(&self) -> Address {
        self.own
    }

    fn rf_channel(&self) -> RfChannel {
        self.rf_channel
    }

    fn pa_level(&self) -> PaLevel {
        self.pa_level
    }

    fn unpair(&mut self) {
        info!("WiFi unpaired");
        self.peer = Address::NONE;
    }
}
