//! # Direct Radio Transport
//!
//! Drives an nRF24-class packet transceiver directly.
//!
//! A request is a write to the peer's pipe; the response rides back in the
//! hardware acknowledgment of that same write. The receiver preloads its
//! next response as an ack payload, so a response always answers an
//! earlier request.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Role, Transport, TransportKind, TransportResult};
use crate::error::TransportError;
use crate::pairing::{Deadline, InitiatorSession, ResponderAction, ResponderSession, PAIR_POLL_STEP};
use crate::protocol::decoder::decode_packet;
use crate::protocol::encoder::encode_packet;
use crate::protocol::types::{
    Address, Packet, PaLevel, RfChannel, DEFAULT_PA_LEVEL, DEFAULT_RF_CHANNEL, MAX_PA_LEVEL, PACKET_SIZE,
};

/// Native channel used for logical channel 0 and for pairing
pub const NRF24_DEFAULT_CHANNEL: u8 = 76;

/// Highest native channel
pub const NRF24_MAX_CHANNEL: u8 = 125;

pub const NRF24_MAX_PA_LEVEL: PaLevel = MAX_PA_LEVEL;

/// Map a logical channel to the chip's channel numbering
pub fn native_channel(channel: RfChannel) -> u8 {
    if channel == DEFAULT_RF_CHANNEL {
        NRF24_DEFAULT_CHANNEL
    } else {
        channel.min(NRF24_MAX_CHANNEL)
    }
}

/// Register-level operations of the transceiver
///
/// Auto-retransmission is configured by the chip driver; `write` returns
/// whether the frame was finally acknowledged.
pub trait RadioChip: Send {
    /// Power up and probe the chip
    fn begin(&mut self) -> bool;

    fn set_channel(&mut self, native: u8);

    fn set_pa_level(&mut self, level: PaLevel);

    fn open_writing_pipe(&mut self, address: &Address);

    fn open_reading_pipe(&mut self, address: &Address);

    fn start_listening(&mut self);

    /// Leave receive mode; pending ack payloads are flushed
    fn stop_listening(&mut self);

    /// Send one frame and wait for its acknowledgment
    fn write(&mut self, frame: &[u8]) -> bool;

    /// An acknowledgment carried a payload that has not been read yet
    fn is_ack_payload_available(&mut self) -> bool;

    /// A frame is waiting in the receive FIFO
    fn available(&mut self) -> bool;

    /// Pop one frame from the receive FIFO
    fn read(&mut self) -> [u8; PACKET_SIZE];

    /// Queue the payload for the next acknowledgment on the reading pipe
    fn write_ack_payload(&mut self, frame: &[u8]);
}

/// [`Transport`] over a [`RadioChip`]
pub struct DirectRadio<C> {
    chip: C,
    role: Role,
    own: Address,
    peer: Address,
    rf_channel: RfChannel,
    pa_level: PaLevel,
}

impl<C: RadioChip> DirectRadio<C> {
    pub fn new(chip: C, role: Role) -> Self {
        Self {
            chip,
            role,
            own: Address::NONE,
            peer: Address::NONE,
            rf_channel: DEFAULT_RF_CHANNEL,
            pa_level: DEFAULT_PA_LEVEL,
        }
    }

    fn listen_on(&mut self, address: Address) {
        self.chip.stop_listening();
        self.chip.open_reading_pipe(&address);
        self.chip.start_listening();
    }

    /// Pop the next inbound frame, from the ack FIFO or the receive FIFO
    fn next_frame(&mut self) -> Option<[u8; PACKET_SIZE]> {
        let ready = match self.role {
            Role::Initiator => self.chip.is_ack_payload_available(),
            Role::Responder => self.chip.available(),
        };
        ready.then(|| self.chip.read())
    }

    async fn pair_as_initiator(&mut self, timeout: Duration) -> TransportResult<Address> {
        let mut session = InitiatorSession::new(self.own);
        let init = encode_packet(&session.init_packet());

        self.chip.stop_listening();
        self.chip.open_writing_pipe(&Address::BROADCAST);
        self.chip.set_channel(NRF24_DEFAULT_CHANNEL);

        let deadline = Deadline::after(timeout);
        while !deadline.expired() {
            self.chip.write(&init);

            while let Some(frame) = self.next_frame() {
                let Ok(packet) = decode_packet(&frame) else {
                    continue;
                };
                if let Some(peer) = session.on_packet(&packet) {
                    if !self.chip.write(&encode_packet(&session.paired_packet())) {
                        debug!("PAIRED notice was not acknowledged");
                    }
                    self.peer = peer;
                    self.rf_channel = DEFAULT_RF_CHANNEL;
                    self.chip.open_writing_pipe(&peer);
                    self.chip.set_channel(NRF24_DEFAULT_CHANNEL);
                    info!("Radio paired with {}", peer);
                    return Ok(peer);
                }
            }

            tokio::time::sleep(PAIR_POLL_STEP).await;
        }

        session.fail();
        self.chip.open_writing_pipe(&self.peer);
        self.chip.set_channel(native_channel(self.rf_channel));
        Err(TransportError::PairingTimeout)
    }

    async fn pair_as_responder(&mut self, timeout: Duration) -> TransportResult<Address> {
        let mut session = ResponderSession::new(self.own);

        self.listen_on(Address::BROADCAST);
        self.chip.set_channel(NRF24_DEFAULT_CHANNEL);

        let deadline = Deadline::after(timeout);
        while !deadline.expired() {
            while let Some(frame) = self.next_frame() {
                let Ok(packet) = decode_packet(&frame) else {
                    continue;
                };
                match session.on_packet(&packet) {
                    ResponderAction::Reply { packet, .. } => {
                        self.chip.write_ack_payload(&encode_packet(&packet));
                    }
                    ResponderAction::Commit(peer) => {
                        self.peer = peer;
                        self.rf_channel = DEFAULT_RF_CHANNEL;
                        self.listen_on(self.own);
                        self.chip.set_channel(NRF24_DEFAULT_CHANNEL);
                        info!("Radio paired with {}", peer);
                        return Ok(peer);
                    }
                    ResponderAction::Ignore => {}
                }
            }

            tokio::time::sleep(PAIR_POLL_STEP).await;
        }

        session.fail();
        self.listen_on(self.own);
        self.chip.set_channel(native_channel(self.rf_channel));
        Err(TransportError::PairingTimeout)
    }
}

#[async_trait]
impl<C: RadioChip> Transport for DirectRadio<C> {
    fn kind(&self) -> TransportKind {
        TransportKind::DirectRadio
    }

    fn role(&self) -> Role {
        self.role
    }

    async fn initialize(&mut self, own: Address, channel: RfChannel, pa_level: PaLevel) -> TransportResult<()> {
        if !self.chip.begin() {
            warn!("Radio chip did not respond");
            return Err(TransportError::InitFailed("radio chip did not respond".into()));
        }

        self.own = own;
        self.rf_channel = channel;
        self.pa_level = pa_level.min(NRF24_MAX_PA_LEVEL);
        self.chip.set_pa_level(self.pa_level);
        self.chip.set_channel(native_channel(channel));

        match self.role {
            Role::Initiator => {
                self.chip.stop_listening();
                self.chip.open_writing_pipe(&self.peer);
            }
            Role::Responder => self.listen_on(own),
        }

        info!(
            "Radio up: addr {}, RF channel {} (native {})",
            own,
            channel,
            native_channel(channel)
        );
        Ok(())
    }

    async fn set_channel(&mut self, channel: RfChannel) -> TransportResult<()> {
        self.rf_channel = channel;
        self.chip.set_channel(native_channel(channel));
        info!("RF channel: {} (native {})", channel, native_channel(channel));
        Ok(())
    }

    async fn set_pa_level(&mut self, level: PaLevel) -> TransportResult<()> {
        self.pa_level = level.min(NRF24_MAX_PA_LEVEL);
        self.chip.set_pa_level(self.pa_level);
        info!("PA level: {}", self.pa_level);
        Ok(())
    }

    async fn set_peer(&mut self, peer: Address) -> TransportResult<()> {
        self.peer = peer;
        if self.role == Role::Initiator {
            self.chip.stop_listening();
            self.chip.open_writing_pipe(&peer);
        }
        Ok(())
    }

    async fn send_request(&mut self, packet: &Packet) -> TransportResult<()> {
        if !self.is_paired() {
            return Err(TransportError::NotPaired);
        }

        let frame = encode_packet(packet);
        match self.role {
            Role::Initiator => {
                if self.chip.write(&frame) {
                    Ok(())
                } else {
                    Err(TransportError::NoAck)
                }
            }
            Role::Responder => {
                self.chip.write_ack_payload(&frame);
                Ok(())
            }
        }
    }

    async fn poll_response(&mut self) -> Option<Packet> {
        let frame = self.next_frame()?;

        let packet = match decode_packet(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping radio frame: {}", e);
                return None;
            }
        };

        if !self.is_paired() && packet.as_pair().is_none() {
            debug!("Dropping {:?} while unpaired", packet.packet_type());
            return None;
        }
        Some(packet)
    }

    async fn run_pairing(&mut self, timeout: Duration) -> TransportResult<Address> {
        match self.role {
            Role::Initiator => self.pair_as_initiator(timeout).await,
            Role::Responder => self.pair_as_responder(timeout).await,
        }
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
        info!("Radio unpaired");
        self.peer = Address::NONE;
    }
}
