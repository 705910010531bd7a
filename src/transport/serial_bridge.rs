//! # Serial Bridge Transport
//!
//! The physical radio belongs to a co-processor; this side drives it over a
//! [`BridgeBus`] with the status/data sub-protocol from [`crate::serial::bus`].
//!
//! Every operation follows the same shape:
//!
//! 1. Write a request status (and its data block, if any)
//! 2. Poll the status word until it changes or the operation times out
//! 3. Release the bus by writing `OK`
//!
//! The only exception is a send whose status moves to `RECEIVING`: the
//! co-processor is then holding a response, which [`Transport::poll_response`]
//! reads and releases. The status word is never left mid-`TRANSMITTING`.

use async_trait::async_trait;
use bytes::BufMut;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{Role, Transport, TransportKind, TransportResult};
use crate::error::TransportError;
use crate::pairing::Deadline;
use crate::protocol::decoder::decode_packet;
use crate::protocol::encoder::encode_packet;
use crate::protocol::types::{
    Address, Packet, PaLevel, PairStatus, RfChannel, DEFAULT_PA_LEVEL, DEFAULT_RF_CHANNEL, MAX_PA_LEVEL,
    PACKET_SIZE,
};
use crate::transport::direct_radio::NRF24_MAX_CHANNEL;
use crate::serial::bus::{read_data, read_status, write_data, write_status, BridgeStatus, BRIDGE_DATA_SIZE};
use crate::serial::port_trait::BridgeBus;

/// Time allowed for the co-processor to leave `STARTING`
pub const INIT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Start-up attempts before giving up
pub const INIT_RETRY_COUNT: usize = 5;

/// Pause between start-up attempts
pub const INIT_RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Time allowed for one send or configuration operation
pub const SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// Attempts for one outgoing radio frame
pub const SEND_RETRY_COUNT: usize = 3;

/// Time the co-processor gets to find a receiver
pub const BRIDGE_PAIR_TIMEOUT: Duration = Duration::from_millis(5000);

/// Status polling interval
pub const POLL_STEP: Duration = Duration::from_millis(1);

/// Bridge request types, outside the radio packet range
pub const BRIDGE_PACKET_SET_PEER_ADDRESS: u16 = 0x0b01;
pub const BRIDGE_PACKET_SET_RF_CHANNEL: u16 = 0x0b02;
pub const BRIDGE_PACKET_PAIRING: u16 = 0x0b03;
pub const BRIDGE_PACKET_SET_PA_LEVEL: u16 = 0x0b04;

/// Configuration requests understood by the co-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRequest {
    SetPeerAddress(Address),
    SetRfChannel(RfChannel),
    SetPaLevel(PaLevel),
    Pairing,
}

impl BridgeRequest {
    /// Status word announcing this request
    pub fn status(&self) -> BridgeStatus {
        match self {
            BridgeRequest::SetPeerAddress(_) => BridgeStatus::SetPeerAddress,
            BridgeRequest::SetRfChannel(_) => BridgeStatus::SetRfChannel,
            BridgeRequest::SetPaLevel(_) => BridgeStatus::SetPaLevel,
            BridgeRequest::Pairing => BridgeStatus::Pairing,
        }
    }

    /// Zero-padded data block
    pub fn encode(&self) -> [u8; BRIDGE_DATA_SIZE] {
        let mut block = [0u8; BRIDGE_DATA_SIZE];
        let mut buf = &mut block[..];

        match self {
            BridgeRequest::SetPeerAddress(address) => {
                buf.put_u16_le(BRIDGE_PACKET_SET_PEER_ADDRESS);
                buf.put_slice(address.as_bytes());
            }
            BridgeRequest::SetRfChannel(channel) => {
                buf.put_u16_le(BRIDGE_PACKET_SET_RF_CHANNEL);
                buf.put_u8(*channel);
            }
            BridgeRequest::SetPaLevel(level) => {
                buf.put_u16_le(BRIDGE_PACKET_SET_PA_LEVEL);
                buf.put_u8(*level);
            }
            BridgeRequest::Pairing => buf.put_u16_le(BRIDGE_PACKET_PAIRING),
        }

        block
    }
}

/// [`Transport`] driving a radio co-processor
///
/// Transmitter side only: the co-processor runs the responder logic itself.
pub struct SerialBridge<B> {
    bus: B,
    own: Address,
    peer: Address,
    rf_channel: RfChannel,
    pa_level: PaLevel,
}

impl<B: BridgeBus> SerialBridge<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            own: Address::NONE,
            peer: Address::NONE,
            rf_channel: DEFAULT_RF_CHANNEL,
            pa_level: DEFAULT_PA_LEVEL,
        }
    }

    /// Poll until the status differs from `from` or `timeout` elapses
    async fn wait_for_change(&mut self, from: BridgeStatus, timeout: Duration) -> TransportResult<BridgeStatus> {
        let deadline = Deadline::after(timeout);
        loop {
            let status = read_status(&mut self.bus).await?;
            if status != from || deadline.expired() {
                return Ok(status);
            }
            sleep(POLL_STEP).await;
        }
    }

    /// Write `OK`, logging instead of failing
    async fn release(&mut self) {
        if let Err(e) = write_status(&mut self.bus, BridgeStatus::Ok).await {
            warn!("Failed to release bridge bus: {}", e);
        }
    }

    /// One status + data exchange
    async fn exchange(&mut self, status: BridgeStatus, data: &[u8]) -> TransportResult<()> {
        let result = self.try_exchange(status, data).await;
        match &result {
            Ok(BridgeStatus::Receiving) => {}
            _ => self.release().await,
        }
        result.map(|_| ())
    }

    async fn try_exchange(&mut self, status: BridgeStatus, data: &[u8]) -> TransportResult<BridgeStatus> {
        write_status(&mut self.bus, status).await?;
        write_data(&mut self.bus, data).await?;

        match self.wait_for_change(status, SEND_TIMEOUT).await? {
            new if new == status => Err(TransportError::BusTimeout(status)),
            BridgeStatus::Failure => Err(TransportError::Status(BridgeStatus::Failure)),
            new => Ok(new),
        }
    }

    async fn configure(&mut self, request: BridgeRequest) -> TransportResult<()> {
        debug!("Bridge request {:?}", request);
        self.exchange(request.status(), &request.encode()).await
    }

    async fn start_coprocessor(&mut self) -> TransportResult<BridgeStatus> {
        let mut status = BridgeStatus::Starting;

        for attempt in 1..=INIT_RETRY_COUNT {
            write_status(&mut self.bus, BridgeStatus::Starting).await?;
            status = self.wait_for_change(BridgeStatus::Starting, INIT_TIMEOUT).await?;
            if status == BridgeStatus::Ok {
                break;
            }
            debug!("Co-processor start attempt {} ended in {:?}", attempt, status);
            sleep(INIT_RETRY_PAUSE).await;
        }

        Ok(status)
    }

    /// Pairing request and result polling; the caller releases the bus
    async fn try_pairing(&mut self, timeout: Duration) -> TransportResult<Address> {
        let request = BridgeRequest::Pairing;
        write_status(&mut self.bus, request.status()).await?;
        write_data(&mut self.bus, &request.encode()).await?;

        let deadline = Deadline::after(timeout);
        while !deadline.expired() {
            if read_status(&mut self.bus).await? == BridgeStatus::Paired {
                let block = read_data(&mut self.bus).await?;
                match decode_packet(&block[..PACKET_SIZE]) {
                    Ok(Packet::Pair(pair)) if pair.status == PairStatus::Ready && !pair.sender.is_none() => {
                        self.peer = pair.sender;
                        return Ok(pair.sender);
                    }
                    other => {
                        debug!("Ignoring bridge pairing result {:?}", other);
                        write_status(&mut self.bus, BridgeStatus::Pairing).await?;
                    }
                }
            }
            sleep(POLL_STEP).await;
        }

        Err(TransportError::PairingTimeout)
    }
}

#[async_trait]
impl<B: BridgeBus> Transport for SerialBridge<B> {
    fn kind(&self) -> TransportKind {
        TransportKind::SerialBridge
    }

    fn role(&self) -> Role {
        Role::Initiator
    }

    async fn initialize(&mut self, own: Address, channel: RfChannel, pa_level: PaLevel) -> TransportResult<()> {
        let status = match self.start_coprocessor().await {
            Ok(status) => status,
            Err(e) => {
                self.release().await;
                return Err(e);
            }
        };

        if status != BridgeStatus::Ok {
            warn!("Co-processor did not start: {:?}", status);
            self.release().await;
            return Err(TransportError::InitFailed(format!("co-processor status {:?}", status)));
        }
        info!("Radio co-processor ready");

        // The co-processor radio is nRF24-class
        let channel = channel.min(NRF24_MAX_CHANNEL);
        let pa_level = pa_level.min(MAX_PA_LEVEL);
        self.configure(BridgeRequest::SetRfChannel(channel)).await?;
        self.configure(BridgeRequest::SetPaLevel(pa_level)).await?;

        self.own = own;
        self.rf_channel = channel;
        self.pa_level = pa_level;
        Ok(())
    }

    async fn set_channel(&mut self, channel: RfChannel) -> TransportResult<()> {
        let channel = channel.min(NRF24_MAX_CHANNEL);
        self.configure(BridgeRequest::SetRfChannel(channel)).await?;
        self.rf_channel = channel;
        info!("RF channel: {}", channel);
        Ok(())
    }

    async fn set_pa_level(&mut self, level: PaLevel) -> TransportResult<()> {
        let level = level.min(MAX_PA_LEVEL);
        self.configure(BridgeRequest::SetPaLevel(level)).await?;
        self.pa_level = level;
        info!("PA level: {}", level);
        Ok(())
    }

    async fn set_peer(&mut self, peer: Address) -> TransportResult<()> {
        self.configure(BridgeRequest::SetPeerAddress(peer)).await?;
        self.peer = peer;
        Ok(())
    }

    async fn send_request(&mut self, packet: &Packet) -> TransportResult<()> {
        if !self.is_paired() {
            return Err(TransportError::NotPaired);
        }

        let frame = encode_packet(packet);
        let mut last_error = TransportError::NoAck;

        for attempt in 1..=SEND_RETRY_COUNT {
            match self.exchange(BridgeStatus::Transmitting, &frame).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Bridge send attempt {} failed: {}", attempt, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn poll_response(&mut self) -> Option<Packet> {
        match read_status(&mut self.bus).await {
            Ok(BridgeStatus::Receiving) => {}
            Ok(_) => return None,
            Err(e) => {
                warn!("Bridge status read failed: {}", e);
                return None;
            }
        }

        let block = read_data(&mut self.bus).await;
        self.release().await;

        let block = match block {
            Ok(block) => block,
            Err(e) => {
                warn!("Bridge data read failed: {}", e);
                return None;
            }
        };

        match decode_packet(&block[..PACKET_SIZE]) {
            Ok(packet) if self.is_paired() || packet.as_pair().is_some() => Some(packet),
            Ok(packet) => {
                debug!("Dropping {:#06x} while unpaired", packet.packet_type());
                None
            }
            Err(e) => {
                debug!("Dropping bridge frame: {}", e);
                None
            }
        }
    }

    async fn run_pairing(&mut self, timeout: Duration) -> TransportResult<Address> {
        info!("Bridge pairing started");
        let result = self.try_pairing(timeout).await;
        self.release().await;

        match &result {
            Ok(peer) => info!("Bridge paired with {}", peer),
            Err(TransportError::PairingTimeout) => info!("Bridge not paired"),
            Err(e) => warn!("Bridge pairing failed: {}", e),
        }
        result
    }

    fn pairing_timeout(&self) -> Duration {
        BRIDGE_PAIR_TIMEOUT
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
        info!("Bridge unpaired");
        self.peer = Address::NONE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder::encode_into;
    use crate::protocol::types::{ControlFrame, PairPacket};
    use crate::serial::port_trait::mocks::MockCoprocessor;
    use tokio::time::Instant;

    const OWN: Address = Address([1, 1, 1, 1, 1, 1]);
    const PEER: Address = Address([2, 2, 2, 2, 2, 2]);

    fn block_of(packet: &Packet) -> [u8; BRIDGE_DATA_SIZE] {
        let mut block = [0u8; BRIDGE_DATA_SIZE];
        encode_into(packet, &mut block);
        block
    }

    fn cooperative() -> MockCoprocessor {
        let coprocessor = MockCoprocessor::new();
        coprocessor.react(BridgeStatus::Starting, 2, BridgeStatus::Ok);
        coprocessor.react(BridgeStatus::SetRfChannel, 0, BridgeStatus::Ok);
        coprocessor.react(BridgeStatus::SetPaLevel, 0, BridgeStatus::Ok);
        coprocessor.react(BridgeStatus::SetPeerAddress, 0, BridgeStatus::Ok);
        coprocessor.react(BridgeStatus::Transmitting, 1, BridgeStatus::Ok);
        coprocessor
    }

    async fn paired_bridge(coprocessor: &MockCoprocessor) -> SerialBridge<MockCoprocessor> {
        let mut bridge = SerialBridge::new(coprocessor.clone());
        bridge.initialize(OWN, 4, 2).await.unwrap();
        bridge.set_peer(PEER).await.unwrap();
        bridge
    }

    #[test]
    fn test_request_encoding() {
        let block = BridgeRequest::SetPeerAddress(PEER).encode();
        assert_eq!(&block[..8], &[0x01, 0x0b, 2, 2, 2, 2, 2, 2]);
        assert!(block[8..].iter().all(|&b| b == 0));

        assert_eq!(&BridgeRequest::SetRfChannel(7).encode()[..3], &[0x02, 0x0b, 7]);
        assert_eq!(&BridgeRequest::Pairing.encode()[..2], &[0x03, 0x0b]);
        assert_eq!(&BridgeRequest::SetPaLevel(3).encode()[..3], &[0x04, 0x0b, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_configures_coprocessor() {
        let coprocessor = cooperative();
        let mut bridge = SerialBridge::new(coprocessor.clone());

        bridge.initialize(OWN, 4, 2).await.unwrap();

        assert_eq!(bridge.own_address(), OWN);
        assert_eq!(bridge.rf_channel(), 4);
        assert_eq!(bridge.pa_level(), 2);
        assert_eq!(coprocessor.status(), BridgeStatus::Ok);

        let writes = coprocessor.data_writes();
        assert_eq!(&writes[0][..3], &[0x02, 0x0b, 4]);
        assert_eq!(&writes[1][..3], &[0x04, 0x0b, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_gives_up_after_retries() {
        let coprocessor = MockCoprocessor::new();
        let mut bridge = SerialBridge::new(coprocessor.clone());

        let started = Instant::now();
        let result = bridge.initialize(OWN, 0, 0).await;

        assert!(matches!(result, Err(TransportError::InitFailed(_))));
        let starts = coprocessor
            .status_writes()
            .iter()
            .filter(|&&s| s == BridgeStatus::Starting)
            .count();
        assert_eq!(starts, INIT_RETRY_COUNT);
        assert!(started.elapsed() >= (INIT_TIMEOUT + INIT_RETRY_PAUSE) * INIT_RETRY_COUNT as u32);
        assert_eq!(coprocessor.status(), BridgeStatus::Ok);
        assert_eq!(bridge.own_address(), Address::NONE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_retries_after_failure_status() {
        let coprocessor = cooperative();
        coprocessor.react(BridgeStatus::Starting, 0, BridgeStatus::Failure);
        let mut bridge = SerialBridge::new(coprocessor.clone());

        let result = bridge.initialize(OWN, 0, 0).await;
        assert!(matches!(result, Err(TransportError::InitFailed(_))));
        assert_eq!(coprocessor.status_writes().len(), INIT_RETRY_COUNT + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_and_pa_are_clamped() {
        let coprocessor = cooperative();
        let mut bridge = SerialBridge::new(coprocessor.clone());

        bridge.initialize(OWN, 200, 7).await.unwrap();
        assert_eq!(bridge.rf_channel(), NRF24_MAX_CHANNEL);
        assert_eq!(bridge.pa_level(), MAX_PA_LEVEL);

        bridge.set_channel(255).await.unwrap();
        bridge.set_pa_level(9).await.unwrap();
        assert_eq!(bridge.rf_channel(), NRF24_MAX_CHANNEL);
        assert_eq!(bridge.pa_level(), MAX_PA_LEVEL);

        let writes = coprocessor.data_writes();
        assert_eq!(&writes[0][..3], &[0x02, 0x0b, NRF24_MAX_CHANNEL]);
        assert_eq!(&writes[1][..3], &[0x04, 0x0b, MAX_PA_LEVEL]);
        assert_eq!(&writes[2][..3], &[0x02, 0x0b, NRF24_MAX_CHANNEL]);
        assert_eq!(&writes[3][..3], &[0x04, 0x0b, MAX_PA_LEVEL]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_success_releases_bus() {
        let coprocessor = cooperative();
        let mut bridge = paired_bridge(&coprocessor).await;

        let control = Packet::Control(ControlFrame::neutral());
        bridge.send_request(&control).await.unwrap();

        assert_eq!(coprocessor.status(), BridgeStatus::Ok);
        let last = *coprocessor.data_writes().last().unwrap();
        assert_eq!(&last[..PACKET_SIZE], &encode_packet(&control));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_peer() {
        let coprocessor = cooperative();
        let mut bridge = SerialBridge::new(coprocessor.clone());
        bridge.initialize(OWN, 0, 0).await.unwrap();

        let result = bridge.send_request(&Packet::SetPaLevel(1)).await;
        assert!(matches!(result, Err(TransportError::NotPaired)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_stuck_transmitting_ends_terminal() {
        let coprocessor = cooperative();
        let mut bridge = paired_bridge(&coprocessor).await;
        coprocessor.react(BridgeStatus::Transmitting, usize::MAX, BridgeStatus::Ok);

        let started = Instant::now();
        let result = bridge.send_request(&Packet::Control(ControlFrame::neutral())).await;

        assert!(matches!(
            result,
            Err(TransportError::BusTimeout(BridgeStatus::Transmitting))
        ));
        assert!(started.elapsed() >= SEND_TIMEOUT * SEND_RETRY_COUNT as u32);
        assert!(coprocessor.status().is_terminal());
        assert_eq!(*coprocessor.status_writes().last().unwrap(), BridgeStatus::Ok);

        let transmits = coprocessor
            .status_writes()
            .iter()
            .filter(|&&s| s == BridgeStatus::Transmitting)
            .count();
        assert_eq!(transmits, SEND_RETRY_COUNT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_status() {
        let coprocessor = cooperative();
        let mut bridge = paired_bridge(&coprocessor).await;
        coprocessor.react(BridgeStatus::Transmitting, 0, BridgeStatus::Failure);

        let result = bridge.send_request(&Packet::SetRfChannel(1)).await;
        assert!(matches!(result, Err(TransportError::Status(BridgeStatus::Failure))));
        assert_eq!(coprocessor.status(), BridgeStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_bus_error() {
        let coprocessor = cooperative();
        let mut bridge = paired_bridge(&coprocessor).await;
        coprocessor.set_fail_transfers(true);

        let result = bridge.send_request(&Packet::SetRfChannel(1)).await;
        assert!(matches!(result, Err(TransportError::Bus(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_send() {
        let coprocessor = cooperative();
        let mut bridge = paired_bridge(&coprocessor).await;

        let telemetry = Packet::Telemetry { battery_mv: 3650 };
        coprocessor.react_with_block(
            BridgeStatus::Transmitting,
            0,
            BridgeStatus::Receiving,
            Some(block_of(&telemetry)),
        );

        bridge.send_request(&Packet::Control(ControlFrame::neutral())).await.unwrap();
        assert_eq!(coprocessor.status(), BridgeStatus::Receiving);

        assert_eq!(bridge.poll_response().await, Some(telemetry));
        assert_eq!(coprocessor.status(), BridgeStatus::Ok);
        assert_eq!(bridge.poll_response().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_drops_unknown_block() {
        let coprocessor = cooperative();
        let mut bridge = paired_bridge(&coprocessor).await;

        let mut block = [0u8; BRIDGE_DATA_SIZE];
        block[0] = 0x01;
        block[1] = 0x0b;
        coprocessor.deliver(BridgeStatus::Receiving, block);

        assert_eq!(bridge.poll_response().await, None);
        assert_eq!(coprocessor.status(), BridgeStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_success() {
        let coprocessor = cooperative();
        let mut bridge = SerialBridge::new(coprocessor.clone());
        bridge.initialize(OWN, 0, 0).await.unwrap();

        let ready = Packet::Pair(PairPacket {
            status: PairStatus::Ready,
            session: 99,
            sender: PEER,
        });
        coprocessor.react_with_block(BridgeStatus::Pairing, 20, BridgeStatus::Paired, Some(block_of(&ready)));

        let peer = bridge.run_pairing(BRIDGE_PAIR_TIMEOUT).await.unwrap();
        assert_eq!(peer, PEER);
        assert!(bridge.is_paired());
        assert_eq!(coprocessor.status(), BridgeStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_timeout_keeps_peer() {
        let coprocessor = cooperative();
        let mut bridge = paired_bridge(&coprocessor).await;

        let started = Instant::now();
        let result = bridge.run_pairing(bridge.pairing_timeout()).await;

        assert!(matches!(result, Err(TransportError::PairingTimeout)));
        assert!(started.elapsed() >= BRIDGE_PAIR_TIMEOUT);
        assert_eq!(bridge.peer_address(), PEER);
        assert_eq!(coprocessor.status(), BridgeStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_bus_error_releases_bridge() {
        let coprocessor = cooperative();
        let mut bridge = SerialBridge::new(coprocessor.clone());
        bridge.initialize(OWN, 0, 0).await.unwrap();

        // Status write and request block go through, the first status poll fails
        coprocessor.fail_transfers_after(2, 1);
        let result = bridge.run_pairing(BRIDGE_PAIR_TIMEOUT).await;

        assert!(matches!(result, Err(TransportError::Bus(_))));
        assert!(!bridge.is_paired());
        assert!(coprocessor.status().is_terminal(), "bridge left in {:?}", coprocessor.status());
        assert_eq!(*coprocessor.status_writes().last().unwrap(), BridgeStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_result_read_error_releases_bridge() {
        let coprocessor = cooperative();
        let mut bridge = SerialBridge::new(coprocessor.clone());
        bridge.initialize(OWN, 0, 0).await.unwrap();

        let ready = Packet::Pair(PairPacket {
            status: PairStatus::Ready,
            session: 7,
            sender: PEER,
        });
        coprocessor.react_with_block(BridgeStatus::Pairing, 0, BridgeStatus::Paired, Some(block_of(&ready)));

        // Status write, request block and status poll succeed, the result read fails
        coprocessor.fail_transfers_after(3, 1);
        let result = bridge.run_pairing(BRIDGE_PAIR_TIMEOUT).await;

        assert!(matches!(result, Err(TransportError::Bus(_))));
        assert_eq!(bridge.peer_address(), Address::NONE);
        assert_eq!(coprocessor.status(), BridgeStatus::Ok);
    }
}
