//! Transport whose outcomes are set by the test

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use super::{Role, Transport, TransportKind, TransportResult};
use crate::error::TransportError;
use crate::protocol::types::{Address, Packet, PaLevel, RfChannel, DEFAULT_RF_CHANNEL};

pub struct ScriptedTransport {
    pub role: Role,
    pub fail_init: bool,
    pub fail_sends: bool,
    pub sent: Vec<Packet>,
    pub inbound: VecDeque<Packet>,
    pub pair_result: Option<Address>,
    pub pair_calls: usize,
    pub own: Address,
    pub peer: Address,
    pub rf_channel: RfChannel,
    pub pa_level: PaLevel,
}

impl ScriptedTransport {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            fail_init: false,
            fail_sends: false,
            sent: Vec::new(),
            inbound: VecDeque::new(),
            pair_result: None,
            pair_calls: 0,
            own: Address::NONE,
            peer: Address::NONE,
            rf_channel: DEFAULT_RF_CHANNEL,
            pa_level: 0,
        }
    }

    pub fn paired_with(role: Role, peer: Address) -> Self {
        Self {
            peer,
            ..Self::new(role)
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::DirectRadio
    }

    fn role(&self) -> Role {
        self.role
    }

    async fn initialize(&mut self, own: Address, channel: RfChannel, pa_level: PaLevel) -> TransportResult<()> {
        if self.fail_init {
            return Err(TransportError::InitFailed("scripted".into()));
        }
        self.own = own;
        self.rf_channel = channel;
        self.pa_level = pa_level;
        Ok(())
    }

    async fn set_channel(&mut self, channel: RfChannel) -> TransportResult<()> {
        self.rf_channel = channel;
        Ok(())
    }

    async fn set_pa_level(&mut self, level: PaLevel) -> TransportResult<()> {
        self.pa_level = level;
        Ok(())
    }

    async fn set_peer(&mut self, peer: Address) -> TransportResult<()> {
        self.peer = peer;
        Ok(())
    }

    async fn send_request(&mut self, packet: &Packet) -> TransportResult<()> {
        self.sent.push(*packet);
        if self.fail_sends {
            Err(TransportError::NoAck)
        } else {
            Ok(())
        }
    }

    async fn poll_response(&mut self) -> Option<Packet> {
        self.inbound.pop_front()
    }

    async fn run_pairing(&mut self, _timeout: Duration) -> TransportResult<Address> {
        self.pair_calls += 1;
        let peer = self.pair_result.ok_or(TransportError::PairingTimeout)?;
        self.peer = peer;
        self.rf_channel = DEFAULT_RF_CHANNEL;
        Ok(peer)
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
        self.peer = Address::NONE;
    }
}
