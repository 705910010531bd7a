//! # Pairing State Machine
//!
//! The handshake that teaches a transmitter (initiator) and a receiver
//! (responder) each other's address.
//!
//! ```text
//! initiator                          responder
//!   Pair{INIT, s, tx}   ───────────▶  lock session s, candidate = tx
//!                       ◀───────────  Pair{READY, s, rx}   (repeated)
//!   peer = rx
//!   Pair{PAIRED, s, tx} ───────────▶  peer = candidate
//! ```
//!
//! The session types here are pure: transports feed them decoded packets and
//! act on what they return, so the handshake rules are shared by every backend.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::protocol::types::{Address, Packet, PairPacket, PairStatus};

/// Overall initiator timeout
pub const INITIATOR_PAIR_TIMEOUT: Duration = Duration::from_millis(3000);

/// Overall responder timeout
pub const RESPONDER_PAIR_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Pause between handshake iterations
pub const PAIR_POLL_STEP: Duration = Duration::from_millis(5);

/// How many times a responder repeats READY to survive lost frames
pub const READY_REPEAT_COUNT: u8 = 10;

/// Pause between repeated READY frames
pub const READY_REPEAT_INTERVAL: Duration = Duration::from_millis(5);

/// Session ids are drawn from `0..SESSION_ID_LIMIT`
pub const SESSION_ID_LIMIT: u16 = 1 << 15;

/// Pairing progress of one side of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Unpaired,
    Pairing,
    Paired,
    /// Initiator gave up; the transport is back in its prior configuration
    Failed,
}

/// Pick a random session id
pub fn generate_session_id() -> u16 {
    rand::thread_rng().gen_range(0..SESSION_ID_LIMIT)
}

/// Point in time a bounded loop must stop at, measured on the tokio clock
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            end: Instant::now() + timeout,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.end
    }

    pub fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Transmitter side of the handshake
#[derive(Debug, Clone)]
pub struct InitiatorSession {
    own: Address,
    session: u16,
    state: PairingState,
    peer: Option<Address>,
}

impl InitiatorSession {
    /// Start a session with a fresh random id
    pub fn new(own: Address) -> Self {
        Self::with_session(own, generate_session_id())
    }

    pub fn with_session(own: Address, session: u16) -> Self {
        info!("Starting pairing session {}", session);
        Self {
            own,
            session,
            state: PairingState::Pairing,
            peer: None,
        }
    }

    pub fn session(&self) -> u16 {
        self.session
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Responder learned so far
    pub fn peer(&self) -> Option<Address> {
        self.peer
    }

    /// The INIT probe to broadcast
    pub fn init_packet(&self) -> Packet {
        self.packet(PairStatus::Init)
    }

    /// The PAIRED notice sent once a responder is adopted
    pub fn paired_packet(&self) -> Packet {
        self.packet(PairStatus::Paired)
    }

    fn packet(&self, status: PairStatus) -> Packet {
        Packet::Pair(PairPacket {
            status,
            session: self.session,
            sender: self.own,
        })
    }

    /// Feed an inbound packet; returns the responder address once adopted
    ///
    /// Only a READY carrying this session id is accepted. Everything else,
    /// including non-pair packets, is ignored.
    pub fn on_packet(&mut self, packet: &Packet) -> Option<Address> {
        if self.state != PairingState::Pairing {
            return None;
        }

        let pair = packet.as_pair()?;
        if pair.status != PairStatus::Ready {
            return None;
        }
        if pair.session != self.session {
            debug!("Ignoring READY for session {} (ours is {})", pair.session, self.session);
            return None;
        }
        if pair.sender.is_none() || pair.sender.is_broadcast() {
            debug!("Ignoring READY with reserved sender {}", pair.sender);
            return None;
        }

        info!("Responder {} ready in session {}", pair.sender, self.session);
        self.peer = Some(pair.sender);
        self.state = PairingState::Paired;
        self.peer
    }

    /// Mark the attempt as timed out
    pub fn fail(&mut self) {
        info!("Pairing session {} timed out", self.session);
        self.state = PairingState::Failed;
        self.peer = None;
    }
}

/// What a responder transport should do after feeding a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderAction {
    /// Nothing to do
    Ignore,
    /// Reply with this READY packet to the candidate
    Reply { to: Address, packet: Packet },
    /// Handshake finished with this peer
    Commit(Address),
}

/// Receiver side of the handshake
#[derive(Debug, Clone)]
pub struct ResponderSession {
    own: Address,
    state: PairingState,
    session: Option<u16>,
    candidate: Option<Address>,
}

impl ResponderSession {
    pub fn new(own: Address) -> Self {
        info!("Waiting for a transmitter to pair");
        Self {
            own,
            state: PairingState::Pairing,
            session: None,
            candidate: None,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Session locked by the first INIT
    pub fn session(&self) -> Option<u16> {
        self.session
    }

    /// Initiator that sent the locked INIT
    pub fn candidate(&self) -> Option<Address> {
        self.candidate
    }

    /// Feed an inbound packet
    pub fn on_packet(&mut self, packet: &Packet) -> ResponderAction {
        if self.state != PairingState::Pairing {
            return ResponderAction::Ignore;
        }

        let Some(pair) = packet.as_pair() else {
            debug!("Ignoring non-pair packet while pairing");
            return ResponderAction::Ignore;
        };

        match pair.status {
            PairStatus::Init => self.on_init(pair),
            PairStatus::Paired => self.on_paired(pair),
            PairStatus::Ready => ResponderAction::Ignore,
        }
    }

    fn on_init(&mut self, pair: &PairPacket) -> ResponderAction {
        if pair.sender.is_none() || pair.sender.is_broadcast() {
            return ResponderAction::Ignore;
        }

        match (self.session, self.candidate) {
            (None, _) => {
                info!("Ready to pair with {} in session {}", pair.sender, pair.session);
                self.session = Some(pair.session);
                self.candidate = Some(pair.sender);
            }
            (Some(session), Some(candidate))
                if session == pair.session && candidate == pair.sender => {}
            _ => {
                debug!("Ignoring INIT for session {} from {}", pair.session, pair.sender);
                return ResponderAction::Ignore;
            }
        }

        ResponderAction::Reply {
            to: pair.sender,
            packet: Packet::Pair(PairPacket {
                status: PairStatus::Ready,
                session: pair.session,
                sender: self.own,
            }),
        }
    }

    fn on_paired(&mut self, pair: &PairPacket) -> ResponderAction {
        if self.session != Some(pair.session) || self.candidate != Some(pair.sender) {
            debug!("Ignoring PAIRED for session {} from {}", pair.session, pair.sender);
            return ResponderAction::Ignore;
        }

        info!("Paired with {}", pair.sender);
        self.state = PairingState::Paired;
        ResponderAction::Commit(pair.sender)
    }

    /// Mark the attempt as timed out; the responder stays unpaired
    pub fn fail(&mut self) {
        info!("No transmitter completed pairing");
        self.state = PairingState::Unpaired;
        self.session = None;
        self.candidate = None;
    }
}
