//! # Link Protocol Constants and Types
//!
//! Core definitions for the fixed-size packets exchanged between transmitter
//! and receiver. Every packet starts with a 2-byte [`PacketType`] discriminant
//! followed by a packed, little-endian payload, zero-padded to [`PACKET_SIZE`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PacketError;

/// Size of one radio frame in bytes
pub const PACKET_SIZE: usize = 18;

/// Number of logical output channels in a control frame
pub const NUM_CHANNELS: usize = 8;

/// Length of a radio endpoint address
pub const ADDRESS_LENGTH: usize = 6;

/// Packet discriminant (first two bytes of every frame)
pub type PacketType = u16;

/// Control packet type
pub const PACKET_TYPE_CONTROL: PacketType = 0x0a01;

/// Telemetry packet type
pub const PACKET_TYPE_TELEMETRY: PacketType = 0x0a02;

/// Set RF channel packet type
pub const PACKET_TYPE_SET_RF_CHANNEL: PacketType = 0x0a03;

/// Set PA level packet type
pub const PACKET_TYPE_SET_PA_LEVEL: PacketType = 0x0a04;

/// Pairing packet type
pub const PACKET_TYPE_PAIR: PacketType = 0x0a05;

/// Command packet type
pub const PACKET_TYPE_COMMAND: PacketType = 0x0a06;

/// Size of the discriminant prefix
pub const PACKET_TYPE_SIZE: usize = 2;

/// Control frame length: type + 8 × u16
pub const CONTROL_PACKET_LEN: usize = PACKET_TYPE_SIZE + NUM_CHANNELS * 2;

/// Telemetry frame length: type + battery mV
pub const TELEMETRY_PACKET_LEN: usize = PACKET_TYPE_SIZE + 2;

/// Set RF channel / PA level frame length: type + one byte
pub const SETTING_PACKET_LEN: usize = PACKET_TYPE_SIZE + 1;

/// Pair frame length: type + status + session + sender address
pub const PAIR_PACKET_LEN: usize = PACKET_TYPE_SIZE + 1 + 2 + ADDRESS_LENGTH;

/// Command frame length: type + command
pub const COMMAND_PACKET_LEN: usize = PACKET_TYPE_SIZE + 2;

const _: () = assert!(CONTROL_PACKET_LEN <= PACKET_SIZE);
const _: () = assert!(PAIR_PACKET_LEN <= PACKET_SIZE);

/// Channel value range
pub const CHANNEL_VALUE_MIN: u16 = 0;
pub const CHANNEL_VALUE_MAX: u16 = 5000;
pub const CHANNEL_VALUE_CENTER: u16 = 1500;

/// Logical RF channel; meaning is transport-specific, 0 selects the transport default
pub type RfChannel = u8;

/// Power amplifier level; meaning is transport-specific
pub type PaLevel = u8;

/// Logical channel that maps to each transport's default native channel
pub const DEFAULT_RF_CHANNEL: RfChannel = 0;

/// Default PA level
pub const DEFAULT_PA_LEVEL: PaLevel = 0;

/// Highest PA level (0 = min .. 3 = max)
pub const MAX_PA_LEVEL: PaLevel = 3;

/// 6-byte radio endpoint identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// The unpaired address
    pub const NONE: Address = Address([0; ADDRESS_LENGTH]);

    /// Broadcast address, only used while pairing
    pub const BROADCAST: Address = Address([0xFF; ADDRESS_LENGTH]);

    /// Whether this is the unpaired address
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Whether this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Pairing handshake step carried in a [`PairPacket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PairStatus {
    /// Initiator is looking for a responder
    Init = 0,
    /// Responder is ready to pair in the given session
    Ready = 1,
    /// Initiator adopted the responder as its peer
    Paired = 2,
}

impl TryFrom<u8> for PairStatus {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Init),
            1 => Ok(Self::Ready),
            2 => Ok(Self::Paired),
            other => Err(PacketError::UnknownPairStatus(other)),
        }
    }
}

/// Commands a transmitter can issue to its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    /// Store the last received control frame as the failsafe frame
    SaveFailsafe = 0,
    /// User-defined command 1
    UserCommand1 = 1,
    /// User-defined command 2
    UserCommand2 = 2,
}

impl TryFrom<u16> for Command {
    type Error = PacketError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SaveFailsafe),
            1 => Ok(Self::UserCommand1),
            2 => Ok(Self::UserCommand2),
            other => Err(PacketError::UnknownCommand(other)),
        }
    }
}

/// One value per logical output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub channels: [u16; NUM_CHANNELS],
}

impl ControlFrame {
    /// Creates a frame from raw channel values
    pub fn new(channels: [u16; NUM_CHANNELS]) -> Self {
        Self { channels }
    }

    /// Creates a frame with every channel clamped to the valid range
    pub fn clamped(channels: [u16; NUM_CHANNELS]) -> Self {
        Self {
            channels: channels.map(|value| value.clamp(CHANNEL_VALUE_MIN, CHANNEL_VALUE_MAX)),
        }
    }

    /// All channels at center
    pub fn neutral() -> Self {
        Self {
            channels: [CHANNEL_VALUE_CENTER; NUM_CHANNELS],
        }
    }
}

impl Default for ControlFrame {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Payload of a pairing packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairPacket {
    pub status: PairStatus,
    pub session: u16,
    pub sender: Address,
}

/// One decoded radio packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    /// Channel values for the receiver outputs
    Control(ControlFrame),
    /// Receiver battery voltage in millivolts
    Telemetry { battery_mv: u16 },
    /// Switch both ends to another logical RF channel
    SetRfChannel(RfChannel),
    /// Change the receiver PA level
    SetPaLevel(PaLevel),
    /// Pairing handshake step
    Pair(PairPacket),
    /// Receiver command
    Command(Command),
}

impl Packet {
    /// Wire discriminant of this packet
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Control(_) => PACKET_TYPE_CONTROL,
            Packet::Telemetry { .. } => PACKET_TYPE_TELEMETRY,
            Packet::SetRfChannel(_) => PACKET_TYPE_SET_RF_CHANNEL,
            Packet::SetPaLevel(_) => PACKET_TYPE_SET_PA_LEVEL,
            Packet::Pair(_) => PACKET_TYPE_PAIR,
            Packet::Command(_) => PACKET_TYPE_COMMAND,
        }
    }

    /// Pair payload, if this is a pairing packet
    pub fn as_pair(&self) -> Option<&PairPacket> {
        match self {
            Packet::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    /// Number of meaningful bytes before zero padding
    pub fn encoded_len(&self) -> usize {
        match self {
            Packet::Control(_) => CONTROL_PACKET_LEN,
            Packet::Telemetry { .. } => TELEMETRY_PACKET_LEN,
            Packet::SetRfChannel(_) | Packet::SetPaLevel(_) => SETTING_PACKET_LEN,
            Packet::Pair(_) => PAIR_PACKET_LEN,
            Packet::Command(_) => COMMAND_PACKET_LEN,
        }
    }
}
