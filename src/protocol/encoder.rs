//! # Packet Encoder
//!
//! Encodes [`Packet`] values into fixed-size radio frames.

use bytes::BufMut;

use super::types::*;

/// Encode a packet into a complete radio frame
///
/// The discriminant comes first, then the variant payload, packed little-endian.
/// Bytes after the payload are always zero.
///
/// # Examples
///
/// ```
/// use rc_link::protocol::encoder::encode_packet;
/// use rc_link::protocol::types::{Packet, PACKET_SIZE};
///
/// let frame = encode_packet(&Packet::SetRfChannel(42));
/// assert_eq!(frame.len(), PACKET_SIZE);
/// assert_eq!(&frame[..3], &[0x03, 0x0a, 42]);
/// ```
pub fn encode_packet(packet: &Packet) -> [u8; PACKET_SIZE] {
    let mut frame = [0u8; PACKET_SIZE];
    let mut buf = &mut frame[..];

    buf.put_u16_le(packet.packet_type());

    match packet {
        Packet::Control(control) => {
            for &value in control.channels.iter() {
                buf.put_u16_le(value);
            }
        }
        Packet::Telemetry { battery_mv } => buf.put_u16_le(*battery_mv),
        Packet::SetRfChannel(channel) => buf.put_u8(*channel),
        Packet::SetPaLevel(level) => buf.put_u8(*level),
        Packet::Pair(pair) => {
            buf.put_u8(pair.status as u8);
            buf.put_u16_le(pair.session);
            buf.put_slice(pair.sender.as_bytes());
        }
        Packet::Command(command) => buf.put_u16_le(*command as u16),
    }

    frame
}

/// Copy an encoded packet into a larger zeroed block (e.g. a 32-byte bridge data block)
///
/// # Panics
///
/// Panics if `block` is shorter than [`PACKET_SIZE`].
pub fn encode_into(packet: &Packet, block: &mut [u8]) {
    block.fill(0);
    block[..PACKET_SIZE].copy_from_slice(&encode_packet(packet));
}
