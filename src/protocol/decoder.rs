//! # Packet Decoder
//!
//! Decodes radio frames back into [`Packet`] values. A frame whose discriminant
//! is unknown is rejected outright, never interpreted as some other variant.

use bytes::Buf;

use super::types::*;
use crate::error::PacketError;

/// Read only the discriminant of a frame
///
/// Returns `None` if the frame is shorter than the discriminant itself.
pub fn peek_packet_type(frame: &[u8]) -> Option<PacketType> {
    if frame.len() < PACKET_TYPE_SIZE {
        return None;
    }
    Some(u16::from_le_bytes([frame[0], frame[1]]))
}

/// Decode a radio frame
///
/// # Arguments
///
/// * `frame` - Raw frame bytes; anything past the variant payload is ignored
///
/// # Errors
///
/// Returns error if:
/// - Frame is too short for its discriminant's payload
/// - Discriminant is not a known packet type
/// - Pair status or command value is out of range
///
/// # Examples
///
/// ```
/// use rc_link::protocol::decoder::decode_packet;
/// use rc_link::protocol::encoder::encode_packet;
/// use rc_link::protocol::types::Packet;
///
/// let packet = Packet::Telemetry { battery_mv: 3900 };
/// assert_eq!(decode_packet(&encode_packet(&packet)), Ok(packet));
/// ```
pub fn decode_packet(frame: &[u8]) -> Result<Packet, PacketError> {
    let packet_type = peek_packet_type(frame).ok_or(PacketError::TooShort(frame.len()))?;

    let required = match packet_type {
        PACKET_TYPE_CONTROL => CONTROL_PACKET_LEN,
        PACKET_TYPE_TELEMETRY => TELEMETRY_PACKET_LEN,
        PACKET_TYPE_SET_RF_CHANNEL | PACKET_TYPE_SET_PA_LEVEL => SETTING_PACKET_LEN,
        PACKET_TYPE_PAIR => PAIR_PACKET_LEN,
        PACKET_TYPE_COMMAND => COMMAND_PACKET_LEN,
        other => return Err(PacketError::UnknownType(other)),
    };

    if frame.len() < required {
        return Err(PacketError::TooShort(frame.len()));
    }

    let mut buf = &frame[PACKET_TYPE_SIZE..required];

    let packet = match packet_type {
        PACKET_TYPE_CONTROL => {
            let mut channels = [0u16; NUM_CHANNELS];
            for value in channels.iter_mut() {
                *value = buf.get_u16_le();
            }
            Packet::Control(ControlFrame::new(channels))
        }
        PACKET_TYPE_TELEMETRY => Packet::Telemetry {
            battery_mv: buf.get_u16_le(),
        },
        PACKET_TYPE_SET_RF_CHANNEL => Packet::SetRfChannel(buf.get_u8()),
        PACKET_TYPE_SET_PA_LEVEL => Packet::SetPaLevel(buf.get_u8()),
        PACKET_TYPE_PAIR => {
            let status = PairStatus::try_from(buf.get_u8())?;
            let session = buf.get_u16_le();
            let mut sender = [0u8; ADDRESS_LENGTH];
            buf.copy_to_slice(&mut sender);
            Packet::Pair(PairPacket {
                status,
                session,
                sender: Address(sender),
            })
        }
        _ => Packet::Command(Command::try_from(buf.get_u16_le())?),
    };

    Ok(packet)
}
