//! # Link Protocol Module
//!
//! The wire format shared by every transport.
//!
//! This module handles:
//! - Packet type taxonomy and fixed frame size
//! - Encoding packets into zero-padded frames
//! - Decoding frames with discriminant checks

pub mod types;
pub mod encoder;
pub mod decoder;

pub use decoder::{decode_packet, peek_packet_type};
pub use encoder::encode_packet;
pub use types::{Address, Command, ControlFrame, Packet, PairPacket, PairStatus, PaLevel, RfChannel};
