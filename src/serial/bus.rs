//! # Bridge Sub-Protocol Framing
//!
//! Op-codes and the 4-byte status word exchanged with the radio co-processor.
//!
//! | Op-code | Transaction | Payload |
//! |---------|-------------|---------|
//! | `0x01` | write status | 4-byte little-endian status |
//! | `0x02` | write data | dummy byte + 32-byte block |
//! | `0x03` | read data | dummy byte + 32-byte block |
//! | `0x04` | read status | 4-byte little-endian status |

use std::io;

use super::port_trait::BridgeBus;

pub const OP_WRITE_STATUS: u8 = 0x01;
pub const OP_WRITE_DATA: u8 = 0x02;
pub const OP_READ_DATA: u8 = 0x03;
pub const OP_READ_STATUS: u8 = 0x04;

/// Size of one data block on the bridge
pub const BRIDGE_DATA_SIZE: usize = 32;

/// Status word shared between host and co-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Ok,
    Failure,
    Starting,
    Transmitting,
    Receiving,
    Pairing,
    Paired,
    SetPeerAddress,
    SetRfChannel,
    SetPaLevel,
    /// Anything outside the known set
    Unknown(u32),
}

impl BridgeStatus {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x0000 => Self::Ok,
            0x0001 => Self::Failure,
            0x0011 => Self::Starting,
            0x0012 => Self::Transmitting,
            0x0013 => Self::Receiving,
            0x0014 => Self::Pairing,
            0x0015 => Self::Paired,
            0x0016 => Self::SetPeerAddress,
            0x0017 => Self::SetRfChannel,
            0x0018 => Self::SetPaLevel,
            other => Self::Unknown(other),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::Ok => 0x0000,
            Self::Failure => 0x0001,
            Self::Starting => 0x0011,
            Self::Transmitting => 0x0012,
            Self::Receiving => 0x0013,
            Self::Pairing => 0x0014,
            Self::Paired => 0x0015,
            Self::SetPeerAddress => 0x0016,
            Self::SetRfChannel => 0x0017,
            Self::SetPaLevel => 0x0018,
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether the co-processor is idle in a final state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Failure)
    }
}

/// Write the status word
pub async fn write_status<B: BridgeBus + ?Sized>(bus: &mut B, status: BridgeStatus) -> io::Result<()> {
    let mut tx = [0u8; 5];
    tx[0] = OP_WRITE_STATUS;
    tx[1..].copy_from_slice(&status.to_raw().to_le_bytes());
    let mut rx = [0u8; 5];
    bus.transfer(&tx, &mut rx).await
}

/// Read the status word
pub async fn read_status<B: BridgeBus + ?Sized>(bus: &mut B) -> io::Result<BridgeStatus> {
    let tx = [OP_READ_STATUS, 0, 0, 0, 0];
    let mut rx = [0u8; 5];
    bus.transfer(&tx, &mut rx).await?;
    Ok(BridgeStatus::from_raw(u32::from_le_bytes([rx[1], rx[2], rx[3], rx[4]])))
}

/// Write one data block; shorter input is zero padded, longer input truncated
pub async fn write_data<B: BridgeBus + ?Sized>(bus: &mut B, data: &[u8]) -> io::Result<()> {
    let mut tx = [0u8; 2 + BRIDGE_DATA_SIZE];
    tx[0] = OP_WRITE_DATA;
    let len = data.len().min(BRIDGE_DATA_SIZE);
    tx[2..2 + len].copy_from_slice(&data[..len]);
    let mut rx = [0u8; 2 + BRIDGE_DATA_SIZE];
    bus.transfer(&tx, &mut rx).await
}

/// Read one data block
pub async fn read_data<B: BridgeBus + ?Sized>(bus: &mut B) -> io::Result<[u8; BRIDGE_DATA_SIZE]> {
    let mut tx = [0u8; 2 + BRIDGE_DATA_SIZE];
    tx[0] = OP_READ_DATA;
    let mut rx = [0u8; 2 + BRIDGE_DATA_SIZE];
    bus.transfer(&tx, &mut rx).await?;

    let mut block = [0u8; BRIDGE_DATA_SIZE];
    block.copy_from_slice(&rx[2..]);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::port_trait::mocks::MockCoprocessor;

    #[test]
    fn test_status_values() {
        assert_eq!(BridgeStatus::Ok.to_raw(), 0x0000);
        assert_eq!(BridgeStatus::Transmitting.to_raw(), 0x0012);
        assert_eq!(BridgeStatus::SetRfChannel.to_raw(), 0x0017);
        assert_eq!(BridgeStatus::from_raw(0x0015), BridgeStatus::Paired);
        assert_eq!(BridgeStatus::from_raw(0x0099), BridgeStatus::Unknown(0x0099));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(BridgeStatus::Ok.is_terminal());
        assert!(BridgeStatus::Failure.is_terminal());
        assert!(!BridgeStatus::Transmitting.is_terminal());
    }

    #[tokio::test]
    async fn test_write_status_frame() {
        let stream = tokio_test::io::Builder::new()
            .write(&[OP_WRITE_STATUS, 0x12, 0x00, 0x00, 0x00])
            .read(&[0; 5])
            .build();
        let mut bus = crate::serial::port_trait::StreamBus::new(stream);

        write_status(&mut bus, BridgeStatus::Transmitting).await.unwrap();
    }

    #[tokio::test]
    async fn test_data_block_padding() {
        let mut coprocessor = MockCoprocessor::new();
        write_data(&mut coprocessor, &[1, 2, 3]).await.unwrap();

        let writes = coprocessor.data_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(&writes[0][..3], &[1, 2, 3]);
        assert!(writes[0][3..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_read_status_and_data() {
        let mut coprocessor = MockCoprocessor::new();
        let mut block = [0u8; BRIDGE_DATA_SIZE];
        block[0] = 0x02;
        block[1] = 0x0a;
        coprocessor.deliver(BridgeStatus::Receiving, block);

        assert_eq!(read_status(&mut coprocessor).await.unwrap(), BridgeStatus::Receiving);
        assert_eq!(read_data(&mut coprocessor).await.unwrap(), block);
    }
}
