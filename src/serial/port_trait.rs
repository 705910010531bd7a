//! Trait abstraction for the co-processor bus to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default time allowed for one bus transaction
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(50);

/// Synchronous bus to the radio co-processor
///
/// A transaction is framed by the select line: select, clock `tx` out while
/// clocking the same number of bytes into `rx`, deselect.
#[async_trait]
pub trait BridgeBus: Send {
    /// Run one full-duplex transaction. `rx` must be as long as `tx`.
    async fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()>;
}

/// [`BridgeBus`] over a byte stream (USB CDC / UART attached co-processor)
///
/// The co-processor answers every transaction with exactly as many bytes as it
/// received, mirroring a full-duplex bus.
pub struct StreamBus<S> {
    stream: S,
    timeout: Duration,
}

impl<S> StreamBus<S> {
    pub fn new(stream: S) -> Self {
        Self::with_timeout(stream, DEFAULT_TRANSFER_TIMEOUT)
    }

    pub fn with_timeout(stream: S, timeout: Duration) -> Self {
        Self { stream, timeout }
    }
}

#[async_trait]
impl<S> BridgeBus for StreamBus<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
        if rx.len() != tx.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "rx buffer must match tx length",
            ));
        }

        self.stream.write_all(tx).await?;
        self.stream.flush().await?;

        tokio::time::timeout(self.timeout, self.stream.read_exact(rx))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "bridge transfer timed out"))??;

        Ok(())
    }
}

#[async_trait]
impl<B: BridgeBus + ?Sized> BridgeBus for Box<B> {
    async fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
        (**self).transfer(tx, rx).await
    }
}
