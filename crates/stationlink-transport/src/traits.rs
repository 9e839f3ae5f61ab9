use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Lifecycle of a reconnecting link.
///
/// `Disconnected -> Connecting -> Connected -> Disconnected` repeats until
/// [`Link::close`] moves the link to the terminal `Closed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// What a link reports to its single consumer, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A new session is established.
    Connected,
    /// Raw bytes read from the socket. Chunk boundaries carry no meaning.
    Data(Bytes),
    /// The current session is gone. Partial data from it must be discarded.
    SessionEnded,
}

/// A byte link to one appliance.
///
/// Implementors deliver [`LinkEvent`]s through a channel handed out at
/// construction; the event channel closing means the link is closed for good.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Write one encoded frame.
    ///
    /// Blocks until the first session is established. After that, writes
    /// between sessions fail with [`crate::TransportError::NotConnected`].
    async fn write(&self, data: Bytes) -> Result<()>;

    /// Drop the current session and start over.
    fn reconnect(&self);

    /// Stop for good. Idempotent.
    async fn close(&self);

    fn state(&self) -> TransportState;
}
