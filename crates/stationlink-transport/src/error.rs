/// Errors that can occur on the device link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the appliance.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A write was attempted between sessions, after the first connection.
    #[error("not connected")]
    NotConnected,

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
