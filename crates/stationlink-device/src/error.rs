use std::time::Duration;

/// Errors that can occur in device operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] stationlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] stationlink_frame::FrameError),

    /// Payload could not be interpreted, or a command could not be built.
    #[error("protocol error: {0}")]
    Protocol(#[from] stationlink_protocol::ProtocolError),

    /// No matching reply arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The secondary device lost its link to the main unit.
    #[error("extra battery {serial} is detached")]
    Detached { serial: String },

    /// The device runtime has been closed.
    #[error("device closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, DeviceError>;
