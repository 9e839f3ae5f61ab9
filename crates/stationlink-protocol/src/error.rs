/// Errors that can occur while interpreting payloads or building commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The payload is shorter than the record requires.
    #[error("{record} payload too short: need {need} bytes, got {got}")]
    Truncated {
        record: &'static str,
        need: usize,
        got: usize,
    },

    /// A text field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidText { field: &'static str },

    /// The command is not available on this product.
    #[error("{command} is not supported by {product}")]
    Unsupported {
        command: &'static str,
        product: String,
    },

    /// An argument is outside the range the device accepts.
    #[error("invalid value for {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
