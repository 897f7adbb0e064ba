//! Protocol error types.
//!
//! Framing and envelope decoding share one error enum. The daemon folds
//! these into its own error type; a client that sees any of them should
//! drop the connection rather than try to resynchronize mid-stream.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while framing or parsing booking messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame claims, or the encoded envelope needs, more than the cap.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },

    /// The payload is not valid JSON for the expected envelope.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The buffer ended before the frame did.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    /// A frame with a zero-length payload.
    #[error("empty message")]
    EmptyMessage,

    /// A read or write exceeded the connection deadline.
    #[error("timeout during {operation}")]
    Timeout { operation: String },
}
