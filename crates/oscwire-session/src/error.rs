use std::time::Duration;

/// Errors that can occur in board session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error. The board is marked closed.
    #[error("transport error: {0}")]
    Transport(#[from] oscwire_transport::TransportError),

    /// An outgoing message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] oscwire_codec::EncodeError),

    /// A command line could not be parsed into a message.
    #[error("invalid command: {0}")]
    Parse(#[from] oscwire_codec::ParseError),

    /// The board answered a request with an error reply.
    #[error("board replied to {address}: {reason}")]
    Remote { address: String, reason: String },

    /// The board's transport has closed.
    #[error("board closed")]
    Closed,

    /// No matching reply arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, SessionError>;
