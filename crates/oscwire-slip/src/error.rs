/// Errors that can occur while reading or writing SLIP frames.
#[derive(Debug, thiserror::Error)]
pub enum SlipError {
    /// The packet exceeds the configured maximum frame size.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// An I/O error occurred on the underlying stream.
    #[error("slip I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached EOF. Any partial frame was discarded.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, SlipError>;
