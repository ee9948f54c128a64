use oscwire_slip::SlipError;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the target (serial port, TCP peer).
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// Failed to bind a local socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on an open transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One datagram could not be delivered. The link stays open.
    #[error("datagram to {to} not delivered: {source}")]
    Undeliverable {
        to: std::net::SocketAddr,
        source: std::io::Error,
    },

    /// The operation needs an open transport.
    #[error("transport not connected")]
    NotConnected,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// No destination is configured and no packet has arrived to reply to.
    #[error("no return address known")]
    NoReturnAddress,

    /// The receive buffer cannot hold the next packet; the packet stays queued.
    #[error("receive buffer too small ({available} bytes, packet is {needed})")]
    BufferTooSmall { needed: usize, available: usize },

    /// The packet exceeds the transport's size limit.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl From<SlipError> for TransportError {
    fn from(err: SlipError) -> Self {
        match err {
            SlipError::PacketTooLarge { size, max } => TransportError::PacketTooLarge { size, max },
            SlipError::Io(io) => TransportError::Io(io),
            SlipError::ConnectionClosed => TransportError::Closed,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
