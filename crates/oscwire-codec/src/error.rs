/// Errors produced while decoding a wire packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer ended before the value starting at `offset` was complete.
    #[error("packet truncated at offset {offset} (needed {needed} more bytes)")]
    Truncated { offset: usize, needed: usize },

    /// A string was not NUL-terminated, was not valid UTF-8, or its padding was not zeroed.
    #[error("invalid string at offset {offset}")]
    InvalidString { offset: usize },

    /// The packet starts with neither `/` nor `#bundle`.
    #[error("unrecognized packet (first byte 0x{first:02x})")]
    UnrecognizedPacket { first: u8 },

    /// Data follows the address but does not start with `,`.
    #[error("missing type tag string after address")]
    MissingTypeTag,

    /// The type tag string contains a tag this codec does not carry.
    #[error("unknown type tag '{tag}'")]
    UnknownTypeTag { tag: char },

    /// A blob or bundle element declared a negative length.
    #[error("negative length {length} at offset {offset}")]
    NegativeLength { length: i32, offset: usize },

    /// A blob or bundle element declared more bytes than remain in the buffer.
    #[error("length {length} exceeds remaining {remaining} bytes")]
    LengthExceedsBuffer { length: usize, remaining: usize },

    /// A bundle element is itself a bundle.
    #[error("nested bundles are not supported")]
    NestedBundle,

    /// The packet is empty.
    #[error("empty packet")]
    Empty,
}

/// Errors produced while encoding a message or bundle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Addresses must be non-empty and start with `/`.
    #[error("invalid address {address:?} (must start with '/')")]
    InvalidAddress { address: String },

    /// Strings on the wire are NUL-terminated and cannot contain NUL.
    #[error("string contains an embedded NUL byte")]
    EmbeddedNul,

    /// Blob or bundle element length does not fit the 32-bit length prefix.
    #[error("element too large ({size} bytes)")]
    TooLarge { size: usize },
}

/// Errors produced by the text command parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The command line contained no tokens.
    #[error("empty command")]
    Empty,

    /// The first token is not an address.
    #[error("invalid address {0:?} (must start with '/')")]
    InvalidAddress(String),

    /// A double-quoted argument was never closed.
    #[error("unterminated quoted string starting at column {column}")]
    UnterminatedQuote { column: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
