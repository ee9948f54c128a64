use oscwire_codec::address::error_reply;
use oscwire_codec::Message;

use crate::subsystem::ValueType;

/// Why a message could not be routed or applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No subsystem is registered under the first address segment.
    #[error("unknown subsystem '{0}'")]
    UnknownSubsystem(String),

    /// The index segment is missing, not a number, or not below the instance count.
    #[error("index '{index}' out of range for {subsystem} (0..{count})")]
    IndexOutOfRange {
        subsystem: String,
        index: String,
        count: usize,
    },

    /// The address stops before naming a property.
    #[error("no property given for {subsystem}")]
    MissingProperty { subsystem: String },

    #[error("unknown property '{property}' on {subsystem}")]
    UnknownProperty { subsystem: String, property: String },

    #[error("property '{property}' expects {expected}, got '{found}'")]
    TypeMismatch {
        property: String,
        expected: ValueType,
        found: char,
    },

    /// Reads take no arguments, writes take exactly one.
    #[error("{0} arguments given; send none to read or one to write")]
    TooManyArguments(usize),

    #[error("property '{0}' is write-only")]
    NotReadable(String),

    #[error("property '{0}' is read-only")]
    NotWritable(String),

    #[error("invalid value for '{property}': {reason}")]
    InvalidValue { property: String, reason: String },

    /// The subsystem's peripheral refused the operation.
    #[error("hardware error: {0}")]
    Hardware(String),

    /// Two subsystems were registered under one name.
    #[error("subsystem '{0}' registered twice")]
    DuplicateSubsystem(String),
}

impl DispatchError {
    /// Error reply for a request that arrived at `address`.
    pub fn to_reply(&self, address: &str) -> Message {
        error_reply(address, self)
    }
}

impl From<crate::pins::PinError> for DispatchError {
    fn from(err: crate::pins::PinError) -> Self {
        DispatchError::Hardware(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
