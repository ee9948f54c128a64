//! OSC 1.0 wire codec.
//!
//! Encodes and decodes messages (`/address ,tags args...`) and one-level bundles,
//! big-endian and 4-byte aligned. No I/O and no state: framing for byte streams lives
//! in `oscwire-slip`, delivery in `oscwire-transport`.

pub mod address;
pub mod codec;
pub mod error;
pub mod message;
pub mod text;

pub use codec::{
    decode_message, decode_packet, encode_bundle, encode_message, encode_packet, encoded_len,
    packet_to_bytes, padded_len, BUNDLE_HEADER_SIZE, BUNDLE_TAG,
};
pub use error::{DecodeError, EncodeError, ParseError, Result};
pub use message::{Argument, Bundle, Message, Packet, TimeTag};
pub use text::parse_command;
