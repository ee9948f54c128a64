//! SLIP packet framing for OSC over byte streams.
//!
//! Serial and USB CDC links deliver bytes, not packets. Each OSC packet is
//! wrapped in `END` (0xC0) delimiters with `END`/`ESC` bytes escaped, so a
//! receiver can find packet boundaries no matter how the stream is chunked.
//!
//! - [`SlipDecoder`]: resumable byte-at-a-time unwrapper with size limit
//! - [`SlipReader`] / [`SlipWriter`]: blocking adapters over `Read` / `Write`
//! - `SlipCodec` (feature `async`): `tokio_util` codec

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::SlipCodec;
pub use codec::{
    encode_frame, wrap, DecoderState, SlipConfig, SlipDecoder, DEFAULT_MAX_FRAME_SIZE, END, ESC,
    ESC_END, ESC_ESC,
};
pub use error::{Result, SlipError};
pub use reader::SlipReader;
pub use writer::SlipWriter;
