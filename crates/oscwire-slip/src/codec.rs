use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

/// Frame delimiter.
pub const END: u8 = 0xC0;

/// Escape introducer.
pub const ESC: u8 = 0xDB;

/// Escaped form of `END` (follows `ESC`).
pub const ESC_END: u8 = 0xDC;

/// Escaped form of `ESC` (follows `ESC`).
pub const ESC_ESC: u8 = 0xDD;

/// Default maximum unescaped frame size: 16 KiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024;

/// Escape `packet` into a frame and append it to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────┬───────────────────────────────────┬──────┐
/// │ END  │ payload, with                     │ END  │
/// │ 0xC0 │   0xC0 -> 0xDB 0xDC               │ 0xC0 │
/// │      │   0xDB -> 0xDB 0xDD               │      │
/// └──────┴───────────────────────────────────┴──────┘
/// ```
///
/// The leading `END` flushes any line noise the receiver accumulated.
pub fn encode_frame(packet: &[u8], dst: &mut BytesMut) {
    let escapes = packet.iter().filter(|&&b| b == END || b == ESC).count();
    dst.reserve(packet.len() + escapes + 2);
    dst.put_u8(END);
    for &byte in packet {
        match byte {
            END => dst.put_slice(&[ESC, ESC_END]),
            ESC => dst.put_slice(&[ESC, ESC_ESC]),
            b => dst.put_u8(b),
        }
    }
    dst.put_u8(END);
}

/// Escape `packet` into a new frame.
pub fn wrap(packet: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    encode_frame(packet, &mut buf);
    buf.freeze()
}

/// Configuration for SLIP readers and writers.
#[derive(Debug, Clone)]
pub struct SlipConfig {
    /// Largest unescaped frame accepted or sent. Default: 16 KiB.
    pub max_frame_size: usize,
    /// Read timeout applied by transports that own the stream.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied by transports that own the stream.
    pub write_timeout: Option<Duration>,
}

impl Default for SlipConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Unwrap state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Between frames; `END` bytes are consumed silently.
    Idle,
    /// Accumulating payload bytes.
    InFrame,
    /// The previous byte was `ESC`.
    Escaped,
}

/// Incremental SLIP unwrapper.
///
/// Keeps its partial frame across calls, so feeding a stream in any number of
/// pieces yields the same packets as feeding it whole. A frame that grows past
/// the size limit is dropped along with every byte up to the next `END`.
#[derive(Debug)]
pub struct SlipDecoder {
    state: DecoderState,
    buf: BytesMut,
    max_frame_size: usize,
    discarding: bool,
    overflow_count: u64,
}

impl SlipDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            state: DecoderState::Idle,
            buf: BytesMut::new(),
            max_frame_size,
            discarding: false,
            overflow_count: 0,
        }
    }

    /// Feed one byte. Returns the packet this byte completed, if any.
    pub fn feed(&mut self, byte: u8) -> Option<Bytes> {
        if self.discarding {
            if byte == END {
                self.discarding = false;
                self.state = DecoderState::Idle;
            }
            return None;
        }

        match (self.state, byte) {
            (DecoderState::Idle, END) => None,
            (DecoderState::Idle | DecoderState::InFrame, ESC) => {
                self.state = DecoderState::Escaped;
                None
            }
            (DecoderState::InFrame, END) => {
                self.state = DecoderState::Idle;
                if self.buf.is_empty() {
                    None
                } else {
                    Some(self.buf.split().freeze())
                }
            }
            (DecoderState::Escaped, END) => {
                // An escape cannot be completed by END; the frame is corrupt.
                debug!(discarded = self.buf.len(), "slip frame aborted inside escape");
                self.buf.clear();
                self.state = DecoderState::Idle;
                None
            }
            (DecoderState::Escaped, b) => {
                let unescaped = match b {
                    ESC_END => END,
                    ESC_ESC => ESC,
                    other => other,
                };
                self.push(unescaped);
                None
            }
            (_, b) => {
                self.push(b);
                None
            }
        }
    }

    /// Feed a run of bytes, handing every completed packet to `on_packet` in order.
    pub fn feed_slice<F: FnMut(Bytes)>(&mut self, data: &[u8], mut on_packet: F) {
        for &byte in data {
            if let Some(packet) = self.feed(byte) {
                on_packet(packet);
            }
        }
    }

    /// Drop any partial frame and return to `Idle`.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = DecoderState::Idle;
        self.discarding = false;
    }

    /// Current state. Reports `Idle` while skipping the rest of an oversized frame.
    pub fn state(&self) -> DecoderState {
        if self.discarding {
            DecoderState::Idle
        } else {
            self.state
        }
    }

    /// Number of frames dropped for exceeding the size limit.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// Bytes held in the current partial frame.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn push(&mut self, byte: u8) {
        if self.buf.len() >= self.max_frame_size {
            self.overflow_count += 1;
            debug!(
                max = self.max_frame_size,
                overflows = self.overflow_count,
                "slip frame exceeds limit, resynchronizing"
            );
            self.buf.clear();
            self.state = DecoderState::Idle;
            self.discarding = true;
            return;
        }
        self.buf.put_u8(byte);
        self.state = DecoderState::InFrame;
    }
}

impl Default for SlipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unwrap_all(decoder: &mut SlipDecoder, data: &[u8]) -> Vec<Bytes> {
        let mut out = Vec::new();
        decoder.feed_slice(data, |p| out.push(p));
        out
    }

    #[test]
    fn wrap_escapes_end_and_esc() {
        let framed = wrap(&[0x01, END, 0x02, ESC, 0x03]);
        assert_eq!(
            framed.as_ref(),
            &[END, 0x01, ESC, ESC_END, 0x02, ESC, ESC_ESC, 0x03, END]
        );
    }

    #[test]
    fn unwrap_restores_escaped_bytes() {
        let payload = [END, ESC, END, 0x00, ESC];
        let mut decoder = SlipDecoder::new();
        let packets = unwrap_all(&mut decoder, &wrap(&payload));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].as_ref(), &payload);
        assert_eq!(decoder.state(), DecoderState::Idle);
    }

    #[test]
    fn leading_and_repeated_end_bytes_are_ignored() {
        let mut decoder = SlipDecoder::new();
        let packets = unwrap_all(&mut decoder, &[END, END, END, 0x2F, END, END, 0x41, END]);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].as_ref(), &[0x2F]);
        assert_eq!(packets[1].as_ref(), &[0x41]);
    }

    #[test]
    fn frame_without_leading_end_is_accepted() {
        let mut decoder = SlipDecoder::new();
        let packets = unwrap_all(&mut decoder, &[0x10, 0x20, END]);
        assert_eq!(packets[0].as_ref(), &[0x10, 0x20]);
    }

    #[test]
    fn state_tracks_progress() {
        let mut decoder = SlipDecoder::new();
        assert_eq!(decoder.state(), DecoderState::Idle);
        assert!(decoder.feed(0x01).is_none());
        assert_eq!(decoder.state(), DecoderState::InFrame);
        assert!(decoder.feed(ESC).is_none());
        assert_eq!(decoder.state(), DecoderState::Escaped);
        assert!(decoder.feed(ESC_END).is_none());
        assert_eq!(decoder.state(), DecoderState::InFrame);
        assert_eq!(decoder.feed(END).unwrap().as_ref(), &[0x01, END]);
    }

    #[test]
    fn invalid_escape_keeps_byte() {
        let mut decoder = SlipDecoder::new();
        let packets = unwrap_all(&mut decoder, &[END, 0x01, ESC, 0x55, END]);
        assert_eq!(packets[0].as_ref(), &[0x01, 0x55]);
    }

    #[test]
    fn end_inside_escape_discards_frame() {
        let mut decoder = SlipDecoder::new();
        let packets = unwrap_all(&mut decoder, &[END, 0x01, ESC, END, 0x02, END]);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].as_ref(), &[0x02]);
    }

    #[test]
    fn oversized_frame_is_dropped_and_stream_resyncs() {
        let mut decoder = SlipDecoder::with_max_frame_size(4);
        let mut stream = vec![END, 1, 2, 3, 4, 5, 6, END];
        stream.extend_from_slice(&wrap(&[9, 9]));

        let packets = unwrap_all(&mut decoder, &stream);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].as_ref(), &[9, 9]);
        assert_eq!(decoder.overflow_count(), 1);
    }

    #[test]
    fn frame_at_exact_limit_is_kept() {
        let mut decoder = SlipDecoder::with_max_frame_size(4);
        let packets = unwrap_all(&mut decoder, &wrap(&[1, 2, 3, 4]));
        assert_eq!(packets[0].as_ref(), &[1, 2, 3, 4]);
        assert_eq!(decoder.overflow_count(), 0);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut decoder = SlipDecoder::new();
        assert!(unwrap_all(&mut decoder, &[END, 1, 2, ESC]).is_empty());
        assert_eq!(decoder.buffered_len(), 2);
        decoder.reset();
        assert_eq!(decoder.buffered_len(), 0);
        assert_eq!(decoder.state(), DecoderState::Idle);
        let packets = unwrap_all(&mut decoder, &[3, END]);
        assert_eq!(packets[0].as_ref(), &[3]);
    }

    #[test]
    fn empty_packet_wraps_to_two_ends_and_yields_nothing() {
        let framed = wrap(&[]);
        assert_eq!(framed.as_ref(), &[END, END]);
        let mut decoder = SlipDecoder::new();
        assert!(unwrap_all(&mut decoder, &framed).is_empty());
    }
}
