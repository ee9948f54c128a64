use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, SlipConfig};
use crate::error::{Result, SlipError};

/// Frames packets with SLIP and writes them to a byte stream.
///
/// Each frame starts and ends with `END`. The leading `END` makes the receiver
/// discard line noise or the tail of a frame cut short by an earlier failed
/// write, so a stream never needs resynchronising after an error.
pub struct SlipWriter<W> {
    inner: W,
    config: SlipConfig,
    /// Reused between packets; holds one escaped frame.
    frame: BytesMut,
    packets: u64,
}

impl<W: Write> SlipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, SlipConfig::default())
    }

    pub fn with_config(inner: W, config: SlipConfig) -> Self {
        Self {
            inner,
            config,
            frame: BytesMut::new(),
            packets: 0,
        }
    }

    /// Escape `packet`, write the whole frame and flush.
    ///
    /// Returns the unescaped packet length. A write timeout or a peer that stops
    /// accepting bytes surfaces as an error; the caller decides whether the link
    /// is still usable.
    pub fn send(&mut self, packet: &[u8]) -> Result<usize> {
        let max = self.config.max_frame_size;
        if packet.len() > max {
            return Err(SlipError::PacketTooLarge {
                size: packet.len(),
                max,
            });
        }

        self.frame.clear();
        encode_frame(packet, &mut self.frame);
        self.inner
            .write_all(&self.frame)
            .and_then(|()| self.inner.flush())
            .map_err(|err| match err.kind() {
                ErrorKind::WriteZero => SlipError::ConnectionClosed,
                _ => SlipError::Io(err),
            })?;

        self.packets += 1;
        Ok(packet.len())
    }

    /// Packets written since creation.
    pub fn packets_sent(&self) -> u64 {
        self.packets
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
