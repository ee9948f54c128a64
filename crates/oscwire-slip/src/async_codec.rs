use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, SlipConfig, SlipDecoder};
use crate::error::SlipError;

/// SLIP framing for `tokio_util::codec::Framed*`.
///
/// Decoding consumes every byte handed to it; a partial frame lives in the inner
/// [`SlipDecoder`] until its closing `END` arrives.
#[derive(Debug)]
pub struct SlipCodec {
    decoder: SlipDecoder,
    max_frame_size: usize,
}

impl SlipCodec {
    pub fn new() -> Self {
        Self::with_config(&SlipConfig::default())
    }

    pub fn with_config(config: &SlipConfig) -> Self {
        Self {
            decoder: SlipDecoder::with_max_frame_size(config.max_frame_size),
            max_frame_size: config.max_frame_size,
        }
    }

    pub fn decoder(&self) -> &SlipDecoder {
        &self.decoder
    }
}

impl Default for SlipCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SlipCodec {
    type Item = Bytes;
    type Error = SlipError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut consumed = 0;
        let mut packet = None;
        for &byte in src.iter() {
            consumed += 1;
            packet = self.decoder.feed(byte);
            if packet.is_some() {
                break;
            }
        }
        src.advance(consumed);
        Ok(packet)
    }
}

impl Encoder<Bytes> for SlipCodec {
    type Error = SlipError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(SlipError::PacketTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }
        encode_frame(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::{wrap, END};

    #[tokio::test]
    async fn framed_read_yields_packets() {
        let mut wire = wrap(b"/a\0\0").to_vec();
        wire.extend_from_slice(&wrap(&[END, 1]));
        let mut framed = FramedRead::new(wire.as_slice(), SlipCodec::new());

        assert_eq!(framed.next().await.unwrap().unwrap().as_ref(), b"/a\0\0");
        assert_eq!(framed.next().await.unwrap().unwrap().as_ref(), &[END, 1]);
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_write_then_read() {
        let mut framed = FramedWrite::new(Vec::new(), SlipCodec::new());
        framed.send(Bytes::from_static(b"one")).await.unwrap();
        framed.send(Bytes::from_static(b"two")).await.unwrap();
        let wire = framed.into_inner();

        let mut reader = FramedRead::new(wire.as_slice(), SlipCodec::new());
        assert_eq!(reader.next().await.unwrap().unwrap().as_ref(), b"one");
        assert_eq!(reader.next().await.unwrap().unwrap().as_ref(), b"two");
    }

    #[test]
    fn decode_keeps_partial_frame_across_calls() {
        let mut codec = SlipCodec::new();
        let wire = wrap(b"split");
        let mut first = BytesMut::from(&wire[..3]);
        assert!(codec.decode(&mut first).unwrap().is_none());
        assert!(first.is_empty());

        let mut rest = BytesMut::from(&wire[3..]);
        assert_eq!(codec.decode(&mut rest).unwrap().unwrap().as_ref(), b"split");
    }

    #[test]
    fn encode_rejects_oversized() {
        let mut codec = SlipCodec::with_config(&SlipConfig {
            max_frame_size: 2,
            ..SlipConfig::default()
        });
        let mut dst = BytesMut::new();
        assert!(codec.encode(Bytes::from_static(b"abc"), &mut dst).is_err());
        assert!(dst.is_empty());
    }
}
