//! OSC 1.0 stream framing for TCP: each packet is preceded by its size as a
//! 4-byte big-endian integer.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Length prefix size.
pub const PREFIX_SIZE: usize = 4;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Append a length-prefixed packet to `dst`.
///
/// ```text
/// ┌──────────────┬──────────────────┐
/// │ Length (4B)  │ Packet           │
/// │ big-endian   │ (Length bytes)   │
/// └──────────────┴──────────────────┘
/// ```
pub fn encode_packet(packet: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(packet.len()).map_err(|_| TransportError::PacketTooLarge {
        size: packet.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(PREFIX_SIZE + packet.len());
    dst.put_u32(len);
    dst.put_slice(packet);
    Ok(())
}

/// Take one packet off the front of `src`.
///
/// Returns `Ok(None)` until the whole packet has arrived. A declared length
/// above `max` is an error: the stream cannot be resynchronized after it.
pub fn decode_packet(src: &mut BytesMut, max: usize) -> Result<Option<Bytes>> {
    if src.len() < PREFIX_SIZE {
        return Ok(None);
    }
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if len > max {
        return Err(TransportError::PacketTooLarge { size: len, max });
    }
    if src.len() < PREFIX_SIZE + len {
        return Ok(None);
    }
    src.advance(PREFIX_SIZE);
    Ok(Some(src.split_to(len).freeze()))
}

/// Incremental reader of length-prefixed packets.
pub(crate) struct LengthPrefixReader<R> {
    inner: R,
    buf: BytesMut,
    max: usize,
}

impl<R: Read> LengthPrefixReader<R> {
    pub fn new(inner: R, max: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max,
        }
    }

    /// Return a packet if one is complete after at most one read.
    pub fn poll_packet(&mut self) -> Result<Option<Bytes>> {
        if let Some(packet) = decode_packet(&mut self.buf, self.max)? {
            return Ok(Some(packet));
        }
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        };
        if read == 0 {
            return Err(TransportError::Closed);
        }
        self.buf.extend_from_slice(&chunk[..read]);
        decode_packet(&mut self.buf, self.max)
    }
}

/// Write one length-prefixed packet and flush.
pub(crate) fn write_packet<W: Write + ?Sized>(writer: &mut W, packet: &[u8]) -> Result<()> {
    let mut buf = BytesMut::new();
    encode_packet(packet, &mut buf)?;
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn encode_writes_big_endian_length() {
        let mut buf = BytesMut::new();
        encode_packet(b"/a\0\0", &mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 4, b'/', b'a', 0, 0]);
    }

    #[test]
    fn decode_waits_for_complete_packet() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 6, 1, 2][..]);
        assert!(decode_packet(&mut buf, 64).unwrap().is_none());
        buf.extend_from_slice(&[3, 4, 5, 6, 0, 0]);
        assert_eq!(decode_packet(&mut buf, 64).unwrap().unwrap().as_ref(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let mut buf = BytesMut::from(&[0u8, 1, 0, 0][..]);
        assert!(matches!(
            decode_packet(&mut buf, 1024),
            Err(TransportError::PacketTooLarge { size: 65536, max: 1024 })
        ));
    }

    #[test]
    fn reader_yields_packets_then_closed() {
        let mut wire = BytesMut::new();
        encode_packet(b"one", &mut wire).unwrap();
        encode_packet(b"two", &mut wire).unwrap();
        let mut reader = LengthPrefixReader::new(Cursor::new(wire.to_vec()), 64);
        assert_eq!(reader.poll_packet().unwrap().unwrap().as_ref(), b"one");
        assert_eq!(reader.poll_packet().unwrap().unwrap().as_ref(), b"two");
        assert!(matches!(reader.poll_packet(), Err(TransportError::Closed)));
    }

    #[test]
    fn write_packet_prefixes_and_flushes() {
        let mut out = Vec::new();
        write_packet(&mut out, b"xy").unwrap();
        assert_eq!(out, vec![0, 0, 0, 2, b'x', b'y']);
    }
}
