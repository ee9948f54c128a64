use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, EncodeError, Result};
use crate::message::{Argument, Bundle, Message, Packet, TimeTag};

/// Bundle marker: `#bundle` followed by one NUL.
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Bundle header: tag (8) + timetag (8).
pub const BUNDLE_HEADER_SIZE: usize = 16;

/// Wire size of a string of `len` bytes: at least one NUL, rounded up to 4.
pub const fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

const fn blob_padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Wire size of `msg` without encoding it.
pub fn encoded_len(msg: &Message) -> usize {
    let args: usize = msg
        .args
        .iter()
        .map(|arg| match arg {
            Argument::Int(_) | Argument::Float(_) => 4,
            Argument::String(s) => padded_len(s.len()),
            Argument::Blob(b) => 4 + blob_padded_len(b.len()),
        })
        .sum();
    padded_len(msg.address.len()) + padded_len(msg.args.len() + 1) + args
}

/// Encode one message.
///
/// Wire format:
/// ```text
/// ┌──────────────────────┬──────────────────────┬────────────────────────┐
/// │ Address              │ Type tags            │ Arguments              │
/// │ "/a/b\0" pad to 4    │ ",if\0" pad to 4     │ i/f: 4B BE             │
/// │                      │                      │ s: NUL, pad to 4       │
/// │                      │                      │ b: 4B BE len + pad     │
/// └──────────────────────┴──────────────────────┴────────────────────────┘
/// ```
///
/// On error nothing is appended to `dst`.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> std::result::Result<(), EncodeError> {
    let start = dst.len();
    let result = write_message(msg, dst);
    if result.is_err() {
        dst.truncate(start);
    }
    result
}

/// Encode a bundle of messages.
///
/// ```text
/// ┌────────────┬──────────────┬──────────────┬─────────────┬─────┐
/// │ "#bundle\0"│ Timetag      │ Element len  │ Element     │ ... │
/// │ (8B)       │ (8B BE)      │ (4B BE)      │ (len bytes) │     │
/// └────────────┴──────────────┴──────────────┴─────────────┴─────┘
/// ```
///
/// On error nothing is appended to `dst`.
pub fn encode_bundle(bundle: &Bundle, dst: &mut BytesMut) -> std::result::Result<(), EncodeError> {
    let start = dst.len();
    let result = write_bundle(bundle, dst);
    if result.is_err() {
        dst.truncate(start);
    }
    result
}

pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) -> std::result::Result<(), EncodeError> {
    match packet {
        Packet::Message(m) => encode_message(m, dst),
        Packet::Bundle(b) => encode_bundle(b, dst),
    }
}

/// Encode `packet` into a fresh buffer.
pub fn packet_to_bytes(packet: &Packet) -> std::result::Result<Bytes, EncodeError> {
    let mut buf = BytesMut::new();
    encode_packet(packet, &mut buf)?;
    Ok(buf.freeze())
}

fn write_message(msg: &Message, dst: &mut BytesMut) -> std::result::Result<(), EncodeError> {
    if !msg.address.starts_with('/') {
        return Err(EncodeError::InvalidAddress {
            address: msg.address.clone(),
        });
    }
    dst.reserve(encoded_len(msg));
    write_str(&msg.address, dst)?;
    write_str(&msg.type_tags(), dst)?;
    for arg in &msg.args {
        match arg {
            Argument::Int(v) => dst.put_i32(*v),
            Argument::Float(v) => dst.put_f32(*v),
            Argument::String(s) => write_str(s, dst)?,
            Argument::Blob(b) => {
                let len = i32::try_from(b.len()).map_err(|_| EncodeError::TooLarge { size: b.len() })?;
                dst.put_i32(len);
                dst.put_slice(b);
                dst.put_bytes(0, blob_padded_len(b.len()) - b.len());
            }
        }
    }
    Ok(())
}

fn write_bundle(bundle: &Bundle, dst: &mut BytesMut) -> std::result::Result<(), EncodeError> {
    dst.put_slice(BUNDLE_TAG);
    dst.put_u64(bundle.timetag.0);
    for msg in &bundle.messages {
        let len_at = dst.len();
        dst.put_i32(0);
        write_message(msg, dst)?;
        let size = dst.len() - len_at - 4;
        let len = i32::try_from(size).map_err(|_| EncodeError::TooLarge { size })?;
        dst[len_at..len_at + 4].copy_from_slice(&len.to_be_bytes());
    }
    Ok(())
}

fn write_str(s: &str, dst: &mut BytesMut) -> std::result::Result<(), EncodeError> {
    if s.as_bytes().contains(&0) {
        return Err(EncodeError::EmbeddedNul);
    }
    dst.put_slice(s.as_bytes());
    dst.put_bytes(0, padded_len(s.len()) - s.len());
    Ok(())
}

/// Decode one wire packet.
///
/// Never reads past `src` and never panics on malformed input.
pub fn decode_packet(src: &[u8]) -> Result<Packet> {
    match src.first() {
        None => Err(DecodeError::Empty),
        Some(b'#') => decode_bundle(src).map(Packet::Bundle),
        Some(b'/') => decode_message(src).map(Packet::Message),
        Some(&first) => Err(DecodeError::UnrecognizedPacket { first }),
    }
}

/// Decode a packet that must be a plain message.
///
/// A message that ends right after its address decodes with no arguments.
/// Bytes after the last argument are ignored.
pub fn decode_message(src: &[u8]) -> Result<Message> {
    read_message(&mut WireReader::new(src, 0))
}

fn decode_bundle(src: &[u8]) -> Result<Bundle> {
    let mut r = WireReader::new(src, 0);
    if r.take(BUNDLE_TAG.len())? != BUNDLE_TAG {
        return Err(DecodeError::UnrecognizedPacket { first: b'#' });
    }
    let timetag = TimeTag(r.read_u64()?);

    let mut messages = Vec::new();
    while r.remaining() > 0 {
        let offset = r.offset();
        let length = r.read_i32()?;
        let len = usize::try_from(length).map_err(|_| DecodeError::NegativeLength { length, offset })?;
        if len > r.remaining() {
            return Err(DecodeError::LengthExceedsBuffer {
                length: len,
                remaining: r.remaining(),
            });
        }
        let base = r.offset();
        let element = r.take(len)?;
        match element.first() {
            None => return Err(DecodeError::Empty),
            Some(b'#') => return Err(DecodeError::NestedBundle),
            Some(b'/') => messages.push(read_message(&mut WireReader::new(element, base))?),
            Some(&first) => return Err(DecodeError::UnrecognizedPacket { first }),
        }
    }
    Ok(Bundle { timetag, messages })
}

fn read_message(r: &mut WireReader<'_>) -> Result<Message> {
    let address_at = r.offset();
    let address = r.read_str()?;
    if !address.starts_with('/') {
        return match address.as_bytes().first() {
            Some(&first) => Err(DecodeError::UnrecognizedPacket { first }),
            None => Err(DecodeError::InvalidString { offset: address_at }),
        };
    }
    if r.remaining() == 0 {
        return Ok(Message {
            address: address.to_owned(),
            args: Vec::new(),
        });
    }

    let tags = r.read_str()?;
    let tags = tags.strip_prefix(',').ok_or(DecodeError::MissingTypeTag)?;
    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'i' => Argument::Int(r.read_i32()?),
            'f' => Argument::Float(f32::from_bits(r.read_u32()?)),
            's' => Argument::String(r.read_str()?.to_owned()),
            'b' => Argument::Blob(Bytes::copy_from_slice(r.read_blob()?)),
            tag => return Err(DecodeError::UnknownTypeTag { tag }),
        };
        args.push(arg);
    }
    Ok(Message {
        address: address.to_owned(),
        args,
    })
}

/// Bounds-checked cursor over a packet. `base` is the absolute offset of `buf[0]`.
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8], base: usize) -> Self {
        Self { buf, pos: 0, base }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.offset(),
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let hi = self.read_u32()?;
        let lo = self.read_u32()?;
        Ok((u64::from(hi) << 32) | u64::from(lo))
    }

    fn read_str(&mut self) -> Result<&'a str> {
        let offset = self.offset();
        let rest = &self.buf[self.pos..];
        let nul = rest.iter().position(|&b| b == 0).ok_or(DecodeError::Truncated {
            offset: offset + rest.len(),
            needed: 1,
        })?;
        let raw = self.take(padded_len(nul))?;
        std::str::from_utf8(&raw[..nul]).map_err(|_| DecodeError::InvalidString { offset })
    }

    fn read_blob(&mut self) -> Result<&'a [u8]> {
        let offset = self.offset();
        let length = self.read_i32()?;
        let len = usize::try_from(length).map_err(|_| DecodeError::NegativeLength { length, offset })?;
        if len > self.remaining() {
            return Err(DecodeError::LengthExceedsBuffer {
                length: len,
                remaining: self.remaining(),
            });
        }
        let raw = self.take(blob_padded_len(len))?;
        Ok(&raw[..len])
    }
}
