use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::codec::{SlipConfig, SlipDecoder};
use crate::error::{Result, SlipError};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete SLIP packets from any `Read` stream.
///
/// Handles partial reads internally: callers always get whole, unescaped packets.
pub struct SlipReader<T> {
    inner: T,
    decoder: SlipDecoder,
    ready: VecDeque<Bytes>,
    config: SlipConfig,
}

impl<T: Read> SlipReader<T> {
    /// Create a new reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, SlipConfig::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: SlipConfig) -> Self {
        Self {
            inner,
            decoder: SlipDecoder::with_max_frame_size(config.max_frame_size),
            ready: VecDeque::new(),
            config,
        }
    }

    /// Read the next complete packet (blocking).
    ///
    /// Returns `Err(SlipError::ConnectionClosed)` at EOF.
    pub fn read_packet(&mut self) -> Result<Bytes> {
        loop {
            if let Some(packet) = self.ready.pop_front() {
                return Ok(packet);
            }
            if self.fill()? == 0 {
                return Err(SlipError::ConnectionClosed);
            }
        }
    }

    /// Return a packet if one is ready after at most one read.
    ///
    /// A read that times out or would block yields `Ok(None)`, so this suits streams
    /// configured with a short read timeout or non-blocking mode.
    pub fn poll_packet(&mut self) -> Result<Option<Bytes>> {
        if let Some(packet) = self.ready.pop_front() {
            return Ok(Some(packet));
        }
        match self.fill() {
            Ok(0) => Err(SlipError::ConnectionClosed),
            Ok(_) => Ok(self.ready.pop_front()),
            Err(SlipError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Number of complete packets buffered and not yet returned.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Peek at the next buffered packet without consuming it.
    pub fn peek_ready(&self) -> Option<&Bytes> {
        self.ready.front()
    }

    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(SlipError::Io(err)),
            }
        };
        let ready = &mut self.ready;
        self.decoder.feed_slice(&chunk[..read], |packet| ready.push_back(packet));
        Ok(read)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream. Buffered packets are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The unwrap state machine, for inspection.
    pub fn decoder(&self) -> &SlipDecoder {
        &self.decoder
    }

    /// Current reader configuration.
    pub fn config(&self) -> &SlipConfig {
        &self.config
    }
}
