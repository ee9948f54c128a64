use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use oscwire_slip::{SlipConfig, SlipReader, SlipWriter, DEFAULT_MAX_FRAME_SIZE};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::inbox::{PacketInbox, DEFAULT_INBOX_CAPACITY};
use crate::length_prefix::{self, LengthPrefixReader};
use crate::traits::PacketTransport;

/// Default baud rate for serial links.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default reader poll interval; bounds how long `disconnect` waits for the reader.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// How packets are delimited on the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// SLIP escaping (serial and USB CDC).
    Slip,
    /// 4-byte big-endian size prefix (TCP).
    LengthPrefixed,
}

/// Configuration for a [`StreamTransport`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Read timeout the reader thread polls with.
    pub poll_interval: Duration,
    /// Largest packet accepted or sent. Default: 16 KiB.
    pub max_packet_size: usize,
    pub framing: Framing,
    /// Write timeout for owned streams. Default: 1 s.
    pub write_timeout: Option<Duration>,
    /// Received packets held before the oldest are dropped.
    pub inbox_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_packet_size: DEFAULT_MAX_FRAME_SIZE,
            framing: Framing::Slip,
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

/// Serial port parameters (USB CDC or UART).
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: u32,
}

impl SerialConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Independent read and write halves of one open byte stream.
pub struct StreamPair {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl StreamPair {
    pub fn new(reader: impl Read + Send + 'static, writer: impl Write + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            closer: None,
        }
    }

    /// Run `closer` on disconnect to unblock a reader stuck in `read`.
    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }

    /// Split a TCP stream, shutting the socket down on disconnect.
    pub fn from_tcp(stream: TcpStream, config: &StreamConfig) -> std::io::Result<Self> {
        stream.set_read_timeout(Some(config.poll_interval))?;
        stream.set_write_timeout(config.write_timeout)?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        let closer = stream.try_clone()?;
        Ok(Self::new(stream, writer).with_closer(move || {
            let _ = closer.shutdown(std::net::Shutdown::Both);
        }))
    }
}

/// Something that can (re)open a byte stream.
pub trait StreamOpener: Send {
    fn open(&mut self, config: &StreamConfig) -> Result<StreamPair>;

    fn describe(&self) -> String;
}

impl StreamOpener for SerialConfig {
    fn open(&mut self, config: &StreamConfig) -> Result<StreamPair> {
        let connect_err = |err: serialport::Error| TransportError::Connect {
            target: self.path.clone(),
            source: err.into(),
        };
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(config.poll_interval)
            .open()
            .map_err(connect_err)?;
        let mut writer = port.try_clone().map_err(connect_err)?;
        writer
            .set_timeout(config.write_timeout.unwrap_or(DEFAULT_WRITE_TIMEOUT))
            .map_err(connect_err)?;
        debug!(path = %self.path, baud = self.baud_rate, "opened serial port");
        Ok(StreamPair::new(port, writer))
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}

/// Opens an outgoing TCP connection.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub addr: String,
}

impl StreamOpener for TcpConnector {
    fn open(&mut self, config: &StreamConfig) -> Result<StreamPair> {
        let connect_err = |source| TransportError::Connect {
            target: self.addr.clone(),
            source,
        };
        let stream = TcpStream::connect(&self.addr).map_err(connect_err)?;
        StreamPair::from_tcp(stream, config).map_err(connect_err)
    }

    fn describe(&self) -> String {
        self.addr.clone()
    }
}

/// Wraps an already-open stream. It opens exactly once.
///
/// The reader half must have a read timeout or reach EOF on close, otherwise
/// `disconnect` blocks until the next byte arrives. Use [`StreamPair::with_closer`]
/// to unblock it instead.
pub struct PairOpener {
    pair: Option<StreamPair>,
    label: String,
}

impl PairOpener {
    pub fn new(pair: StreamPair, label: impl Into<String>) -> Self {
        Self {
            pair: Some(pair),
            label: label.into(),
        }
    }
}

impl StreamOpener for PairOpener {
    fn open(&mut self, _config: &StreamConfig) -> Result<StreamPair> {
        self.pair.take().ok_or_else(|| TransportError::Connect {
            target: self.label.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "stream was already consumed and cannot be reopened",
            ),
        })
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

enum FrameSink {
    Slip(SlipWriter<Box<dyn Write + Send>>),
    LengthPrefixed(Box<dyn Write + Send>),
}

enum FrameSource {
    Slip(SlipReader<Box<dyn Read + Send>>),
    LengthPrefixed(LengthPrefixReader<Box<dyn Read + Send>>),
}

impl FrameSource {
    fn poll_packet(&mut self) -> Result<Option<Bytes>> {
        match self {
            FrameSource::Slip(reader) => reader.poll_packet().map_err(Into::into),
            FrameSource::LengthPrefixed(reader) => reader.poll_packet(),
        }
    }
}

struct Connection {
    sink: FrameSink,
    inbox: Arc<PacketInbox>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    closer: Option<Box<dyn FnOnce() + Send>>,
}

/// Packet transport over a byte stream: serial, USB CDC or TCP.
///
/// A background thread unframes incoming bytes into a queue; `send` frames
/// and writes on the caller's thread. A hard write failure closes the
/// transport so the owner can drop or reconnect it.
pub struct StreamTransport {
    opener: Box<dyn StreamOpener>,
    config: StreamConfig,
    conn: Option<Connection>,
}

impl StreamTransport {
    pub fn new(opener: impl StreamOpener + 'static, config: StreamConfig) -> Self {
        Self {
            opener: Box::new(opener),
            config,
            conn: None,
        }
    }

    /// SLIP over a serial port.
    pub fn serial(serial: SerialConfig) -> Self {
        Self::new(serial, StreamConfig::default())
    }

    /// Length-prefixed packets over an outgoing TCP connection.
    pub fn tcp_client(addr: impl Into<String>) -> Self {
        Self::new(
            TcpConnector { addr: addr.into() },
            StreamConfig {
                framing: Framing::LengthPrefixed,
                ..StreamConfig::default()
            },
        )
    }

    /// Wrap an already-open stream.
    pub fn from_pair(pair: StreamPair, label: impl Into<String>, config: StreamConfig) -> Self {
        Self::new(PairOpener::new(pair, label), config)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Packets dropped since connect because the owner fell behind.
    pub fn dropped_packets(&self) -> u64 {
        self.conn.as_ref().map_or(0, |conn| conn.inbox.dropped())
    }

    fn open_conn(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl PacketTransport for StreamTransport {
    fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let location = self.opener.describe();
        let pair = self.opener.open(&self.config)?;
        let StreamPair {
            reader,
            writer,
            closer,
        } = pair;

        let (source, sink) = match self.config.framing {
            Framing::Slip => {
                let slip = SlipConfig {
                    max_frame_size: self.config.max_packet_size,
                    ..SlipConfig::default()
                };
                (
                    FrameSource::Slip(SlipReader::with_config(reader, slip.clone())),
                    FrameSink::Slip(SlipWriter::with_config(writer, slip)),
                )
            }
            Framing::LengthPrefixed => (
                FrameSource::LengthPrefixed(LengthPrefixReader::new(
                    reader,
                    self.config.max_packet_size,
                )),
                FrameSink::LengthPrefixed(writer),
            ),
        };

        let inbox = Arc::new(PacketInbox::new(self.config.inbox_capacity));
        inbox.reopen();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let inbox = Arc::clone(&inbox);
            let stop = Arc::clone(&stop);
            let location = location.clone();
            std::thread::Builder::new()
                .name("oscwire-stream-reader".into())
                .spawn(move || read_loop(source, &inbox, &stop, &location))?
        };

        info!(%location, framing = ?self.config.framing, "stream transport open");
        self.conn = Some(Connection {
            sink,
            inbox,
            stop,
            reader: Some(handle),
            closer,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        conn.stop.store(true, Ordering::SeqCst);
        if let Some(closer) = conn.closer.take() {
            closer();
        }
        if let Some(handle) = conn.reader.take() {
            let _ = handle.join();
        }
        conn.inbox.clear_and_close();
        debug!(location = %self.opener.describe(), "stream transport closed");
    }

    fn is_open(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|conn| !conn.inbox.is_closed())
    }

    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        let max = self.config.max_packet_size;
        if packet.len() > max {
            return Err(TransportError::PacketTooLarge {
                size: packet.len(),
                max,
            });
        }
        let conn = self.open_conn()?;
        let result = match &mut conn.sink {
            FrameSink::Slip(writer) => writer.send(packet).map(|_| ()).map_err(Into::into),
            FrameSink::LengthPrefixed(writer) => length_prefix::write_packet(writer, packet),
        };
        match result {
            Ok(()) => Ok(packet.len()),
            Err(err) => {
                warn!(location = %self.opener.describe(), error = %err, "stream write failed, closing");
                self.disconnect();
                Err(err)
            }
        }
    }

    fn has_packet_waiting(&mut self) -> bool {
        self.conn.as_ref().is_some_and(|conn| conn.inbox.len() > 0)
    }

    fn pending_packet_size(&mut self) -> Option<usize> {
        self.conn.as_ref().and_then(|conn| conn.inbox.peek_len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let conn = self.open_conn()?;
        Ok(conn.inbox.take_into(buf)?.map_or(0, |(n, _)| n))
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        let conn = self.open_conn()?;
        Ok(conn.inbox.pop_timeout(timeout)?.map(|p| p.data))
    }

    fn location(&self) -> String {
        self.opener.describe()
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn read_loop(mut source: FrameSource, inbox: &PacketInbox, stop: &AtomicBool, location: &str) {
    while !stop.load(Ordering::SeqCst) {
        match source.poll_packet() {
            Ok(Some(packet)) => {
                if inbox.push(packet, None) {
                    debug!(%location, dropped = inbox.dropped(), "inbox full, dropped oldest packet");
                }
            }
            Ok(None) => {}
            Err(TransportError::Closed) => {
                info!(%location, "stream closed by peer");
                break;
            }
            Err(err) => {
                if !stop.load(Ordering::SeqCst) {
                    warn!(%location, error = %err, "stream read failed");
                }
                break;
            }
        }
    }
    inbox.close();
}
