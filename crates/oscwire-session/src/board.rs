use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use oscwire_codec::address::{
    is_error_reply, ERROR_PREFIX, INFO_INTERNAL, INFO_INTERNAL_A, INFO_INTERNAL_B,
};
use oscwire_codec::{decode_packet, encode_packet, parse_command, Argument, Message, Packet};
use oscwire_transport::PacketTransport;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::info::BoardInfo;

/// Events held back while a request waits for its reply.
const MAX_BACKLOG: usize = 256;

/// Timing knobs for a [`Board`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Slice used when waiting on the transport.
    pub poll_interval: Duration,
    /// Default wait for [`Board::request`] and [`Board::request_info`].
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(1),
        }
    }
}

/// Something that arrived from a board.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// An ordinary reply or unsolicited message.
    Message(Message),
    /// The board rejected a request sent to `address`.
    ErrorReply { address: String, reason: String },
    /// An info-bearing reply updated [`Board::info`].
    InfoUpdated(Message),
    /// The transport closed. Reported once.
    Closed,
}

impl BoardEvent {
    fn classify(msg: Message, info: &mut BoardInfo) -> Self {
        if is_error_reply(&msg) {
            let reason = match msg.args.as_slice() {
                [Argument::String(s)] => s.strip_prefix(ERROR_PREFIX).unwrap_or(s).to_string(),
                _ => msg.to_string(),
            };
            return BoardEvent::ErrorReply {
                address: msg.address,
                reason,
            };
        }
        if info.apply(&msg) {
            return BoardEvent::InfoUpdated(msg);
        }
        BoardEvent::Message(msg)
    }

    /// Address the event arrived on, if it carries one.
    pub fn address(&self) -> Option<&str> {
        match self {
            BoardEvent::Message(m) | BoardEvent::InfoUpdated(m) => Some(&m.address),
            BoardEvent::ErrorReply { address, .. } => Some(address),
            BoardEvent::Closed => None,
        }
    }
}

/// Host-side session with one board over any [`PacketTransport`].
///
/// Board identity in [`info`](Self::info) is empty until the first
/// info-bearing reply arrives.
pub struct Board<T> {
    transport: T,
    config: SessionConfig,
    info: BoardInfo,
    /// Messages from a received bundle not yet handed out.
    unread: VecDeque<Message>,
    backlog: VecDeque<BoardEvent>,
    closed: bool,
    closed_reported: bool,
}

impl<T: PacketTransport> Board<T> {
    /// Connect `transport` and start a session.
    pub fn open(mut transport: T, config: SessionConfig) -> Result<Self> {
        transport.connect()?;
        info!(location = %transport.location(), "board open");
        Ok(Self {
            transport,
            config,
            info: BoardInfo::default(),
            unread: VecDeque::new(),
            backlog: VecDeque::new(),
            closed: false,
            closed_reported: false,
        })
    }

    pub fn location(&self) -> String {
        self.transport.location()
    }

    pub fn info(&self) -> &BoardInfo {
        &self.info
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_open(&self) -> bool {
        !self.closed && self.transport.is_open()
    }

    /// Send one message as a plain packet.
    pub fn send(&mut self, msg: &Message) -> Result<()> {
        let mut buf = BytesMut::new();
        oscwire_codec::encode_message(msg, &mut buf)?;
        self.send_raw(&buf)
    }

    /// Send several messages in one packet: a plain message for one, an
    /// immediate bundle for more. An empty list sends nothing.
    pub fn send_messages(&mut self, messages: Vec<Message>) -> Result<()> {
        let Some(packet) = Packet::from_messages(messages) else {
            return Ok(());
        };
        let mut buf = BytesMut::new();
        encode_packet(&packet, &mut buf)?;
        self.send_raw(&buf)
    }

    /// Parse a command line such as `/motor/1/speed 512` and send it.
    pub fn send_command(&mut self, line: &str) -> Result<Message> {
        let msg = parse_command(line)?;
        self.send(&msg)?;
        Ok(msg)
    }

    fn send_raw(&mut self, packet: &[u8]) -> Result<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if let Err(err) = self.transport.send(packet) {
            warn!(location = %self.transport.location(), error = %err, "send failed, closing board");
            self.mark_closed();
            return Err(err.into());
        }
        Ok(())
    }

    fn mark_closed(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.disconnect();
        }
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// `Ok(None)` means nothing arrived. After [`BoardEvent::Closed`] has been
    /// returned once, further calls fail with [`SessionError::Closed`].
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<BoardEvent>> {
        if let Some(event) = self.backlog.pop_front() {
            return Ok(Some(event));
        }
        self.next_event(Instant::now() + timeout)
    }

    fn next_event(&mut self, deadline: Instant) -> Result<Option<BoardEvent>> {
        loop {
            if let Some(msg) = self.unread.pop_front() {
                return Ok(Some(BoardEvent::classify(msg, &mut self.info)));
            }
            if self.closed {
                if self.closed_reported {
                    return Err(SessionError::Closed);
                }
                self.closed_reported = true;
                return Ok(Some(BoardEvent::Closed));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = (deadline - now).min(self.config.poll_interval);
            match self.transport.recv_timeout(wait) {
                Ok(Some(bytes)) => match decode_packet(&bytes) {
                    Ok(packet) => self.unread.extend(packet.into_messages()),
                    Err(err) => {
                        warn!(size = bytes.len(), error = %err, "dropping malformed packet from board");
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    debug!(location = %self.transport.location(), error = %err, "board transport closed");
                    self.mark_closed();
                }
            }
        }
    }

    fn hold(&mut self, event: BoardEvent) {
        if self.backlog.len() == MAX_BACKLOG {
            warn!(max = MAX_BACKLOG, "board backlog full, dropping oldest event");
            self.backlog.pop_front();
        }
        self.backlog.push_back(event);
    }

    /// Send `msg` and wait for the reply on the same address.
    ///
    /// Unrelated events that arrive meanwhile stay queued for
    /// [`recv_timeout`](Self::recv_timeout).
    pub fn request(&mut self, msg: &Message, timeout: Duration) -> Result<Message> {
        self.send(msg)?;
        let deadline = Instant::now() + timeout;
        loop {
            match self.next_event(deadline)? {
                None => return Err(SessionError::Timeout(timeout)),
                Some(BoardEvent::Closed) => return Err(SessionError::Closed),
                Some(event) if event.address() == Some(msg.address.as_str()) => {
                    return match event {
                        BoardEvent::Message(reply) | BoardEvent::InfoUpdated(reply) => Ok(reply),
                        BoardEvent::ErrorReply { address, reason } => {
                            Err(SessionError::Remote { address, reason })
                        }
                        BoardEvent::Closed => Err(SessionError::Closed),
                    };
                }
                Some(event) => self.hold(event),
            }
        }
    }

    /// Query the board's identity and wait for both info replies.
    pub fn request_info(&mut self, timeout: Duration) -> Result<&BoardInfo> {
        self.send(&Message::new(INFO_INTERNAL))?;
        let deadline = Instant::now() + timeout;
        let (mut got_a, mut got_b) = (false, false);
        while !(got_a && got_b) {
            match self.next_event(deadline)? {
                None => return Err(SessionError::Timeout(timeout)),
                Some(BoardEvent::Closed) => return Err(SessionError::Closed),
                Some(BoardEvent::InfoUpdated(m)) if m.address == INFO_INTERNAL_A => got_a = true,
                Some(BoardEvent::InfoUpdated(m)) if m.address == INFO_INTERNAL_B => got_b = true,
                Some(BoardEvent::ErrorReply { address, reason }) if address == INFO_INTERNAL => {
                    return Err(SessionError::Remote { address, reason });
                }
                Some(event) => self.hold(event),
            }
        }
        Ok(&self.info)
    }

    /// Drop the current link and open it again. Learned info is kept.
    pub fn reconnect(&mut self) -> Result<()> {
        self.transport.disconnect();
        self.unread.clear();
        self.backlog.clear();
        self.transport.connect()?;
        self.closed = false;
        self.closed_reported = false;
        info!(location = %self.transport.location(), "board reconnected");
        Ok(())
    }

    /// Close the link. Further sends fail with [`SessionError::Closed`].
    pub fn close(&mut self) {
        self.mark_closed();
        self.closed_reported = true;
        self.unread.clear();
        debug!(location = %self.transport.location(), "board closed");
    }

    pub fn into_transport(mut self) -> T {
        self.transport.disconnect();
        self.transport
    }
}
