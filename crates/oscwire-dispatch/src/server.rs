use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oscwire_codec::{decode_packet, packet_to_bytes, Message, Packet};
use oscwire_transport::{PacketTransport, TransportError};
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::discovery::Discovery;
use crate::registry::Registry;
use crate::reply::ReplyQueue;

/// Address used for replies to packets that could not be decoded.
pub const DECODE_ERROR_ADDRESS: &str = "/error";

/// Counters kept by a [`DeviceServer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub packets: u64,
    pub messages: u64,
    pub replies: u64,
    pub errors: u64,
    pub decode_failures: u64,
    /// Reply packets dropped because nobody had sent us anything yet.
    pub unroutable: u64,
    /// Reply packets the link accepted but could not deliver.
    pub undeliverable: u64,
}

/// Device-side receive → decode → dispatch → reply loop over one transport.
pub struct DeviceServer<T> {
    transport: T,
    registry: Arc<Registry>,
    discovery: Option<Discovery>,
    config: DispatchConfig,
    replies: ReplyQueue,
    stats: ServerStats,
}

impl<T: PacketTransport> DeviceServer<T> {
    pub fn new(transport: T, registry: Arc<Registry>) -> Self {
        Self::with_config(transport, registry, DispatchConfig::default())
    }

    pub fn with_config(transport: T, registry: Arc<Registry>, config: DispatchConfig) -> Self {
        Self {
            transport,
            registry,
            discovery: None,
            replies: ReplyQueue::new(config.max_reply_packet),
            config,
            stats: ServerStats::default(),
        }
    }

    /// Answer info and find queries before they reach the registry.
    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Decode one packet, dispatch every message in it, and send the replies.
    ///
    /// Decode and dispatch failures are answered or logged, never returned.
    /// Only a failing transport is an error. Replies still pending when the
    /// transport fails are discarded.
    pub fn handle_packet(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        let result = self.process(packet);
        if result.is_err() && !self.replies.is_empty() {
            debug!(dropped = self.replies.len(), "discarding pending replies");
            self.replies.clear();
        }
        result
    }

    fn process(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        self.stats.packets += 1;

        let decoded = match decode_packet(packet) {
            Ok(p) => p,
            Err(err) => {
                self.stats.decode_failures += 1;
                warn!(size = packet.len(), error = %err, "dropping malformed packet");
                if self.config.reply_decode_errors {
                    let reply = oscwire_codec::address::error_reply(DECODE_ERROR_ADDRESS, err);
                    self.queue(reply)?;
                }
                return self.flush();
            }
        };

        for msg in decoded.messages() {
            self.stats.messages += 1;
            self.handle_message(msg)?;
        }
        self.flush()
    }

    fn handle_message(&mut self, msg: &Message) -> Result<(), TransportError> {
        if let Some(answers) = self.discovery.as_ref().and_then(|d| d.answer(msg)) {
            debug!(address = %msg.address, "discovery query");
            for reply in answers {
                self.queue(reply)?;
            }
            return Ok(());
        }

        match self.registry.dispatch(msg) {
            Ok(Some(reply)) => self.queue(reply),
            Ok(None) => Ok(()),
            Err(err) => {
                self.stats.errors += 1;
                debug!(address = %msg.address, error = %err, "dispatch failed");
                self.queue(err.to_reply(&msg.address))
            }
        }
    }

    fn queue(&mut self, reply: Message) -> Result<(), TransportError> {
        match self.replies.push(reply) {
            Some(full) => self.send(&full),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        match self.replies.flush() {
            Some(packet) => self.send(&packet),
            None => Ok(()),
        }
    }

    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        let bytes = match packet_to_bytes(packet) {
            Ok(b) => b,
            Err(err) => {
                warn!(error = %err, "reply could not be encoded, dropping");
                return Ok(());
            }
        };
        match self.transport.send(&bytes) {
            Ok(_) => {
                self.stats.replies += packet.messages().len() as u64;
                Ok(())
            }
            Err(TransportError::NoReturnAddress) => {
                self.stats.unroutable += 1;
                for msg in packet.messages() {
                    warn!(address = %msg.address, "no return address, reply dropped");
                }
                Ok(())
            }
            Err(TransportError::PacketTooLarge { size, max }) => {
                warn!(size, max, "reply exceeds transport limit, dropping");
                Ok(())
            }
            Err(TransportError::Undeliverable { to, source }) => {
                self.stats.undeliverable += 1;
                warn!(%to, error = %source, "reply not delivered, dropping");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Wait up to `timeout` for one packet and handle it.
    ///
    /// Returns `Ok(false)` when the wait timed out.
    pub fn poll_once(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        match self.transport.recv_timeout(timeout)? {
            Some(packet) => {
                self.handle_packet(&packet)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Serve until `running` goes false or the transport fails.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), TransportError> {
        self.transport.connect()?;
        info!(location = %self.transport.location(), "device server started");
        while running.load(Ordering::SeqCst) {
            if let Err(err) = self.poll_once(self.config.poll_interval) {
                warn!(error = %err, "device server stopping on transport error");
                self.transport.disconnect();
                return Err(err);
            }
        }
        info!(stats = ?self.stats, "device server stopped");
        self.transport.disconnect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use bytes::Bytes;
    use oscwire_codec::address::{INFO_INTERNAL, INFO_INTERNAL_A, INFO_INTERNAL_B};
    use oscwire_codec::Argument;
    use oscwire_slip::{wrap, SlipConfig, SlipDecoder};
    use oscwire_transport::IntakeTransport;

    use super::*;
    use crate::identity::IdentityStore;
    use crate::system::SystemSubsystem;

    type Server = DeviceServer<IntakeTransport<Vec<u8>>>;

    fn server(config: DispatchConfig) -> Server {
        let identity = Arc::new(IdentityStore::default());
        let registry = Registry::builder()
            .with(SystemSubsystem::new(Arc::clone(&identity)))
            .unwrap()
            .build();
        let (mut transport, _intake) = IntakeTransport::new(256, Vec::new(), SlipConfig::default());
        transport.connect().unwrap();
        DeviceServer::with_config(transport, Arc::new(registry), config)
            .with_discovery(Discovery::new(identity))
    }

    fn encode(packet: impl Into<Packet>) -> Vec<u8> {
        packet_to_bytes(&packet.into()).unwrap().to_vec()
    }

    /// Unframe everything the server wrote and decode each packet.
    fn sent(server: &Server) -> Vec<Packet> {
        let mut decoder = SlipDecoder::new();
        let mut out = Vec::new();
        decoder.feed_slice(server.transport().writer(), |p| {
            out.push(decode_packet(&p).unwrap());
        });
        out
    }

    #[test]
    fn read_request_gets_single_message_reply() {
        let mut s = server(DispatchConfig::default());
        s.handle_packet(&encode(Message::new("/system/name"))).unwrap();

        let packets = sent(&s);
        assert_eq!(packets.len(), 1);
        let Packet::Message(reply) = &packets[0] else {
            panic!("expected plain message");
        };
        assert_eq!(reply.address, "/system/name");
        assert_eq!(reply.args, vec![Argument::String("oscwire".into())]);
        assert_eq!(s.stats().replies, 1);
    }

    #[test]
    fn write_request_sends_nothing() {
        let mut s = server(DispatchConfig::default());
        s.handle_packet(&encode(Message::new("/system/serialnumber").with_arg(7)))
            .unwrap();
        assert!(s.transport().writer().is_empty());
    }

    #[test]
    fn info_query_replies_in_one_bundle() {
        let mut s = server(DispatchConfig::default());
        s.handle_packet(&encode(Message::new(INFO_INTERNAL))).unwrap();

        let packets = sent(&s);
        assert_eq!(packets.len(), 1);
        let addrs: Vec<_> = packets[0].messages().iter().map(|m| m.address.as_str()).collect();
        assert_eq!(addrs, [INFO_INTERNAL_A, INFO_INTERNAL_B]);
    }

    #[test]
    fn unknown_address_gets_error_reply_on_same_address() {
        let mut s = server(DispatchConfig::default());
        s.handle_packet(&encode(Message::new("/lamp/0/value"))).unwrap();

        let packets = sent(&s);
        let reply = &packets[0].messages()[0];
        assert_eq!(reply.address, "/lamp/0/value");
        assert!(oscwire_codec::address::is_error_reply(reply));
        assert_eq!(s.stats().errors, 1);
    }

    #[test]
    fn bundle_requests_are_answered_in_order() {
        let mut s = server(DispatchConfig::default());
        let bundle = oscwire_codec::Bundle::new(vec![
            Message::new("/system/name").with_arg("alpha"),
            Message::new("/system/name"),
            Message::new("/system/version"),
        ]);
        s.handle_packet(&encode(bundle)).unwrap();

        let packets = sent(&s);
        assert_eq!(packets.len(), 1);
        let msgs = packets[0].messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].args[0].as_str(), Some("alpha"));
        assert_eq!(msgs[1].address, "/system/version");
    }

    #[test]
    fn small_reply_limit_splits_packets() {
        let mut s = server(DispatchConfig {
            max_reply_packet: 64,
            ..DispatchConfig::default()
        });
        s.handle_packet(&encode(Message::new(INFO_INTERNAL))).unwrap();
        let packets = sent(&s);
        assert_eq!(packets.len(), 2);
        assert!(matches!(packets[0], Packet::Message(_)));
    }

    #[test]
    fn malformed_packet_is_dropped_silently_by_default() {
        let mut s = server(DispatchConfig::default());
        s.handle_packet(b"/sys").unwrap();
        assert!(s.transport().writer().is_empty());
        assert_eq!(s.stats().decode_failures, 1);
    }

    #[test]
    fn malformed_packet_reply_when_enabled() {
        let mut s = server(DispatchConfig {
            reply_decode_errors: true,
            ..DispatchConfig::default()
        });
        s.handle_packet(b"/sys").unwrap();
        let packets = sent(&s);
        assert_eq!(packets[0].messages()[0].address, DECODE_ERROR_ADDRESS);
    }

    #[test]
    fn poll_once_reads_from_transport() {
        let identity = Arc::new(IdentityStore::default());
        let registry = Registry::builder()
            .with(SystemSubsystem::new(identity))
            .unwrap()
            .build();
        let (mut transport, mut intake) =
            IntakeTransport::new(256, Vec::new(), SlipConfig::default());
        transport.connect().unwrap();
        let mut s = DeviceServer::new(transport, Arc::new(registry));

        assert!(!s.poll_once(Duration::from_millis(5)).unwrap());
        intake.on_bytes(&wrap(&encode(Message::new("/system/version"))));
        assert!(s.poll_once(Duration::from_millis(500)).unwrap());
        assert_eq!(sent(&s).len(), 1);
    }

    /// Records sent packets; fails sends with queued errors first.
    #[derive(Default)]
    struct ScriptedTransport {
        failures: VecDeque<TransportError>,
        sent: Vec<Vec<u8>>,
    }

    impl PacketTransport for ScriptedTransport {
        fn connect(&mut self) -> oscwire_transport::Result<()> {
            Ok(())
        }

        fn disconnect(&mut self) {}

        fn is_open(&self) -> bool {
            true
        }

        fn send(&mut self, packet: &[u8]) -> oscwire_transport::Result<usize> {
            if let Some(err) = self.failures.pop_front() {
                return Err(err);
            }
            self.sent.push(packet.to_vec());
            Ok(packet.len())
        }

        fn has_packet_waiting(&mut self) -> bool {
            false
        }

        fn pending_packet_size(&mut self) -> Option<usize> {
            None
        }

        fn receive(&mut self, _buf: &mut [u8]) -> oscwire_transport::Result<usize> {
            Ok(0)
        }

        fn recv_timeout(&mut self, _timeout: Duration) -> oscwire_transport::Result<Option<Bytes>> {
            Ok(None)
        }

        fn location(&self) -> String {
            "scripted".into()
        }
    }

    fn scripted_server(
        failures: Vec<TransportError>,
        config: DispatchConfig,
    ) -> DeviceServer<ScriptedTransport> {
        let identity = Arc::new(IdentityStore::default());
        let registry = Registry::builder()
            .with(SystemSubsystem::new(identity))
            .unwrap()
            .build();
        let transport = ScriptedTransport {
            failures: failures.into(),
            sent: Vec::new(),
        };
        DeviceServer::with_config(transport, Arc::new(registry), config)
    }

    fn sent_addresses(server: &DeviceServer<ScriptedTransport>) -> Vec<Vec<String>> {
        server
            .transport()
            .sent
            .iter()
            .map(|p| {
                decode_packet(p)
                    .unwrap()
                    .messages()
                    .iter()
                    .map(|m| m.address.clone())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn transport_failure_discards_pending_replies() {
        let broken = io::Error::new(io::ErrorKind::BrokenPipe, "link down");
        let mut s = scripted_server(
            vec![TransportError::Io(broken)],
            DispatchConfig {
                max_reply_packet: 40,
                ..DispatchConfig::default()
            },
        );

        // The name reply is cut first and fails; the version reply is still pending.
        let bundle = oscwire_codec::Bundle::new(vec![
            Message::new("/system/name"),
            Message::new("/system/version"),
        ]);
        assert!(s.handle_packet(&encode(bundle)).is_err());

        s.handle_packet(&encode(Message::new("/system/serialnumber")))
            .unwrap();
        assert_eq!(sent_addresses(&s), [vec!["/system/serialnumber".to_string()]]);
    }

    #[test]
    fn undeliverable_reply_keeps_server_running() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let mut s = scripted_server(
            vec![TransportError::Undeliverable {
                to: "127.0.0.1:9".parse().unwrap(),
                source: refused,
            }],
            DispatchConfig::default(),
        );

        s.handle_packet(&encode(Message::new("/system/name"))).unwrap();
        assert_eq!(s.stats().undeliverable, 1);
        assert!(s.transport().sent.is_empty());

        s.handle_packet(&encode(Message::new("/system/version")))
            .unwrap();
        assert_eq!(sent_addresses(&s), [vec!["/system/version".to_string()]]);
        assert_eq!(s.stats().replies, 1);
    }
}
