use oscwire_codec::{encoded_len, Message, Packet, BUNDLE_HEADER_SIZE};

/// Collects reply messages and packs them into as few packets as fit under a
/// size limit.
///
/// One pending message goes out as a plain message, several as an immediate
/// bundle. A message that would push the bundle past the limit flushes what is
/// already pending first. A single message larger than the limit still goes out
/// on its own.
#[derive(Debug, Clone)]
pub struct ReplyQueue {
    pending: Vec<Message>,
    bundle_len: usize,
    max: usize,
}

impl ReplyQueue {
    pub fn new(max_packet: usize) -> Self {
        Self {
            pending: Vec::new(),
            bundle_len: BUNDLE_HEADER_SIZE,
            max: max_packet,
        }
    }

    pub fn max_packet(&self) -> usize {
        self.max
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue `msg`, returning a full packet if one had to be cut to make room.
    pub fn push(&mut self, msg: Message) -> Option<Packet> {
        let element = 4 + encoded_len(&msg);
        let flushed = if !self.pending.is_empty() && self.bundle_len + element > self.max {
            self.flush()
        } else {
            None
        };
        self.bundle_len += element;
        self.pending.push(msg);
        flushed
    }

    /// Discard everything pending.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.bundle_len = BUNDLE_HEADER_SIZE;
    }

    /// Take everything pending as one packet.
    pub fn flush(&mut self) -> Option<Packet> {
        self.bundle_len = BUNDLE_HEADER_SIZE;
        Packet::from_messages(std::mem::take(&mut self.pending))
    }
}
