use std::time::Duration;

/// Default reply buffer size, matching the firmware's outgoing packet buffer.
pub const DEFAULT_MAX_REPLY_PACKET: usize = 512;

/// Controls device-side dispatch behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound on one outgoing reply packet. Replies are batched into a
    /// bundle until the next one would not fit.
    pub max_reply_packet: usize,
    /// When true, packets that fail to decode are answered with an error reply
    /// to `/error`.
    pub reply_decode_errors: bool,
    /// How long `DeviceServer::run` waits for a packet before checking its
    /// running flag again.
    pub poll_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_reply_packet: DEFAULT_MAX_REPLY_PACKET,
            reply_decode_errors: false,
            poll_interval: Duration::from_millis(100),
        }
    }
}
