//! Addresses with fixed meaning on both sides of the link.

use crate::message::{Argument, Message};

/// Board info query. The board answers with two messages, sent to
/// [`INFO_INTERNAL_A`] and [`INFO_INTERNAL_B`].
pub const INFO_INTERNAL: &str = "/system/info-internal";

/// First info reply; carries name (s), serial number (i), IP address (s),
/// firmware version (s), free memory (i).
pub const INFO_INTERNAL_A: &str = "/system/info-internal-a";

/// Second info reply; carries DHCP (i), webserver (i), gateway (s), netmask (s),
/// UDP listen port (i), UDP send port (i).
pub const INFO_INTERNAL_B: &str = "/system/info-internal-b";

/// Broadcast discovery; reply carries IP address (s), UDP listen port (i),
/// UDP send port (i), name (s).
pub const NETWORK_FIND: &str = "/network/find";

/// Leading text of every error reply's single string argument.
pub const ERROR_PREFIX: &str = "error: ";

/// Build the error reply for a request that failed at `address`.
pub fn error_reply(address: &str, reason: impl std::fmt::Display) -> Message {
    Message::new(address).with_arg(format!("{ERROR_PREFIX}{reason}"))
}

/// `true` for replies produced by [`error_reply`] or sent to an `.../error` address.
pub fn is_error_reply(msg: &Message) -> bool {
    if msg.address.rsplit('/').next() == Some("error") {
        return true;
    }
    matches!(msg.args.as_slice(), [Argument::String(s)] if s.starts_with(ERROR_PREFIX))
}
