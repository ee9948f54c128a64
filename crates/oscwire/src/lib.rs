//! OSC messaging between hosts and microcontroller boards.
//!
//! oscwire speaks OSC 1.0 over serial/USB (SLIP-framed), UDP and TCP, from
//! either end of the link.
//!
//! # Crate Structure
//!
//! - [`codec`]: message and bundle encoding
//! - [`slip`]: SLIP framing for byte streams
//! - [`transport`]: packet transports (serial, UDP, TCP, byte-ring intake)
//! - [`dispatch`]: device-side address routing (behind `device` feature)
//! - [`session`]: host-side board sessions (behind `session` feature)
//! - [`sim`]: a simulated board built on [`dispatch`] (behind `device` feature)

/// Re-export codec types.
pub mod codec {
    pub use oscwire_codec::*;
}

/// Re-export framing types.
pub mod slip {
    pub use oscwire_slip::*;
}

/// Re-export transport types.
pub mod transport {
    pub use oscwire_transport::*;
}

/// Re-export dispatch types (requires `device` feature).
#[cfg(feature = "device")]
pub mod dispatch {
    pub use oscwire_dispatch::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use oscwire_session::*;
}

#[cfg(feature = "device")]
pub mod sim;
