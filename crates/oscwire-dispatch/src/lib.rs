//! Device-side handling of OSC traffic.
//!
//! Incoming addresses of the form `/<subsystem>[/<index>]/<property>` are routed
//! to [`Subsystem`] implementations held in a [`Registry`]. Reads (no arguments)
//! produce a reply on the same address; writes (one argument) are applied
//! silently. Failures are answered with an error reply whenever the transport
//! knows where to send it.
//!
//! [`DeviceServer`] ties a registry to any [`PacketTransport`](oscwire_transport::PacketTransport)
//! and batches replies into bundles through a [`ReplyQueue`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod pins;
pub mod registry;
pub mod reply;
pub mod server;
pub mod subsystem;
pub mod system;

pub use config::{DispatchConfig, DEFAULT_MAX_REPLY_PACKET};
pub use discovery::Discovery;
pub use error::{DispatchError, Result};
pub use identity::{DeviceIdentity, IdentityStore, NetworkSettings, MAX_NAME_LEN};
pub use pins::{Peripheral, PinArena, PinError, PinLease, PinMode};
pub use registry::{Registry, RegistryBuilder, Route};
pub use reply::ReplyQueue;
pub use server::{DeviceServer, ServerStats, DECODE_ERROR_ADDRESS};
pub use subsystem::{Access, PropertyInfo, Subsystem, ValueType};
pub use system::SystemSubsystem;
