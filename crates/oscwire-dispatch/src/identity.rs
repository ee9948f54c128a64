use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{DispatchError, Result};

/// Longest accepted device name, in characters.
pub const MAX_NAME_LEN: usize = 99;

/// Network settings reported in the second info reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub ip: String,
    pub dhcp: bool,
    pub webserver: bool,
    pub gateway: String,
    pub netmask: String,
    pub udp_listen_port: u16,
    pub udp_send_port: u16,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            dhcp: true,
            webserver: false,
            gateway: "0.0.0.0".to_string(),
            netmask: "255.255.255.0".to_string(),
            udp_listen_port: 10000,
            udp_send_port: 10000,
        }
    }
}

/// What the device says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub name: String,
    pub serial_number: i32,
    /// `"<product> <major>.<minor>.<build>"`.
    pub firmware_version: String,
    pub free_memory: i32,
    pub network: NetworkSettings,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            name: "oscwire".to_string(),
            serial_number: 0,
            firmware_version: format!("oscwire {}", env!("CARGO_PKG_VERSION")),
            free_memory: 0,
            network: NetworkSettings::default(),
        }
    }
}

/// Shared, lock-guarded [`DeviceIdentity`] read by discovery and the system
/// subsystem.
#[derive(Debug, Default)]
pub struct IdentityStore {
    inner: RwLock<DeviceIdentity>,
}

impl IdentityStore {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            inner: RwLock::new(identity),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, DeviceIdentity> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DeviceIdentity> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> DeviceIdentity {
        self.read().clone()
    }

    /// Rename the device. Empty names and names over [`MAX_NAME_LEN`]
    /// characters are rejected.
    pub fn set_name(&self, name: &str) -> Result<()> {
        let len = name.chars().count();
        if len == 0 || len > MAX_NAME_LEN {
            return Err(DispatchError::InvalidValue {
                property: "name".to_string(),
                reason: format!("length must be 1..={MAX_NAME_LEN}, got {len}"),
            });
        }
        self.write().name = name.to_string();
        Ok(())
    }

    pub fn set_serial_number(&self, serial: i32) {
        self.write().serial_number = serial;
    }

    pub fn set_free_memory(&self, bytes: i32) {
        self.write().free_memory = bytes;
    }

    pub fn update_network(&self, f: impl FnOnce(&mut NetworkSettings)) {
        f(&mut self.write().network);
    }
}
