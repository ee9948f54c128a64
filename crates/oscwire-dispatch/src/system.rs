use std::sync::Arc;

use oscwire_codec::Argument;

use crate::error::{DispatchError, Result};
use crate::identity::IdentityStore;
use crate::subsystem::{PropertyInfo, Subsystem, ValueType};

const PROPERTIES: &[PropertyInfo] = &[
    PropertyInfo::read_write("name", ValueType::String),
    PropertyInfo::read_write("serialnumber", ValueType::Int),
    PropertyInfo::read_only("version", ValueType::String),
    PropertyInfo::read_only("freememory", ValueType::Int),
];

/// `/system/...`: device name, serial number, firmware version and free memory.
#[derive(Debug, Clone)]
pub struct SystemSubsystem {
    identity: Arc<IdentityStore>,
}

impl SystemSubsystem {
    pub fn new(identity: Arc<IdentityStore>) -> Self {
        Self { identity }
    }
}

impl Subsystem for SystemSubsystem {
    fn name(&self) -> &str {
        "system"
    }

    fn properties(&self) -> &[PropertyInfo] {
        PROPERTIES
    }

    fn get(&self, _index: Option<usize>, property: &str) -> Result<Argument> {
        let id = self.identity.read();
        Ok(match property {
            "name" => Argument::String(id.name.clone()),
            "serialnumber" => Argument::Int(id.serial_number),
            "version" => Argument::String(id.firmware_version.clone()),
            "freememory" => Argument::Int(id.free_memory),
            other => return Err(unknown(other)),
        })
    }

    fn set(&self, _index: Option<usize>, property: &str, value: Argument) -> Result<()> {
        match (property, value) {
            ("name", Argument::String(name)) => self.identity.set_name(&name),
            ("serialnumber", Argument::Int(serial)) => {
                self.identity.set_serial_number(serial);
                Ok(())
            }
            (other, _) => Err(unknown(other)),
        }
    }
}

fn unknown(property: &str) -> DispatchError {
    DispatchError::UnknownProperty {
        subsystem: "system".to_string(),
        property: property.to_string(),
    }
}
