use oscwire_codec::address::{is_error_reply, INFO_INTERNAL_A, INFO_INTERNAL_B, NETWORK_FIND};
use oscwire_codec::{Argument, Message};
use serde::Serialize;

/// What the host has learned about a board from its replies.
///
/// Every field stays `None` until a reply carrying it arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardInfo {
    pub name: Option<String>,
    pub serial_number: Option<i32>,
    pub ip: Option<String>,
    pub firmware_version: Option<String>,
    pub free_memory: Option<i32>,
    pub dhcp: Option<bool>,
    pub webserver: Option<bool>,
    pub gateway: Option<String>,
    pub netmask: Option<String>,
    pub udp_listen_port: Option<i32>,
    pub udp_send_port: Option<i32>,
}

impl BoardInfo {
    /// Fold an info-bearing reply into the record. Returns `true` when `msg`
    /// was recognized and applied.
    ///
    /// Replies whose argument list does not have the expected shape are ignored.
    pub fn apply(&mut self, msg: &Message) -> bool {
        use Argument::{Int, String as Str};

        if is_error_reply(msg) {
            return false;
        }
        match (msg.address.as_str(), msg.args.as_slice()) {
            (INFO_INTERNAL_A, [Str(name), Int(serial), Str(ip), Str(version), Int(free)]) => {
                self.name = Some(name.clone());
                self.serial_number = Some(*serial);
                self.ip = Some(ip.clone());
                self.firmware_version = Some(version.clone());
                self.free_memory = Some(*free);
            }
            (
                INFO_INTERNAL_B,
                [Int(dhcp), Int(web), Str(gateway), Str(netmask), Int(listen), Int(send)],
            ) => {
                self.dhcp = Some(*dhcp != 0);
                self.webserver = Some(*web != 0);
                self.gateway = Some(gateway.clone());
                self.netmask = Some(netmask.clone());
                self.udp_listen_port = Some(*listen);
                self.udp_send_port = Some(*send);
            }
            (NETWORK_FIND, [Str(ip), Int(listen), Int(send), Str(name)]) => {
                self.ip = Some(ip.clone());
                self.udp_listen_port = Some(*listen);
                self.udp_send_port = Some(*send);
                self.name = Some(name.clone());
            }
            ("/system/name", [Str(name)]) => self.name = Some(name.clone()),
            ("/system/serialnumber", [Int(serial)]) => self.serial_number = Some(*serial),
            ("/system/version", [Str(version)]) => self.firmware_version = Some(version.clone()),
            ("/system/freememory", [Int(free)]) => self.free_memory = Some(*free),
            _ => return false,
        }
        true
    }

    /// `true` once any identifying reply has arrived.
    pub fn is_known(&self) -> bool {
        self.name.is_some() || self.serial_number.is_some()
    }

    /// Numeric part of a `"<product> <major>.<minor>.<build>"` version string.
    pub fn version_numbers(&self) -> Option<(u32, u32, u32)> {
        let version = self.firmware_version.as_deref()?;
        let numbers = version.rsplit(' ').next()?;
        let mut parts = numbers.split('.').map(str::parse::<u32>);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor)), Some(Ok(build)), None) => {
                Some((major, minor, build))
            }
            _ => None,
        }
    }
}
