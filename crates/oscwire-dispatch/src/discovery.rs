use std::sync::Arc;

use oscwire_codec::address::{INFO_INTERNAL, INFO_INTERNAL_A, INFO_INTERNAL_B, NETWORK_FIND};
use oscwire_codec::{Argument, Message};

use crate::identity::{DeviceIdentity, IdentityStore};

/// Answers the well-known info and find queries from the identity store.
#[derive(Debug, Clone)]
pub struct Discovery {
    identity: Arc<IdentityStore>,
}

impl Discovery {
    pub fn new(identity: Arc<IdentityStore>) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    /// Replies for `msg`, or `None` when the address is not a discovery query.
    ///
    /// Arguments on a query are ignored.
    pub fn answer(&self, msg: &Message) -> Option<Vec<Message>> {
        let id = self.identity.read();
        let replies = match msg.address.as_str() {
            INFO_INTERNAL => vec![info_a(&id), info_b(&id)],
            INFO_INTERNAL_A => vec![info_a(&id)],
            INFO_INTERNAL_B => vec![info_b(&id)],
            NETWORK_FIND => vec![find(&id)],
            _ => return None,
        };
        Some(replies)
    }
}

fn info_a(id: &DeviceIdentity) -> Message {
    Message {
        address: INFO_INTERNAL_A.to_string(),
        args: vec![
            Argument::String(id.name.clone()),
            Argument::Int(id.serial_number),
            Argument::String(id.network.ip.clone()),
            Argument::String(id.firmware_version.clone()),
            Argument::Int(id.free_memory),
        ],
    }
}

fn info_b(id: &DeviceIdentity) -> Message {
    let net = &id.network;
    Message {
        address: INFO_INTERNAL_B.to_string(),
        args: vec![
            Argument::Int(net.dhcp.into()),
            Argument::Int(net.webserver.into()),
            Argument::String(net.gateway.clone()),
            Argument::String(net.netmask.clone()),
            Argument::Int(net.udp_listen_port.into()),
            Argument::Int(net.udp_send_port.into()),
        ],
    }
}

fn find(id: &DeviceIdentity) -> Message {
    Message {
        address: NETWORK_FIND.to_string(),
        args: vec![
            Argument::String(id.network.ip.clone()),
            Argument::Int(id.network.udp_listen_port.into()),
            Argument::Int(id.network.udp_send_port.into()),
            Argument::String(id.name.clone()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> Discovery {
        let store = IdentityStore::default();
        store.set_name("bench").unwrap();
        store.set_serial_number(42);
        store.update_network(|n| n.ip = "192.168.1.20".into());
        Discovery::new(Arc::new(store))
    }

    #[test]
    fn info_query_yields_both_replies_in_order() {
        let replies = discovery().answer(&Message::new(INFO_INTERNAL)).unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].address, INFO_INTERNAL_A);
        assert_eq!(replies[0].type_tags(), ",sissi");
        assert_eq!(replies[0].args[0].as_str(), Some("bench"));
        assert_eq!(replies[0].args[1].as_int(), Some(42));
        assert_eq!(replies[0].args[2].as_str(), Some("192.168.1.20"));
        assert_eq!(replies[1].address, INFO_INTERNAL_B);
        assert_eq!(replies[1].type_tags(), ",iissii");
        assert_eq!(replies[1].args[0].as_int(), Some(1));
        assert_eq!(replies[1].args[4].as_int(), Some(10000));
    }

    #[test]
    fn find_reply_fields() {
        let replies = discovery().answer(&Message::new(NETWORK_FIND)).unwrap();
        let reply = &replies[0];
        assert_eq!(reply.type_tags(), ",siis");
        assert_eq!(reply.args[0].as_str(), Some("192.168.1.20"));
        assert_eq!(reply.args[3].as_str(), Some("bench"));
    }

    #[test]
    fn other_addresses_pass_through() {
        assert!(discovery().answer(&Message::new("/system/name")).is_none());
    }
}
