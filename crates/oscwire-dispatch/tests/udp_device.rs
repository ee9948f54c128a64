use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use oscwire_codec::address::{is_error_reply, INFO_INTERNAL, INFO_INTERNAL_A};
use oscwire_codec::{decode_packet, packet_to_bytes, Argument, Message, Packet};
use oscwire_dispatch::{
    DeviceServer, Discovery, IdentityStore, PropertyInfo, Registry, Result, Subsystem,
    SystemSubsystem, ValueType,
};
use oscwire_transport::{PacketTransport, UdpConfig, UdpTransport};

const LOOPBACK: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));

struct Outputs {
    levels: Mutex<[i32; 8]>,
}

impl Subsystem for Outputs {
    fn name(&self) -> &str {
        "digitalout"
    }

    fn instance_count(&self) -> Option<usize> {
        Some(8)
    }

    fn properties(&self) -> &[PropertyInfo] {
        const PROPS: &[PropertyInfo] = &[PropertyInfo::read_write("value", ValueType::Int)];
        PROPS
    }

    fn get(&self, index: Option<usize>, _property: &str) -> Result<Argument> {
        let levels = self.levels.lock().unwrap();
        Ok(Argument::Int(levels[index.unwrap_or_default()]))
    }

    fn set(&self, index: Option<usize>, _property: &str, value: Argument) -> Result<()> {
        let mut levels = self.levels.lock().unwrap();
        levels[index.unwrap_or_default()] = value.as_int().unwrap_or_default();
        Ok(())
    }
}

fn request(host: &mut UdpTransport, msg: Message) -> Packet {
    let bytes = packet_to_bytes(&msg.into()).unwrap();
    host.send(&bytes).unwrap();
    let reply = host
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .expect("device should reply");
    decode_packet(&reply).unwrap()
}

#[test]
fn host_talks_to_device_over_udp() {
    let identity = Arc::new(IdentityStore::default());
    let registry = Registry::builder()
        .with(SystemSubsystem::new(Arc::clone(&identity)))
        .unwrap()
        .with(Outputs {
            levels: Mutex::new([0; 8]),
        })
        .unwrap()
        .build();

    let mut device = UdpTransport::new(UdpConfig {
        bind: LOOPBACK,
        ..UdpConfig::default()
    });
    device.connect().unwrap();
    let device_addr = device.local_addr().unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let server = {
        let running = Arc::clone(&running);
        let mut server =
            DeviceServer::new(device, Arc::new(registry)).with_discovery(Discovery::new(identity));
        thread::spawn(move || {
            server.run(&running).unwrap();
            server.stats()
        })
    };

    let mut host = UdpTransport::new(UdpConfig {
        bind: LOOPBACK,
        remote: Some(device_addr),
        ..UdpConfig::default()
    });
    host.connect().unwrap();

    // Write, then read back.
    let bytes = packet_to_bytes(&Message::new("/digitalout/3/value").with_arg(1).into()).unwrap();
    host.send(&bytes).unwrap();
    let reply = request(&mut host, Message::new("/digitalout/3/value"));
    assert_eq!(reply.messages()[0].args, vec![Argument::Int(1)]);

    let reply = request(&mut host, Message::new("/digitalout/9/value"));
    let msg = &reply.messages()[0];
    assert_eq!(msg.address, "/digitalout/9/value");
    assert!(is_error_reply(msg));

    let reply = request(&mut host, Message::new(INFO_INTERNAL));
    assert_eq!(reply.messages().len(), 2);
    assert_eq!(reply.messages()[0].address, INFO_INTERNAL_A);

    running.store(false, Ordering::SeqCst);
    let stats = server.join().unwrap();
    assert_eq!(stats.packets, 4);
    assert_eq!(stats.errors, 1);
    host.disconnect();
}
