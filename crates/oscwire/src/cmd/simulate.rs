use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use oscwire::sim;
use oscwire_dispatch::{DeviceServer, Discovery, DispatchConfig, IdentityStore};
use oscwire_transport::{UdpConfig, UdpTransport};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, SimulateArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    let identity = Arc::new(identity(&args)?);
    let registry = sim::registry(Arc::clone(&identity))
        .map_err(|err| CliError::new(INTERNAL, format!("building simulated board: {err}")))?;

    let transport = UdpTransport::new(UdpConfig {
        bind: SocketAddr::new(args.bind, args.port),
        reply_port: args.reply_port,
        ..UdpConfig::default()
    });
    let config = DispatchConfig {
        reply_decode_errors: args.reply_decode_errors,
        ..DispatchConfig::default()
    };
    let mut server = DeviceServer::with_config(transport, Arc::new(registry), config)
        .with_discovery(Discovery::new(Arc::clone(&identity)));

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(
        name = %args.name,
        serial = args.serial,
        bind = %args.bind,
        port = args.port,
        "simulated board listening"
    );
    server
        .run(&running)
        .map_err(|err| transport_error("simulated board stopped", err))?;

    let stats = server.stats();
    info!(
        packets = stats.packets,
        replies = stats.replies,
        errors = stats.errors,
        "simulated board finished"
    );
    Ok(SUCCESS)
}

fn identity(args: &SimulateArgs) -> CliResult<IdentityStore> {
    let store = IdentityStore::default();
    store
        .set_name(&args.name)
        .map_err(|err| CliError::new(USAGE, format!("--name: {err}")))?;
    store.set_serial_number(args.serial);
    store.update_network(|net| {
        net.ip = args.bind.to_string();
        net.udp_listen_port = args.port;
        net.udp_send_port = args.reply_port.unwrap_or(args.port);
    });
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(name: &str) -> SimulateArgs {
        SimulateArgs {
            port: 9100,
            bind: "127.0.0.1".parse().unwrap(),
            reply_port: Some(9101),
            name: name.to_string(),
            serial: 42,
            reply_decode_errors: false,
        }
    }

    #[test]
    fn identity_reflects_arguments() {
        let store = identity(&args("bench")).unwrap();
        let id = store.snapshot();
        assert_eq!(id.name, "bench");
        assert_eq!(id.serial_number, 42);
        assert_eq!(id.network.ip, "127.0.0.1");
        assert_eq!(id.network.udp_listen_port, 9100);
        assert_eq!(id.network.udp_send_port, 9101);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = identity(&args("")).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
