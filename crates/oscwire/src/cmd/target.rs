use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use oscwire_transport::{
    PacketTransport, SerialConfig, StreamTransport, TcpAcceptor, UdpConfig, UdpTransport,
    DEFAULT_BAUD_RATE,
};

use crate::exit::{io_error, transport_error, CliError, CliResult, USAGE};

/// Where a board lives: `udp:HOST:PORT`, `tcp:HOST:PORT` or `serial:PATH[@BAUD]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Udp(String),
    Tcp(String),
    Serial { path: String, baud: u32 },
}

/// An opened listening endpoint.
pub enum Listener {
    /// A single packet link (UDP socket or serial line).
    Link(Box<dyn PacketTransport>),
    /// TCP: one link per accepted session.
    Tcp(TcpAcceptor),
}

impl FromStr for Target {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = input
            .split_once(':')
            .ok_or_else(|| format!("missing scheme in '{input}' (udp:, tcp: or serial:)"))?;
        match scheme {
            "udp" | "tcp" => {
                let (host, port) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| format!("'{input}' needs HOST:PORT"))?;
                if host.is_empty() {
                    return Err(format!("'{input}' has an empty host"));
                }
                port.parse::<u16>()
                    .map_err(|_| format!("invalid port '{port}' in '{input}'"))?;
                let addr = rest.to_string();
                Ok(if scheme == "udp" {
                    Target::Udp(addr)
                } else {
                    Target::Tcp(addr)
                })
            }
            "serial" => {
                let (path, baud) = match rest.rsplit_once('@') {
                    Some((path, baud)) => (
                        path,
                        baud.parse::<u32>()
                            .map_err(|_| format!("invalid baud rate '{baud}' in '{input}'"))?,
                    ),
                    None => (rest, DEFAULT_BAUD_RATE),
                };
                if path.is_empty() {
                    return Err(format!("'{input}' has an empty device path"));
                }
                Ok(Target::Serial {
                    path: path.to_string(),
                    baud,
                })
            }
            other => Err(format!("unknown scheme '{other}' (udp:, tcp: or serial:)")),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Udp(addr) => write!(f, "udp:{addr}"),
            Target::Tcp(addr) => write!(f, "tcp:{addr}"),
            Target::Serial { path, baud } => write!(f, "serial:{path}@{baud}"),
        }
    }
}

fn resolve(addr: &str) -> CliResult<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|err| io_error(&format!("cannot resolve {addr}"), err))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("{addr} resolved to no address")))
}

fn is_broadcast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_broadcast() || v4.octets()[3] == 255,
        IpAddr::V6(_) => false,
    }
}

impl Target {
    /// An unopened transport that talks to the board at this target.
    pub fn board_transport(&self) -> CliResult<Box<dyn PacketTransport>> {
        match self {
            Target::Udp(addr) => {
                let remote = resolve(addr)?;
                Ok(Box::new(UdpTransport::new(UdpConfig {
                    broadcast: is_broadcast(remote.ip()),
                    ..UdpConfig::to_board(remote)
                })))
            }
            Target::Tcp(addr) => Ok(Box::new(StreamTransport::tcp_client(addr.clone()))),
            Target::Serial { path, baud } => Ok(Box::new(StreamTransport::serial(SerialConfig {
                path: path.clone(),
                baud_rate: *baud,
            }))),
        }
    }

    /// Bind or open this target for receiving.
    pub fn listen(&self) -> CliResult<Listener> {
        match self {
            Target::Udp(addr) => {
                let bind = resolve(addr)?;
                let mut transport = UdpTransport::new(UdpConfig {
                    bind,
                    ..UdpConfig::default()
                });
                transport
                    .connect()
                    .map_err(|err| transport_error("bind failed", err))?;
                Ok(Listener::Link(Box::new(transport)))
            }
            Target::Tcp(addr) => TcpAcceptor::bind(addr.as_str())
                .map(Listener::Tcp)
                .map_err(|err| transport_error("bind failed", err)),
            Target::Serial { .. } => {
                let mut transport = self.board_transport()?;
                transport
                    .connect()
                    .map_err(|err| transport_error("open failed", err))?;
                Ok(Listener::Link(transport))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_scheme() {
        assert_eq!(
            "udp:192.168.0.200:10000".parse::<Target>().unwrap(),
            Target::Udp("192.168.0.200:10000".into())
        );
        assert_eq!(
            "tcp:board.local:9000".parse::<Target>().unwrap(),
            Target::Tcp("board.local:9000".into())
        );
        assert_eq!(
            "serial:/dev/ttyACM0".parse::<Target>().unwrap(),
            Target::Serial {
                path: "/dev/ttyACM0".into(),
                baud: DEFAULT_BAUD_RATE
            }
        );
        assert_eq!(
            "serial:/dev/ttyUSB1@57600".parse::<Target>().unwrap(),
            Target::Serial {
                path: "/dev/ttyUSB1".into(),
                baud: 57600
            }
        );
    }

    #[test]
    fn rejects_malformed_targets() {
        for bad in [
            "192.168.0.200:10000",
            "udp:10000",
            "udp::10000",
            "tcp:host:notaport",
            "serial:",
            "serial:/dev/ttyACM0@fast",
            "ws:host:1",
        ] {
            assert!(bad.parse::<Target>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn display_round_trips() {
        for text in ["udp:10.0.0.2:10000", "tcp:[::1]:9000", "serial:/dev/ttyACM0@115200"] {
            let target: Target = text.parse().unwrap();
            assert_eq!(target.to_string(), text);
        }
    }

    #[test]
    fn broadcast_addresses_enable_broadcast() {
        assert!(is_broadcast("255.255.255.255".parse().unwrap()));
        assert!(is_broadcast("192.168.1.255".parse().unwrap()));
        assert!(!is_broadcast("192.168.1.20".parse().unwrap()));
    }

    #[test]
    fn udp_listen_binds_requested_port() {
        let target: Target = "udp:127.0.0.1:0".parse().unwrap();
        match target.listen().unwrap() {
            Listener::Link(transport) => assert!(transport.is_open()),
            Listener::Tcp(_) => panic!("udp target produced a tcp acceptor"),
        }
    }
}
