//! Address/port (or Unix path) tuples used to open and bind sockets.
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::ip_address::IpAddress;

/// A connection endpoint: either an (address, port) pair for IP protocols,
/// or a filesystem path for a Unix domain socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Ip(IpAddress, u16),
    Unix(PathBuf),
}

impl Endpoint {
    pub fn ip(addr: IpAddress, port: u16) -> Self {
        Endpoint::Ip(addr, port)
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix(path.into())
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            Endpoint::Ip(_, port) => Some(*port),
            Endpoint::Unix(_) => None,
        }
    }

    pub fn address(&self) -> Option<&IpAddress> {
        match self {
            Endpoint::Ip(addr, _) => Some(addr),
            Endpoint::Unix(_) => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ip(addr, port) => write!(f, "{}:{}", addr, port),
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

impl TryFrom<&Endpoint> for SocketAddr {
    type Error = crate::error::Error;

    fn try_from(ep: &Endpoint) -> crate::error::Result<SocketAddr> {
        match ep {
            Endpoint::Ip(addr, port) => {
                let mut sa = SocketAddr::try_from(addr)?;
                sa.set_port(*port);
                Ok(sa)
            }
            Endpoint::Unix(_) => Err(crate::error::Error::new(
                crate::error::ErrorKind::InvalidParam,
                "a Unix endpoint has no socket address representation",
            )),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(sa: SocketAddr) -> Self {
        match sa {
            SocketAddr::V4(v4) => Endpoint::Ip(IpAddress::from(*v4.ip()), v4.port()),
            SocketAddr::V6(v6) => Endpoint::Ip(IpAddress::from(*v6.ip()), v6.port()),
        }
    }
}

/// A marker trait distinguishing the wire-level flavor a socket speaks.
/// Implementors supply the OS-level constants `BasicSocket::open` needs.
/// `protocol` takes the domain the socket is being opened for, since ICMP's
/// wire protocol number differs between IPv4 and IPv6 even though both ride
/// a `SOCK_RAW` socket.
pub trait Protocol {
    fn socket_type() -> socket2::Type;
    fn protocol(domain: socket2::Domain) -> Option<socket2::Protocol>;
}

pub struct Udp;
impl Protocol for Udp {
    fn socket_type() -> socket2::Type {
        socket2::Type::DGRAM
    }
    fn protocol(_domain: socket2::Domain) -> Option<socket2::Protocol> {
        Some(socket2::Protocol::UDP)
    }
}

pub struct Tcp;
impl Protocol for Tcp {
    fn socket_type() -> socket2::Type {
        socket2::Type::STREAM
    }
    fn protocol(_domain: socket2::Domain) -> Option<socket2::Protocol> {
        Some(socket2::Protocol::TCP)
    }
}

/// Raw ICMP/ICMPv6, for ping-style probes over [`crate::net::DatagramSocket`].
/// `IP_HDRINCL` is left unset (the kernel builds the IP header), matching
/// every platform's default for a freshly opened raw socket.
pub struct Icmp;
impl Protocol for Icmp {
    fn socket_type() -> socket2::Type {
        socket2::Type::RAW
    }
    fn protocol(domain: socket2::Domain) -> Option<socket2::Protocol> {
        Some(if domain == socket2::Domain::IPV6 {
            socket2::Protocol::ICMPV6
        } else {
            socket2::Protocol::ICMPV4
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icmp_protocol_is_family_dispatched() {
        assert_eq!(Icmp::protocol(socket2::Domain::IPV4), Some(socket2::Protocol::ICMPV4));
        assert_eq!(Icmp::protocol(socket2::Domain::IPV6), Some(socket2::Protocol::ICMPV6));
    }
}
