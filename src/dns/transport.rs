//! Transport trait parameterizing [`crate::dns::Client`] over unicast DNS,
//! mDNS, and DNS-over-TLS.
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::ip_address::{Family, IpAddress};
use crate::net::datagram_socket::DatagramSocket;
use crate::endpoint::Udp;

/// A concrete DNS transport: which socket kind it rides on, its default
/// port, and (for multicast transports) the group address to join.
///
/// `MULTICAST` and `USES_TLS` steer [`crate::dns::Client::lookup`] between
/// three wire paths: plain connected UDP (`Dns`), unconnected UDP sent to
/// and received from a joined multicast group (`Mdns`), and a TLS stream
/// framed with the RFC 1035 §4.2.2 two-byte length prefix (`Dot`).
pub trait Transport {
    const DEFAULT_PORT: u16;
    const RECURSION_DESIRED: bool;
    const MULTICAST: bool = false;
    const USES_TLS: bool = false;

    fn multicast_address(_family: Family) -> Option<IpAddress> {
        None
    }
}

/// Plain unicast DNS over UDP, port 53.
pub struct Dns;
impl Transport for Dns {
    const DEFAULT_PORT: u16 = 53;
    const RECURSION_DESIRED: bool = true;
}

/// Multicast DNS over UDP, port 5353, RD bit clear per RFC 6762.
pub struct Mdns;
impl Transport for Mdns {
    const DEFAULT_PORT: u16 = 5353;
    const RECURSION_DESIRED: bool = false;
    const MULTICAST: bool = true;

    fn multicast_address(family: Family) -> Option<IpAddress> {
        Some(match family {
            Family::V4 => IpAddress::parse("224.0.0.251", None).unwrap(),
            Family::V6 => IpAddress::parse("ff02::fb", None).unwrap(),
        })
    }
}

/// DNS over TLS, port 853.
pub struct Dot;
impl Transport for Dot {
    const DEFAULT_PORT: u16 = 853;
    const RECURSION_DESIRED: bool = true;
    const USES_TLS: bool = true;
}

/// An unopened UDP socket for the unicast transport. Left unopened (rather
/// than pre-bound to a wildcard v4 address) so the subsequent `connect` to
/// the actual server endpoint decides the socket's family — a v4-locked
/// socket can't connect to an AAAA-only nameserver.
pub fn open_datagram() -> Result<DatagramSocket<Udp>> {
    Ok(DatagramSocket::new())
}

/// A UDP socket that has joined `group`'s multicast membership and is
/// bound to an ephemeral port of the matching family, for the mDNS
/// transport's send/receive pair.
pub fn open_multicast(family: Family, group: &IpAddress) -> Result<DatagramSocket<Udp>> {
    let mut socket = DatagramSocket::new();
    socket.join_multicast(group)?;
    let any = Endpoint::ip(IpAddress::wildcard(family), 0);
    socket.bind(&any)?;
    Ok(socket)
}
