//! Connected/unconnected UDP and ICMP sockets.
use std::net::{Ipv4Addr, Ipv6Addr};

use socket2::Domain;

use crate::endpoint::{Endpoint, Protocol};
use crate::error::{Error, ErrorKind, Result};
use crate::ip_address::{Family, IpAddress};
use crate::net::basic_socket::{BasicSocket, State};
use crate::net::option::SocketOption;
use crate::net::SocketIo;

/// A datagram socket: UDP or ICMP, with optional default-destination
/// ("connected UDP") semantics layered over [`BasicSocket`].
pub struct DatagramSocket<P: Protocol> {
    basic: BasicSocket<P>,
    peer: Option<Endpoint>,
}

impl<P: Protocol> DatagramSocket<P> {
    pub fn new() -> Self {
        DatagramSocket {
            basic: BasicSocket::new(),
            peer: None,
        }
    }

    pub fn state(&self) -> State {
        self.basic.state()
    }

    pub fn bind(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.ensure_open(endpoint)?;
        self.basic.bind(endpoint)
    }

    /// Associate the socket with `endpoint` as its default destination.
    /// Opens the socket implicitly if it is `Closed`.
    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.ensure_open(endpoint)?;
        let sock = self.basic.raw()?;
        let addr: std::net::SocketAddr = endpoint.try_into()?;
        sock.connect(&addr.into()).map_err(Error::from)?;
        self.basic.set_state(State::Connected);
        self.peer = Some(endpoint.clone());
        Ok(())
    }

    /// Re-associate to the null address (`AF_UNSPEC`), returning to
    /// `Disconnected`. The OS call is best-effort: some platforms reject an
    /// `AF_UNSPEC` `connect()` on a socket that was never bound, so failures
    /// here are not propagated — the state transition is what callers rely on.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.basic.state() != State::Connected {
            return Ok(());
        }
        let unspec = socket2::SockAddr::from(std::net::SocketAddr::from((
            std::net::Ipv4Addr::UNSPECIFIED,
            0,
        )));
        let _ = self.basic.raw()?.connect(&unspec);
        self.basic.set_state(State::Disconnected);
        self.peer = None;
        Ok(())
    }

    pub fn read_from(&self, buf: &mut [u8]) -> Result<(usize, Endpoint)> {
        let sock = self.basic.raw()?;
        let (n, from) = sock
            .recv_from(unsafe {
                std::slice::from_raw_parts_mut(
                    buf.as_mut_ptr() as *mut std::mem::MaybeUninit<u8>,
                    buf.len(),
                )
            })
            .map_err(Error::from)?;
        let addr = from
            .as_socket()
            .ok_or_else(|| Error::new(ErrorKind::OperationFailed, "non-IP source address"))?;
        Ok((n, Endpoint::from(addr)))
    }

    pub fn write_to(&self, buf: &[u8], endpoint: &Endpoint) -> Result<usize> {
        let sock = self.basic.raw()?;
        let addr: std::net::SocketAddr = endpoint.try_into()?;
        sock.send_to(buf, &addr.into()).map_err(Error::from)
    }

    pub fn set_option(&mut self, opt: SocketOption) -> Result<()> {
        self.basic.set_option(opt)
    }

    /// Join `group`'s multicast membership, for the mDNS transport. Opens
    /// the socket (unbound, wildcard-family) first if it is `Closed`.
    pub fn join_multicast(&mut self, group: &IpAddress) -> Result<()> {
        if self.basic.state() == State::Closed {
            let domain = match group.family() {
                Family::V4 => Domain::IPV4,
                Family::V6 => Domain::IPV6,
            };
            self.basic.open(domain)?;
        }
        let sock = self.basic.raw()?;
        match group.family() {
            Family::V4 => {
                let b = group.as_bytes();
                let addr = Ipv4Addr::new(b[0], b[1], b[2], b[3]);
                sock.join_multicast_v4(&addr, &Ipv4Addr::UNSPECIFIED)
            }
            Family::V6 => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(group.as_bytes());
                let addr = Ipv6Addr::from(raw);
                sock.join_multicast_v6(&addr, group.scope())
            }
        }
        .map_err(|e| Error::new(ErrorKind::OperationFailed, e.to_string()))
    }

    pub fn close(&mut self) -> Result<()> {
        self.peer = None;
        self.basic.close()
    }

    /// The standard Internet checksum (RFC 1071): fold `data` into 16-bit
    /// words, sum with end-around carry, then take the one's complement.
    /// `data` with an odd length is padded with a trailing zero byte. Used
    /// by ICMP senders, which must compute this header field themselves.
    pub fn internet_checksum(data: &[u8]) -> u16 {
        let mut sum: u32 = 0;
        let mut chunks = data.chunks_exact(2);
        for chunk in &mut chunks {
            sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
        }
        if let [last] = chunks.remainder() {
            sum += u16::from_be_bytes([*last, 0]) as u32;
        }
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        !(sum as u16)
    }

    fn ensure_open(&mut self, endpoint: &Endpoint) -> Result<()> {
        if self.basic.state() == State::Closed {
            let domain = match endpoint {
                Endpoint::Ip(addr, _) => match addr.family() {
                    crate::ip_address::Family::V4 => Domain::IPV4,
                    crate::ip_address::Family::V6 => Domain::IPV6,
                },
                Endpoint::Unix(_) => Domain::UNIX,
            };
            self.basic.open(domain)?;
        }
        Ok(())
    }
}

impl<P: Protocol> Default for DatagramSocket<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Protocol> SocketIo for DatagramSocket<P> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.basic.state() != State::Connected {
            return Err(Error::new(
                ErrorKind::OperationFailed,
                "read requires a connected datagram socket",
            ));
        }
        self.basic.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.basic.state() != State::Connected {
            return Err(Error::new(
                ErrorKind::OperationFailed,
                "write requires a connected datagram socket",
            ));
        }
        self.basic.write(buf)
    }

    fn wait_ready_read(&mut self, timeout_ms: u64) -> Result<bool> {
        self.basic.wait_ready_read(timeout_ms)
    }

    fn wait_ready_write(&mut self, timeout_ms: u64) -> Result<bool> {
        self.basic.wait_ready_write(timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_empty_is_all_ones() {
        assert_eq!(DatagramSocket::<crate::endpoint::Udp>::internet_checksum(&[]), 0xffff);
    }

    #[test]
    fn checksum_matches_rfc1071_worked_example() {
        // RFC 1071 §3's example words: 0x0001 0xf203 0xf4f5 0xf6f7.
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(DatagramSocket::<crate::endpoint::Udp>::internet_checksum(&data), 0x220d);
    }

    #[test]
    fn checksum_pads_odd_length_with_zero_byte() {
        let a = DatagramSocket::<crate::endpoint::Udp>::internet_checksum(&[0x12, 0x34, 0x56]);
        let b = DatagramSocket::<crate::endpoint::Udp>::internet_checksum(&[0x12, 0x34, 0x56, 0x00]);
        assert_eq!(a, b);
    }
}
