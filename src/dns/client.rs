//! Transaction dispatcher: builds a packet, sends it, and matches the
//! response by transaction id with a caller-supplied timeout.
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::dns::packet::{DnsPacket, QuestionRecord, Rdata, ResourceRecord};
use crate::dns::transport::{self, Transport};
use crate::dns::wire::{QClass, QType};
use crate::endpoint::Endpoint;
use crate::error::{Error, ErrorKind, Result};
use crate::ip_address::{Family, IpAddress};
use crate::net::tls_socket::{TlsContext, TlsSocket};
use crate::net::SocketIo;

const MAX_DNS_PACKET_SIZE: usize = 4096;

/// A DNS client parameterized by its [`Transport`] (unicast DNS, mDNS, or
/// DoT). Lookups on a given instance are sequential — `lookup` always runs
/// to completion (success, failure, or timeout) before the next begins,
/// since the client owns a single underlying socket.
pub struct Client<T: Transport> {
    _transport: PhantomData<T>,
}

impl<T: Transport> Client<T> {
    pub fn new() -> Self {
        Client {
            _transport: PhantomData,
        }
    }

    /// Send `packet` to `server` and return the matching response, or
    /// `TimedOut` if none arrives within `timeout_ms`. Any datagram whose
    /// transaction id doesn't match, or whose response bit is clear, is
    /// ignored and does not reset the deadline.
    ///
    /// Dispatches to a TLS-framed stream for `Dot` and to plain connected
    /// UDP for `Dns`; `Mdns` lookups go through [`Client::lookup_multicast`]
    /// instead, since multicast replies arrive from sources other than the
    /// destination the query was sent to.
    pub fn lookup(
        &self,
        packet: &DnsPacket,
        server: &IpAddress,
        port: u16,
        timeout_ms: u64,
    ) -> Result<DnsPacket> {
        if T::USES_TLS {
            self.lookup_tls(packet, server, port, timeout_ms)
        } else {
            self.lookup_udp(packet, server, port, timeout_ms)
        }
    }

    fn lookup_udp(
        &self,
        packet: &DnsPacket,
        server: &IpAddress,
        port: u16,
        timeout_ms: u64,
    ) -> Result<DnsPacket> {
        let mut socket = transport::open_datagram()?;
        let endpoint = Endpoint::ip(server.clone(), if port != 0 { port } else { T::DEFAULT_PORT });
        socket.connect(&endpoint)?;

        let id: u16 = rand::thread_rng().gen();
        let bytes = packet.to_network_bytes(id, T::RECURSION_DESIRED)?;
        SocketIo::write(&mut socket, &bytes)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::new(ErrorKind::TimedOut, "no matching DNS response"));
            }
            match SocketIo::read(&mut socket, &mut buf) {
                Ok(n) => {
                    let (resp_id, header, resp_packet) = match DnsPacket::from_network_bytes(&buf[..n]) {
                        Ok(parsed) => parsed,
                        Err(_) => continue,
                    };
                    if resp_id != id || !header.response {
                        continue;
                    }
                    header.rcode_to_result()?;
                    return Ok(resp_packet);
                }
                Err(e) if e.kind() == ErrorKind::TemporaryError => {
                    let wait_ms = remaining.as_millis().min(u64::MAX as u128) as u64;
                    SocketIo::wait_ready_read(&mut socket, wait_ms)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// DNS-over-TLS: one query/response per TLS connection, each message
    /// framed with the RFC 1035 §4.2.2 two-byte big-endian length prefix
    /// used for DNS-over-TCP (DoT reuses it, per RFC 7858 §3.3).
    fn lookup_tls(
        &self,
        packet: &DnsPacket,
        server: &IpAddress,
        port: u16,
        timeout_ms: u64,
    ) -> Result<DnsPacket> {
        let endpoint = Endpoint::ip(server.clone(), if port != 0 { port } else { T::DEFAULT_PORT });
        let context = Arc::new(Mutex::new(TlsContext::default_context()));
        let mut tls = TlsSocket::new(context);
        tls.connect_encrypted(&endpoint, &server.to_text())?;
        tls.wait_encrypted(timeout_ms)?;

        let id: u16 = rand::thread_rng().gen();
        let payload = packet.to_network_bytes(id, T::RECURSION_DESIRED)?;
        if payload.len() > u16::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidParam, "DNS message too large to frame"));
        }
        let mut framed = Vec::with_capacity(2 + payload.len());
        framed.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        framed.extend_from_slice(&payload);
        crate::net::write_exactly(&mut tls, &framed, timeout_ms)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::new(ErrorKind::TimedOut, "no matching DNS response"));
            }
            let remaining_ms = remaining.as_millis().min(u64::MAX as u128) as u64;
            let mut len_buf = [0u8; 2];
            crate::net::read_exactly(&mut tls, &mut len_buf, remaining_ms)?;
            let len = u16::from_be_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            crate::net::read_exactly(&mut tls, &mut buf, remaining_ms)?;

            let (resp_id, header, resp_packet) = match DnsPacket::from_network_bytes(&buf) {
                Ok(parsed) => parsed,
                Err(_) => continue,
            };
            if resp_id != id || !header.response {
                continue;
            }
            header.rcode_to_result()?;
            return Ok(resp_packet);
        }
    }

    /// Send `packet` to `T`'s multicast group for `family` and collect every
    /// matching response received before `timeout_ms` elapses (mDNS may
    /// receive several answers from different responders to one query,
    /// unlike the matched-exactly-one-response unicast path).
    pub fn lookup_multicast(&self, packet: &DnsPacket, family: Family, timeout_ms: u64) -> Result<Vec<DnsPacket>> {
        let group = T::multicast_address(family)
            .ok_or_else(|| Error::new(ErrorKind::InvalidParam, "transport has no multicast group"))?;
        let mut socket = transport::open_multicast(family, &group)?;

        let id: u16 = rand::thread_rng().gen();
        let bytes = packet.to_network_bytes(id, T::RECURSION_DESIRED)?;
        let dest = Endpoint::ip(group, T::DEFAULT_PORT);
        socket.write_to(&bytes, &dest)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
        let mut responses = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(responses);
            }
            match socket.read_from(&mut buf) {
                Ok((n, _from)) => {
                    if let Ok((resp_id, header, resp_packet)) = DnsPacket::from_network_bytes(&buf[..n]) {
                        if resp_id == id && header.response {
                            responses.push(resp_packet);
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::TemporaryError => {
                    let wait_ms = remaining.as_millis().min(u64::MAX as u128) as u64;
                    if socket.wait_ready_read(wait_ms).is_err() {
                        return Ok(responses);
                    }
                }
                Err(_) => return Ok(responses),
            }
        }
    }

    /// mDNS-only: A/AAAA lookup via the multicast group instead of a named
    /// server.
    pub fn resolve_host_multicast(&self, host: &str, family: Family, timeout_ms: u64) -> Result<Vec<IpAddress>> {
        let qtype = match family {
            Family::V4 => QType::A,
            Family::V6 => QType::Aaaa,
        };
        let packet = DnsPacket::with_question(QuestionRecord::new(host, qtype));
        let responses = self.lookup_multicast(&packet, family, timeout_ms)?;
        Ok(responses
            .into_iter()
            .flat_map(|r| r.answers)
            .filter_map(|rr| match rr.rdata {
                Rdata::A(ip) if family == Family::V4 => Some(ip),
                Rdata::Aaaa(ip) if family == Family::V6 => Some(ip),
                _ => None,
            })
            .collect())
    }

    /// mDNS conflict probe (RFC 6762 §8.1): send a query for `host`
    /// carrying an authority record that claims `address`, then check
    /// whether any answer contradicts it. Returns `true` iff no conflicting
    /// answer was received, i.e. the name is free to claim.
    pub fn probe(&self, host: &str, family: Family, address: &IpAddress, timeout_ms: u64) -> Result<bool> {
        let qtype = match family {
            Family::V4 => QType::A,
            Family::V6 => QType::Aaaa,
        };
        let mut packet = DnsPacket::with_question(QuestionRecord::new(host, qtype));
        packet.authorities.push(ResourceRecord {
            name: host.to_string(),
            qclass: QClass::In,
            ttl: 0,
            rdata: match family {
                Family::V4 => Rdata::A(address.clone()),
                Family::V6 => Rdata::Aaaa(address.clone()),
            },
        });
        let responses = self.lookup_multicast(&packet, family, timeout_ms)?;
        let conflict = responses.iter().flat_map(|r| &r.answers).any(|rr| match &rr.rdata {
            Rdata::A(ip) if family == Family::V4 => ip != address,
            Rdata::Aaaa(ip) if family == Family::V6 => ip != address,
            _ => false,
        });
        Ok(!conflict)
    }

    fn resolve_one(&self, host: &str, qtype: QType, server: &IpAddress, timeout_ms: u64) -> Result<DnsPacket> {
        let packet = DnsPacket::with_question(QuestionRecord::new(host, qtype));
        self.lookup(&packet, server, 0, timeout_ms)
    }

    /// A/AAAA lookup against a specific server.
    pub fn resolve_host(
        &self,
        host: &str,
        family: Family,
        server: &IpAddress,
        timeout_ms: u64,
    ) -> Result<Vec<IpAddress>> {
        let qtype = match family {
            Family::V4 => QType::A,
            Family::V6 => QType::Aaaa,
        };
        let response = self.resolve_one(host, qtype, server, timeout_ms)?;
        Ok(response
            .answers
            .into_iter()
            .filter_map(|rr| match rr.rdata {
                Rdata::A(ip) if family == Family::V4 => Some(ip),
                Rdata::Aaaa(ip) if family == Family::V6 => Some(ip),
                _ => None,
            })
            .collect())
    }

    /// PTR lookup via the address's `.arpa` name.
    pub fn resolve_address(&self, addr: &IpAddress, server: &IpAddress, timeout_ms: u64) -> Result<Vec<String>> {
        let response = self.resolve_one(&addr.to_arpa(), QType::Ptr, server, timeout_ms)?;
        Ok(extract_names(response.answers, |rr| match rr.rdata {
            Rdata::Ptr(name) => Some(name),
            _ => None,
        }))
    }

    /// NS lookup.
    pub fn resolve_name_server(&self, host: &str, server: &IpAddress, timeout_ms: u64) -> Result<Vec<String>> {
        let response = self.resolve_one(host, QType::Ns, server, timeout_ms)?;
        Ok(extract_names(response.answers, |rr| match rr.rdata {
            Rdata::Ns(name) => Some(name),
            _ => None,
        }))
    }

    /// SOA lookup, returning the primary nameserver (`mname`).
    pub fn resolve_authority(&self, host: &str, server: &IpAddress, timeout_ms: u64) -> Result<Option<String>> {
        let response = self.resolve_one(host, QType::Soa, server, timeout_ms)?;
        Ok(response.answers.into_iter().find_map(|rr| match rr.rdata {
            Rdata::Soa { mname, .. } => Some(mname),
            _ => None,
        }))
    }

    /// MX lookup, sorted by ascending preference.
    pub fn resolve_mail_exchanger(
        &self,
        host: &str,
        server: &IpAddress,
        timeout_ms: u64,
    ) -> Result<Vec<(u16, String)>> {
        let response = self.resolve_one(host, QType::Mx, server, timeout_ms)?;
        let mut out: Vec<(u16, String)> = response
            .answers
            .into_iter()
            .filter_map(|rr| match rr.rdata {
                Rdata::Mx { preference, exchange } => Some((preference, exchange)),
                _ => None,
            })
            .collect();
        out.sort_by_key(|(pref, _)| *pref);
        Ok(out)
    }

    /// The OS resolver's configured nameserver list (`/etc/resolv.conf`).
    pub fn name_servers(&self) -> Result<Vec<IpAddress>> {
        crate::dns::resolver_conf::name_servers()
    }

    /// The port configured for `name` in the OS services database
    /// (`/etc/services`), e.g. `resolve_service("https")` -> `443`.
    pub fn resolve_service(&self, name: &str) -> Result<u16> {
        crate::dns::services::resolve_service(name)
    }

    /// Convenience singular form of [`Client::resolve_host`]: the first
    /// returned address, or `NotFound` if the lookup returned none.
    pub fn resolve_host_one(
        &self,
        host: &str,
        family: Family,
        server: &IpAddress,
        timeout_ms: u64,
    ) -> Result<IpAddress> {
        self.resolve_host(host, family, server, timeout_ms)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "no address records in response"))
    }

    /// [`Client::resolve_host`] without an explicit server: tries each of
    /// [`Client::name_servers`] in turn, returning the first successful
    /// lookup.
    pub fn resolve_host_via_system_servers(&self, host: &str, family: Family, timeout_ms: u64) -> Result<Vec<IpAddress>> {
        let servers = self.name_servers()?;
        if servers.is_empty() {
            return Err(Error::new(ErrorKind::NotFound, "no nameservers configured"));
        }
        let mut last_err = None;
        for server in &servers {
            match self.resolve_host(host, family, server, timeout_ms) {
                Ok(addrs) => return Ok(addrs),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap())
    }
}

impl<T: Transport> Default for Client<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_names(
    records: Vec<ResourceRecord>,
    select: impl Fn(ResourceRecord) -> Option<String>,
) -> Vec<String> {
    records.into_iter().filter_map(select).collect()
}
