//! IPv4/IPv6 address value, classification, and `.arpa` conversion.
//!
//! Unlike a thin wrapper around [`std::net::IpAddr`], this type keeps the
//! scope id alongside the bytes and distinguishes family at the value level,
//! which the prefix-construction and `.arpa` operations below both need.
use std::cmp::Ordering;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::{Error, ErrorKind, Result};

/// Address family. Decided at construction time and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

/// An immutable IPv4 or IPv6 address, with an optional IPv6 scope id.
#[derive(Debug, Clone, Eq)]
pub struct IpAddress {
    family: Family,
    bytes: [u8; 16],
    scope: u32,
}

const V4_MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff];
const V4_COMPAT_PREFIX: [u8; 12] = [0; 12];

impl IpAddress {
    /// The wildcard address for `family` (`0.0.0.0` or `::`).
    pub fn wildcard(family: Family) -> Self {
        IpAddress {
            family,
            bytes: [0; 16],
            scope: 0,
        }
    }

    /// Construct from raw big-endian bytes (4 for v4, 16 for v6).
    pub fn from_bytes(family: Family, raw: &[u8], scope: u32) -> Result<Self> {
        let expected = match family {
            Family::V4 => 4,
            Family::V6 => 16,
        };
        if raw.len() != expected {
            return Err(Error::new(
                ErrorKind::InvalidParam,
                format!("expected {} bytes, got {}", expected, raw.len()),
            ));
        }
        let mut bytes = [0u8; 16];
        match family {
            Family::V4 => bytes[..4].copy_from_slice(raw),
            Family::V6 => bytes.copy_from_slice(raw),
        }
        Ok(IpAddress {
            family,
            bytes,
            scope: if family == Family::V4 { 0 } else { scope },
        })
    }

    /// Construct from a textual form. An IPv4 literal can be forced into the
    /// v6 family, in which case it is encoded as `::ffff:a.b.c.d`.
    pub fn parse(text: &str, force_family: Option<Family>) -> Result<Self> {
        let (host, scope) = match text.rsplit_once('%') {
            Some((h, s)) => (h, s.parse::<u32>().unwrap_or(0)),
            None => (text, 0),
        };

        if let Ok(v4) = host.parse::<Ipv4Addr>() {
            return match force_family {
                Some(Family::V6) => Ok(IpAddress::mapped_from_v4(v4)),
                _ => Ok(IpAddress::from_bytes(Family::V4, &v4.octets(), 0).unwrap()),
            };
        }
        if let Ok(v6) = host.parse::<Ipv6Addr>() {
            return Ok(IpAddress::from_bytes(Family::V6, &v6.octets(), scope).unwrap());
        }
        Err(Error::new(
            ErrorKind::InvalidParam,
            format!("not an IP address: {}", text),
        ))
    }

    fn mapped_from_v4(v4: Ipv4Addr) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..12].copy_from_slice(&V4_MAPPED_PREFIX);
        bytes[12..].copy_from_slice(&v4.octets());
        IpAddress {
            family: Family::V6,
            bytes,
            scope: 0,
        }
    }

    /// Construct a contiguous-1s prefix mask for `family` with `bits` set
    /// high bits. `bits` must be in `0..=32` for v4, `0..=128` for v6.
    pub fn from_prefix(family: Family, bits: u32) -> Result<Self> {
        let width = match family {
            Family::V4 => 32,
            Family::V6 => 128,
        };
        if bits > width {
            return Err(Error::new(
                ErrorKind::InvalidParam,
                format!("prefix length {} exceeds {} bits", bits, width),
            ));
        }
        let mut bytes = [0u8; 16];
        let full_bytes = (bits / 8) as usize;
        let rem_bits = bits % 8;
        for b in bytes.iter_mut().take(full_bytes) {
            *b = 0xff;
        }
        if rem_bits > 0 {
            bytes[full_bytes] = 0xffu8 << (8 - rem_bits);
        }
        Ok(IpAddress {
            family,
            bytes,
            scope: 0,
        })
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn scope(&self) -> u32 {
        self.scope
    }

    /// The address bytes: 4 for v4, 16 for v6.
    pub fn as_bytes(&self) -> &[u8] {
        match self.family {
            Family::V4 => &self.bytes[..4],
            Family::V6 => &self.bytes[..16],
        }
    }

    /// Byte at `index`, bounds-checked against the family's address width.
    pub fn byte(&self, index: usize) -> Result<u8> {
        self.as_bytes()
            .get(index)
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::InvalidParam, "byte index out of range"))
    }

    /// Prefix length derived from the count of consecutive leading 1-bits.
    pub fn prefix_len(&self) -> u32 {
        let mut len = 0u32;
        for &b in self.as_bytes() {
            if b == 0xff {
                len += 8;
            } else {
                len += b.leading_ones();
                break;
            }
        }
        len
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    pub fn is_loopback(&self) -> bool {
        match self.family {
            Family::V4 => self.bytes[0] == 127,
            Family::V6 => self.as_bytes() == [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
        }
    }

    pub fn is_link_local(&self) -> bool {
        match self.family {
            Family::V4 => self.bytes[0] == 169 && self.bytes[1] == 254,
            Family::V6 => self.bytes[0] == 0xfe && (self.bytes[1] & 0xc0) == 0x80,
        }
    }

    pub fn is_site_local(&self) -> bool {
        match self.family {
            Family::V4 => {
                self.bytes[0] == 10
                    || (self.bytes[0] == 172 && (16..=31).contains(&self.bytes[1]))
                    || (self.bytes[0] == 192 && self.bytes[1] == 168)
            }
            Family::V6 => self.bytes[0] == 0xfe && (self.bytes[1] & 0xc0) == 0xc0,
        }
    }

    pub fn is_unique_local(&self) -> bool {
        self.family == Family::V6 && (self.bytes[0] & 0xfe) == 0xfc
    }

    pub fn is_multicast(&self) -> bool {
        match self.family {
            Family::V4 => (self.bytes[0] & 0xf0) == 0xe0,
            Family::V6 => self.bytes[0] == 0xff,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.family == Family::V4 && self.as_bytes() == [255, 255, 255, 255]
    }

    pub fn is_unicast(&self) -> bool {
        !self.is_multicast() && !self.is_broadcast() && !self.is_wildcard()
    }

    pub fn is_global(&self) -> bool {
        self.is_unicast()
            && !self.is_loopback()
            && !self.is_link_local()
            && !self.is_site_local()
            && !self.is_unique_local()
    }

    pub fn is_ipv4_address(&self) -> bool {
        self.family == Family::V4
    }

    pub fn is_ipv6_address(&self) -> bool {
        self.family == Family::V6
    }

    pub fn is_ipv4_compat(&self) -> bool {
        self.family == Family::V6
            && self.bytes[..12] == V4_COMPAT_PREFIX
            && self.bytes[12..] != [0, 0, 0, 0]
            && self.bytes[12..] != [0, 0, 0, 1]
    }

    /// True for every v4-family address, and for a v6-family address in the
    /// literal `::ffff:a.b.c.d` form. This is wider than the plain-English
    /// reading of "IPv4-mapped" because the reference implementation treats
    /// a v4 address as trivially representable in mapped form.
    pub fn is_ipv4_mapped(&self) -> bool {
        self.family == Family::V4
            || (self.family == Family::V6 && self.bytes[..12] == V4_MAPPED_PREFIX)
    }

    /// The embedded v4 address for a mapped/compat v6 address; unchanged
    /// otherwise.
    pub fn to_ipv4(&self) -> IpAddress {
        if self.family == Family::V4 {
            return self.clone();
        }
        if self.is_ipv4_mapped() || self.is_ipv4_compat() {
            return IpAddress::from_bytes(Family::V4, &self.bytes[12..16], 0).unwrap();
        }
        self.clone()
    }

    /// Promote a v4 address to its v6 mapped form; no-op for v6.
    pub fn to_ipv6(&self) -> IpAddress {
        match self.family {
            Family::V4 => IpAddress::mapped_from_v4(Ipv4Addr::new(
                self.bytes[0],
                self.bytes[1],
                self.bytes[2],
                self.bytes[3],
            )),
            Family::V6 => self.clone(),
        }
    }

    fn bitwise(&self, other: &IpAddress, f: impl Fn(u8, u8) -> u8) -> Result<IpAddress> {
        if self.family != other.family {
            return Err(Error::new(
                ErrorKind::InvalidParam,
                "bitwise operation requires matching address families",
            ));
        }
        let mut bytes = [0u8; 16];
        for i in 0..16 {
            bytes[i] = f(self.bytes[i], other.bytes[i]);
        }
        Ok(IpAddress {
            family: self.family,
            bytes,
            scope: self.scope,
        })
    }

    pub fn and(&self, other: &IpAddress) -> Result<IpAddress> {
        self.bitwise(other, |a, b| a & b)
    }

    pub fn or(&self, other: &IpAddress) -> Result<IpAddress> {
        self.bitwise(other, |a, b| a | b)
    }

    pub fn xor(&self, other: &IpAddress) -> Result<IpAddress> {
        self.bitwise(other, |a, b| a ^ b)
    }

    pub fn not(&self) -> IpAddress {
        let mut bytes = self.bytes;
        for b in bytes.iter_mut() {
            *b = !*b;
        }
        IpAddress {
            family: self.family,
            bytes,
            scope: self.scope,
        }
    }

    /// Textual form, with a `%scope` suffix for v6 link-local addresses.
    pub fn to_text(&self) -> String {
        match self.family {
            Family::V4 => {
                let b = self.as_bytes();
                Ipv4Addr::new(b[0], b[1], b[2], b[3]).to_string()
            }
            Family::V6 => {
                let v6 = Ipv6Addr::from(self.bytes);
                if self.scope != 0 {
                    format!("{}%{}", v6, self.scope)
                } else {
                    v6.to_string()
                }
            }
        }
    }

    /// The reverse-DNS `.arpa` name for this address.
    ///
    /// For v6, each hex nibble of the address is emitted low-order-nibble
    /// first, traversing the address from its last byte to its first
    /// (RFC 3596).
    pub fn to_arpa(&self) -> String {
        match self.family {
            Family::V4 => {
                let b = self.as_bytes();
                format!("{}.{}.{}.{}.in-addr.arpa", b[3], b[2], b[1], b[0])
            }
            Family::V6 => {
                let mut labels = Vec::with_capacity(32);
                for &byte in self.bytes.iter().rev() {
                    labels.push(format!("{:x}", byte & 0x0f));
                    labels.push(format!("{:x}", byte >> 4));
                }
                format!("{}.ip6.arpa", labels.join("."))
            }
        }
    }
}

impl PartialEq for IpAddress {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family && self.as_bytes() == other.as_bytes() && self.scope == other.scope
    }
}

impl PartialOrd for IpAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IpAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.family as u8)
            .cmp(&(other.family as u8))
            .then_with(|| self.as_bytes().cmp(other.as_bytes()))
            .then_with(|| self.scope.cmp(&other.scope))
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(v4: Ipv4Addr) -> Self {
        IpAddress::from_bytes(Family::V4, &v4.octets(), 0).unwrap()
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(v6: Ipv6Addr) -> Self {
        IpAddress::from_bytes(Family::V6, &v6.octets(), 0).unwrap()
    }
}

impl TryFrom<&IpAddress> for SocketAddr {
    type Error = Error;

    fn try_from(addr: &IpAddress) -> Result<SocketAddr> {
        let ip = match addr.family {
            Family::V4 => {
                let b = addr.as_bytes();
                std::net::IpAddr::V4(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            Family::V6 => std::net::IpAddr::V6(Ipv6Addr::from(addr.bytes)),
        };
        Ok(SocketAddr::new(ip, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_round_trips_through_text() {
        let a = IpAddress::parse("192.168.1.10", None).unwrap();
        assert_eq!(a.family(), Family::V4);
        assert_eq!(IpAddress::parse(&a.to_text(), None).unwrap(), a);
    }

    #[test]
    fn v6_mapped_round_trips() {
        let a = IpAddress::parse("::ffff:10.0.0.1", None).unwrap();
        assert_eq!(a.family(), Family::V6);
        assert!(a.is_ipv4_mapped());
        assert_eq!(a.to_ipv4().to_text(), "10.0.0.1");
    }

    #[test]
    fn v4_is_always_considered_mapped() {
        let a = IpAddress::parse("0.0.0.0", None).unwrap();
        assert!(a.is_ipv4_mapped());
    }

    #[test]
    fn forcing_v4_literal_into_v6_yields_mapped_form() {
        let a = IpAddress::parse("1.2.3.4", Some(Family::V6)).unwrap();
        assert_eq!(a.family(), Family::V6);
        assert_eq!(a.to_text(), "::ffff:1.2.3.4");
    }

    #[test]
    fn prefix_construct_rejects_out_of_range_bits() {
        assert!(IpAddress::from_prefix(Family::V4, 33).is_err());
        assert!(IpAddress::from_prefix(Family::V6, 129).is_err());
    }

    #[test]
    fn prefix_construct_yields_contiguous_ones() {
        let mask = IpAddress::from_prefix(Family::V4, 24).unwrap();
        assert_eq!(mask.as_bytes(), [255, 255, 255, 0]);
        assert_eq!(mask.prefix_len(), 24);
    }

    #[test]
    fn bitwise_ops_reject_cross_family() {
        let v4 = IpAddress::parse("1.2.3.4", None).unwrap();
        let v6 = IpAddress::parse("::1", None).unwrap();
        assert!(v4.and(&v6).is_err());
    }

    #[test]
    fn v6_to_arpa_matches_rfc3596_nibble_order() {
        let a = IpAddress::parse("2001:db8::567:89ab", None).unwrap();
        assert_eq!(
            a.to_arpa(),
            "b.a.9.8.7.6.5.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa"
        );
    }

    #[test]
    fn v4_to_arpa() {
        let a = IpAddress::parse("192.0.2.1", None).unwrap();
        assert_eq!(a.to_arpa(), "1.2.0.192.in-addr.arpa");
    }

    #[test]
    fn classification_predicates() {
        assert!(IpAddress::parse("127.0.0.1", None).unwrap().is_loopback());
        assert!(IpAddress::parse("169.254.1.1", None)
            .unwrap()
            .is_link_local());
        assert!(IpAddress::parse("10.0.0.1", None).unwrap().is_site_local());
        assert!(IpAddress::parse("224.0.0.1", None)
            .unwrap()
            .is_multicast());
        assert!(IpAddress::parse("8.8.8.8", None).unwrap().is_global());
    }
}
