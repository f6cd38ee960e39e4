//! Wire-level encode/decode: header, names (with compression-aware
//! decoding), and the resource-record types this crate understands.
//!
//! Name compression is recognized on decode but never emitted on encode —
//! this crate always writes full names, the simplest correct behavior.
use std::convert::TryFrom;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, ErrorKind, Result};
use crate::ip_address::{Family, IpAddress};

/// Maximum depth of pointer-chasing while decompressing a name. A pointer
/// must always target an offset strictly lower than where it was itself
/// read, so a loop through recompressed pointers is structurally
/// impossible; this is a defense against pathological but not looping
/// inputs (e.g. a chain of single-pointer names each one byte shorter).
const MAX_POINTER_CHAIN: u32 = 32;

pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub response: bool,
    pub opcode: u8,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: u8,
    pub qd_count: u16,
    pub an_count: u16,
    pub ns_count: u16,
    pub ar_count: u16,
}

impl Header {
    pub fn query(id: u16, recursion_desired: bool) -> Self {
        Header {
            id,
            response: false,
            opcode: 0,
            truncated: false,
            recursion_desired,
            recursion_available: false,
            rcode: 0,
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    pub fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> Result<usize> {
        buffer.write_u16::<BigEndian>(self.id)?;
        let mut flags: u16 = 0;
        if self.response {
            flags |= 1 << 15;
        }
        flags |= (self.opcode as u16 & 0x0f) << 11;
        if self.truncated {
            flags |= 1 << 9;
        }
        if self.recursion_desired {
            flags |= 1 << 8;
        }
        if self.recursion_available {
            flags |= 1 << 7;
        }
        flags |= self.rcode as u16 & 0x0f;
        buffer.write_u16::<BigEndian>(flags)?;
        buffer.write_u16::<BigEndian>(self.qd_count)?;
        buffer.write_u16::<BigEndian>(self.an_count)?;
        buffer.write_u16::<BigEndian>(self.ns_count)?;
        buffer.write_u16::<BigEndian>(self.ar_count)?;
        Ok(HEADER_LEN)
    }

    pub fn from_network_bytes(buffer: &mut Cursor<&[u8]>) -> Result<Self> {
        let id = buffer.read_u16::<BigEndian>()?;
        let flags = buffer.read_u16::<BigEndian>()?;
        Ok(Header {
            id,
            response: flags & (1 << 15) != 0,
            opcode: ((flags >> 11) & 0x0f) as u8,
            truncated: flags & (1 << 9) != 0,
            recursion_desired: flags & (1 << 8) != 0,
            recursion_available: flags & (1 << 7) != 0,
            rcode: (flags & 0x0f) as u8,
            qd_count: buffer.read_u16::<BigEndian>()?,
            an_count: buffer.read_u16::<BigEndian>()?,
            ns_count: buffer.read_u16::<BigEndian>()?,
            ar_count: buffer.read_u16::<BigEndian>()?,
        })
    }

    /// Maps RCODE to this crate's error taxonomy. `NOERROR` maps to `Ok`.
    pub fn rcode_to_result(&self) -> Result<()> {
        match self.rcode {
            0 => Ok(()),
            1 | 4 => Err(Error::new(ErrorKind::InvalidParam, "FORMERR/NOTIMP")),
            2 => Err(Error::new(ErrorKind::OperationFailed, "SERVFAIL")),
            3 => Err(Error::new(ErrorKind::NotFound, "NXDOMAIN")),
            5 => Err(Error::new(ErrorKind::PermissionDenied, "REFUSED")),
            _ => Err(Error::new(ErrorKind::UnknownError, "unrecognized RCODE")),
        }
    }
}

/// Query/record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum QType {
    A = 1,
    Ns = 2,
    Cname = 5,
    Soa = 6,
    Ptr = 12,
    Mx = 15,
    Txt = 16,
    Aaaa = 28,
    Any = 255,
}

impl TryFrom<u16> for QType {
    type Error = Error;
    fn try_from(v: u16) -> Result<Self> {
        Ok(match v {
            1 => QType::A,
            2 => QType::Ns,
            5 => QType::Cname,
            6 => QType::Soa,
            12 => QType::Ptr,
            15 => QType::Mx,
            16 => QType::Txt,
            28 => QType::Aaaa,
            255 => QType::Any,
            _ => return Err(Error::new(ErrorKind::InvalidParam, format!("unknown QTYPE {}", v))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum QClass {
    In = 1,
    Any = 255,
}

impl TryFrom<u16> for QClass {
    type Error = Error;
    fn try_from(v: u16) -> Result<Self> {
        match v {
            1 => Ok(QClass::In),
            255 => Ok(QClass::Any),
            _ => Err(Error::new(ErrorKind::InvalidParam, format!("unknown QCLASS {}", v))),
        }
    }
}

/// Encode `name` as a sequence of length-prefixed labels terminated by a
/// zero byte. Never emits a compression pointer.
///
/// ```
/// use joinet::dns::wire::encode_name;
/// let mut buf = Vec::new();
/// encode_name("www.example.com", &mut buf).unwrap();
/// assert_eq!(buf, b"\x03www\x07example\x03com\x00");
/// ```
pub fn encode_name(name: &str, buffer: &mut Vec<u8>) -> Result<usize> {
    let mut written = 0;
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() {
        buffer.write_u8(0)?;
        return Ok(1);
    }
    for label in trimmed.split('.') {
        if label.len() > 63 {
            return Err(Error::new(ErrorKind::InvalidParam, "label longer than 63 bytes"));
        }
        buffer.write_u8(label.len() as u8)?;
        buffer.extend_from_slice(label.as_bytes());
        written += 1 + label.len();
    }
    buffer.write_u8(0)?;
    Ok(written + 1)
}

/// Decode a name starting at the cursor's current position, following
/// compression pointers. Leaves the cursor positioned just past the local
/// (non-pointer) part of the name, per RFC 1035 §4.1.4.
pub fn decode_name(buffer: &mut Cursor<&[u8]>) -> Result<String> {
    decode_name_inner(buffer, 0)
}

fn decode_name_inner(buffer: &mut Cursor<&[u8]>, depth: u32) -> Result<String> {
    if depth > MAX_POINTER_CHAIN {
        return Err(Error::new(ErrorKind::InvalidDocument, "name compression pointer chain too deep"));
    }
    let mut labels: Vec<String> = Vec::new();
    loop {
        let len_byte_pos = buffer.position();
        let len = buffer.read_u8()?;
        if len == 0 {
            break;
        }
        if len & 0xc0 == 0xc0 {
            let lo = buffer.read_u8()?;
            let pointer = (((len as u16) & 0x3f) << 8) | lo as u16;
            if pointer as u64 >= len_byte_pos {
                return Err(Error::new(
                    ErrorKind::InvalidDocument,
                    "name compression pointer does not point backwards",
                ));
            }
            let saved = buffer.position();
            buffer.set_position(pointer as u64);
            let tail = decode_name_inner(buffer, depth + 1)?;
            buffer.set_position(saved);
            labels.push(tail);
            return Ok(labels.join("."));
        }
        let mut raw = vec![0u8; len as usize];
        std::io::Read::read_exact(buffer, &mut raw)?;
        labels.push(String::from_utf8(raw)?);
    }
    Ok(labels.join("."))
}

/// Encode a SOA mailbox (`RNAME`) from its `user@domain` textual form: the
/// first unescaped `.` in the user part becomes `@`, and any literal `.` in
/// the user part must already be escaped as `\.`.
pub fn encode_soa_mbox(mbox: &str) -> String {
    let mut out = String::with_capacity(mbox.len());
    let mut replaced_at = false;
    let mut chars = mbox.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                out.push(c);
                out.push(next);
                chars.next();
                continue;
            }
        }
        if c == '@' && !replaced_at {
            out.push('.');
            replaced_at = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode a SOA mailbox wire name back into `user@domain` form: the first
/// unescaped `.` becomes `@`; `\.` reverts to a literal `.`.
pub fn decode_soa_mbox(wire_name: &str) -> String {
    let mut out = String::with_capacity(wire_name.len());
    let mut replaced_at = false;
    let mut chars = wire_name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                out.push(c);
                out.push(next);
                chars.next();
                continue;
            }
        }
        if c == '.' && !replaced_at {
            out.push('@');
            replaced_at = true;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn encode_ipv4(addr: &IpAddress, buffer: &mut Vec<u8>) -> Result<usize> {
    if addr.family() != Family::V4 {
        return Err(Error::new(ErrorKind::InvalidParam, "A record requires an IPv4 address"));
    }
    buffer.extend_from_slice(addr.as_bytes());
    Ok(4)
}

pub fn decode_ipv4(buffer: &mut Cursor<&[u8]>) -> Result<IpAddress> {
    let mut raw = [0u8; 4];
    std::io::Read::read_exact(buffer, &mut raw)?;
    IpAddress::from_bytes(Family::V4, &raw, 0)
}

pub fn encode_ipv6(addr: &IpAddress, buffer: &mut Vec<u8>) -> Result<usize> {
    if addr.family() != Family::V6 {
        return Err(Error::new(ErrorKind::InvalidParam, "AAAA record requires an IPv6 address"));
    }
    buffer.extend_from_slice(addr.as_bytes());
    Ok(16)
}

pub fn decode_ipv6(buffer: &mut Cursor<&[u8]>) -> Result<IpAddress> {
    let mut raw = [0u8; 16];
    std::io::Read::read_exact(buffer, &mut raw)?;
    IpAddress::from_bytes(Family::V6, &raw, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // captured header of a query for www.example.com A, id 0x1234, RD set
    const HEADER_BYTES: [u8; 12] = [
        0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn header_round_trips() {
        let mut cursor = Cursor::new(&HEADER_BYTES[..]);
        let header = Header::from_network_bytes(&mut cursor).unwrap();
        assert_eq!(header.id, 0x1234);
        assert!(header.recursion_desired);
        assert!(!header.response);
        assert_eq!(header.qd_count, 1);

        let mut buffer = Vec::new();
        header.to_network_bytes(&mut buffer).unwrap();
        assert_eq!(buffer, HEADER_BYTES);
    }

    #[test]
    fn name_decodes_with_single_pointer() {
        // "example.com" at offset 0, then a name at offset 13 that is just
        // a pointer back to offset 0.
        let mut packet = Vec::new();
        encode_name("example.com", &mut packet).unwrap();
        let pointer_offset = packet.len() as u64;
        packet.push(0xc0);
        packet.push(0x00);

        let mut cursor = Cursor::new(packet.as_slice());
        cursor.set_position(pointer_offset);
        let name = decode_name(&mut cursor).unwrap();
        assert_eq!(name, "example.com");
    }

    #[test]
    fn forward_pointer_is_rejected() {
        let mut packet = vec![0xc0, 0x05, 0x00];
        packet.extend_from_slice(b"\x03foo\x00");
        let mut cursor = Cursor::new(packet.as_slice());
        assert!(decode_name(&mut cursor).is_err());
    }

    #[test]
    fn soa_mbox_escapes_round_trip() {
        let wire = r"admin\.team.example.com";
        let mbox = decode_soa_mbox(wire);
        assert_eq!(mbox, r"admin\.team@example.com");
        assert_eq!(encode_soa_mbox(&mbox), wire);
    }

    #[test]
    fn rcode_maps_to_taxonomy() {
        let mut h = Header::query(1, true);
        h.rcode = 3;
        assert_eq!(h.rcode_to_result().unwrap_err().kind(), ErrorKind::NotFound);
        h.rcode = 5;
        assert_eq!(h.rcode_to_result().unwrap_err().kind(), ErrorKind::PermissionDenied);
    }
}
