//! The in-memory DNS packet: header plus the four record sections.
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::dns::wire::{self, Header, QClass, QType};
use crate::error::{Error, ErrorKind, Result};
use crate::ip_address::IpAddress;

#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub name: String,
    pub qtype: QType,
    pub qclass: QClass,
}

impl QuestionRecord {
    pub fn new(name: impl Into<String>, qtype: QType) -> Self {
        QuestionRecord {
            name: name.into(),
            qtype,
            qclass: QClass::In,
        }
    }

    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> Result<()> {
        wire::encode_name(&self.name, buffer)?;
        buffer.write_u16::<BigEndian>(self.qtype as u16)?;
        buffer.write_u16::<BigEndian>(self.qclass as u16)?;
        Ok(())
    }

    fn from_network_bytes(buffer: &mut Cursor<&[u8]>) -> Result<Self> {
        let name = wire::decode_name(buffer)?;
        let qtype = QType::try_from(buffer.read_u16::<BigEndian>()?)?;
        let qclass = QClass::try_from(buffer.read_u16::<BigEndian>()?)?;
        Ok(QuestionRecord { name, qtype, qclass })
    }
}

/// A resource record's type-specific payload.
#[derive(Debug, Clone)]
pub enum Rdata {
    A(IpAddress),
    Aaaa(IpAddress),
    Cname(String),
    Ns(String),
    Ptr(String),
    Mx { preference: u16, exchange: String },
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Txt(String),
    Unknown { qtype: u16, raw: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub name: String,
    pub qclass: QClass,
    pub ttl: u32,
    pub rdata: Rdata,
}

impl ResourceRecord {
    fn from_network_bytes(buffer: &mut Cursor<&[u8]>) -> Result<Self> {
        let name = wire::decode_name(buffer)?;
        let raw_type = buffer.read_u16::<BigEndian>()?;
        let qclass = QClass::try_from(buffer.read_u16::<BigEndian>()?)?;
        let ttl = buffer.read_u32::<BigEndian>()?;
        let rdlength = buffer.read_u16::<BigEndian>()?;
        let rdata_start = buffer.position();

        let rdata = match QType::try_from(raw_type) {
            Ok(QType::A) => Rdata::A(wire::decode_ipv4(buffer)?),
            Ok(QType::Aaaa) => Rdata::Aaaa(wire::decode_ipv6(buffer)?),
            Ok(QType::Cname) => Rdata::Cname(wire::decode_name(buffer)?),
            Ok(QType::Ns) => Rdata::Ns(wire::decode_name(buffer)?),
            Ok(QType::Ptr) => Rdata::Ptr(wire::decode_name(buffer)?),
            Ok(QType::Mx) => {
                let preference = buffer.read_u16::<BigEndian>()?;
                let exchange = wire::decode_name(buffer)?;
                Rdata::Mx { preference, exchange }
            }
            Ok(QType::Soa) => {
                let mname = wire::decode_name(buffer)?;
                let rname = wire::decode_soa_mbox(&wire::decode_name(buffer)?);
                Rdata::Soa {
                    mname,
                    rname,
                    serial: buffer.read_u32::<BigEndian>()?,
                    refresh: buffer.read_u32::<BigEndian>()?,
                    retry: buffer.read_u32::<BigEndian>()?,
                    expire: buffer.read_u32::<BigEndian>()?,
                    minimum: buffer.read_u32::<BigEndian>()?,
                }
            }
            Ok(QType::Txt) => {
                let len = buffer.read_u8()? as usize;
                let mut raw = vec![0u8; len];
                std::io::Read::read_exact(buffer, &mut raw)?;
                Rdata::Txt(String::from_utf8(raw)?)
            }
            _ => {
                let mut raw = vec![0u8; rdlength as usize];
                std::io::Read::read_exact(buffer, &mut raw)?;
                Rdata::Unknown { qtype: raw_type, raw }
            }
        };

        // decoding may have followed compression pointers, leaving the
        // cursor anywhere; rdlength is authoritative for where the next
        // record begins.
        buffer.set_position(rdata_start + rdlength as u64);

        Ok(ResourceRecord { name, qclass: qclass, ttl, rdata })
    }

    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> Result<()> {
        wire::encode_name(&self.name, buffer)?;
        let qtype = match &self.rdata {
            Rdata::A(_) => QType::A,
            Rdata::Aaaa(_) => QType::Aaaa,
            Rdata::Cname(_) => QType::Cname,
            Rdata::Ns(_) => QType::Ns,
            Rdata::Ptr(_) => QType::Ptr,
            Rdata::Mx { .. } => QType::Mx,
            Rdata::Soa { .. } => QType::Soa,
            Rdata::Txt(_) => QType::Txt,
            Rdata::Unknown { .. } => QType::Any,
        };
        buffer.write_u16::<BigEndian>(qtype as u16)?;
        buffer.write_u16::<BigEndian>(self.qclass as u16)?;
        buffer.write_u32::<BigEndian>(self.ttl)?;

        let rdlength_pos = buffer.len();
        buffer.write_u16::<BigEndian>(0)?;
        let rdata_start = buffer.len();
        match &self.rdata {
            Rdata::A(ip) => {
                wire::encode_ipv4(ip, buffer)?;
            }
            Rdata::Aaaa(ip) => {
                wire::encode_ipv6(ip, buffer)?;
            }
            Rdata::Cname(name) | Rdata::Ns(name) | Rdata::Ptr(name) => {
                wire::encode_name(name, buffer)?;
            }
            Rdata::Mx { preference, exchange } => {
                buffer.write_u16::<BigEndian>(*preference)?;
                wire::encode_name(exchange, buffer)?;
            }
            Rdata::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                wire::encode_name(mname, buffer)?;
                wire::encode_name(&wire::encode_soa_mbox(rname), buffer)?;
                buffer.write_u32::<BigEndian>(*serial)?;
                buffer.write_u32::<BigEndian>(*refresh)?;
                buffer.write_u32::<BigEndian>(*retry)?;
                buffer.write_u32::<BigEndian>(*expire)?;
                buffer.write_u32::<BigEndian>(*minimum)?;
            }
            Rdata::Txt(s) => {
                buffer.write_u8(s.len() as u8)?;
                buffer.extend_from_slice(s.as_bytes());
            }
            Rdata::Unknown { raw, .. } => {
                buffer.extend_from_slice(raw);
            }
        }
        let rdlength = (buffer.len() - rdata_start) as u16;
        buffer[rdlength_pos..rdlength_pos + 2].copy_from_slice(&rdlength.to_be_bytes());
        Ok(())
    }
}

/// A full DNS message: header-derived section counts plus the four record
/// sequences. Source/destination endpoint are tracked by the client, not
/// here.
#[derive(Debug, Clone, Default)]
pub struct DnsPacket {
    pub questions: Vec<QuestionRecord>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl DnsPacket {
    pub fn with_question(question: QuestionRecord) -> Self {
        DnsPacket {
            questions: vec![question],
            ..Default::default()
        }
    }

    pub fn to_network_bytes(&self, id: u16, recursion_desired: bool) -> Result<Vec<u8>> {
        if self.questions.len() > u16::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidParam, "too many questions"));
        }
        let mut header = Header::query(id, recursion_desired);
        header.qd_count = self.questions.len() as u16;
        header.an_count = self.answers.len() as u16;
        header.ns_count = self.authorities.len() as u16;
        header.ar_count = self.additionals.len() as u16;

        let mut buffer = Vec::with_capacity(64);
        header.to_network_bytes(&mut buffer)?;
        for q in &self.questions {
            q.to_network_bytes(&mut buffer)?;
        }
        for section in [&self.answers, &self.authorities, &self.additionals] {
            for rr in section {
                rr.to_network_bytes(&mut buffer)?;
            }
        }
        Ok(buffer)
    }

    /// Parse a full response. `self.questions` is replaced by the decoded
    /// questions (clearing whatever was there from a prior send), and the
    /// header's RCODE is returned for the caller to map.
    pub fn from_network_bytes(raw: &[u8]) -> Result<(u16, Header, DnsPacket)> {
        let mut cursor = Cursor::new(raw);
        let header = Header::from_network_bytes(&mut cursor)?;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            questions.push(QuestionRecord::from_network_bytes(&mut cursor)?);
        }
        let mut answers = Vec::with_capacity(header.an_count as usize);
        for _ in 0..header.an_count {
            answers.push(ResourceRecord::from_network_bytes(&mut cursor)?);
        }
        let mut authorities = Vec::with_capacity(header.ns_count as usize);
        for _ in 0..header.ns_count {
            authorities.push(ResourceRecord::from_network_bytes(&mut cursor)?);
        }
        let mut additionals = Vec::with_capacity(header.ar_count as usize);
        for _ in 0..header.ar_count {
            additionals.push(ResourceRecord::from_network_bytes(&mut cursor)?);
        }

        let id = header.id;
        Ok((
            id,
            header,
            DnsPacket {
                questions,
                answers,
                authorities,
                additionals,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_round_trips() {
        let packet = DnsPacket::with_question(QuestionRecord::new("example.com", QType::A));
        let bytes = packet.to_network_bytes(0xbeef, true).unwrap();
        let (id, header, decoded) = DnsPacket::from_network_bytes(&bytes).unwrap();
        assert_eq!(id, 0xbeef);
        assert!(header.recursion_desired);
        assert_eq!(decoded.questions.len(), 1);
        assert_eq!(decoded.questions[0].name, "example.com");
    }

    #[test]
    fn a_record_round_trips() {
        let mut packet = DnsPacket::with_question(QuestionRecord::new("example.com", QType::A));
        packet.answers.push(ResourceRecord {
            name: "example.com".into(),
            qclass: QClass::In,
            ttl: 300,
            rdata: Rdata::A(IpAddress::parse("93.184.216.34", None).unwrap()),
        });
        let bytes = packet.to_network_bytes(1, true).unwrap();
        let (_, _, decoded) = DnsPacket::from_network_bytes(&bytes).unwrap();
        match &decoded.answers[0].rdata {
            Rdata::A(ip) => assert_eq!(ip.to_text(), "93.184.216.34"),
            other => panic!("unexpected rdata: {:?}", other),
        }
    }
}
