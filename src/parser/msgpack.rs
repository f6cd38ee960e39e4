//! MessagePack binary parser and writer over the shared [`Handler`] event
//! contract. Byte layout is bit-exact with the public MessagePack spec;
//! all multi-byte headers are big-endian.
use std::convert::TryFrom;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, ErrorKind, Result};
use crate::parser::Handler;
use crate::value::{Value, ValueBuilder};

/// Parse a single top-level MessagePack document, driving `handler`. The
/// top-level value must be an array or map; a bare scalar is
/// `InvalidDocument`.
pub fn parse(input: &[u8], handler: &mut dyn Handler) -> Result<()> {
    let mut cursor = Cursor::new(input);
    let tag = peek_tag(&mut cursor)?;
    if !matches!(tag, 0x80..=0x8f | 0x90..=0x9f | 0xdc | 0xdd | 0xde | 0xdf) {
        return Err(Error::new(
            ErrorKind::InvalidDocument,
            "top-level MessagePack value must be an array or map",
        ));
    }
    parse_value(&mut cursor, handler, 0)?;
    if (cursor.position() as usize) != input.len() {
        return Err(Error::new(
            ErrorKind::ExtraData,
            format!("trailing data at byte {}", cursor.position()),
        ));
    }
    Ok(())
}

/// Parse `input` directly into a [`Value`] tree.
pub fn parse_to_value(input: &[u8]) -> Result<Value> {
    let mut builder = ValueBuilder::new();
    parse(input, &mut builder)?;
    builder.finish()
}

/// Serialize `value` to MessagePack bytes. `value` must be an array or
/// object at the top level (the format has no bare top-level scalars).
pub fn to_bytes(value: &Value) -> Result<Vec<u8>> {
    if !value.is_array() && !value.is_object() {
        return Err(Error::new(
            ErrorKind::InvalidDocument,
            "top-level MessagePack value must be an array or map",
        ));
    }
    let mut writer = Writer::new();
    value.serialize(&mut writer)?;
    Ok(writer.finish())
}

fn peek_tag(cursor: &mut Cursor<&[u8]>) -> Result<u8> {
    let pos = cursor.position();
    let tag = read_u8(cursor)?;
    cursor.set_position(pos);
    Ok(tag)
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8> {
    cursor
        .read_u8()
        .map_err(|_| Error::new(ErrorKind::InvalidDocument, "unexpected end of input"))
}

fn read_exact(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    std::io::Read::read_exact(cursor, &mut buf)
        .map_err(|_| Error::new(ErrorKind::InvalidDocument, "unexpected end of input"))?;
    Ok(buf)
}

fn parse_value(cursor: &mut Cursor<&[u8]>, handler: &mut dyn Handler, depth: usize) -> Result<()> {
    if depth > crate::value::MAX_NESTING_DEPTH {
        return Err(Error::new(ErrorKind::NestingTooDeep, "MessagePack nesting exceeds limit"));
    }
    let tag = read_u8(cursor)?;
    match tag {
        0x00..=0x7f => handler.unsigned(tag as u64),
        0xe0..=0xff => handler.integer((tag as i8) as i64),
        0x80..=0x8f => parse_map(cursor, handler, depth, (tag & 0x0f) as usize),
        0x90..=0x9f => parse_array(cursor, handler, depth, (tag & 0x0f) as usize),
        0xa0..=0xbf => {
            let len = (tag & 0x1f) as usize;
            let bytes = read_exact(cursor, len)?;
            handler.string(&bytes)
        }
        0xc0 => handler.null(),
        0xc2 => handler.boolean(false),
        0xc3 => handler.boolean(true),
        0xc4 => {
            let len = read_u8(cursor)? as usize;
            let bytes = read_exact(cursor, len)?;
            handler.string(&bytes)
        }
        0xc5 => {
            let len = cursor.read_u16::<BigEndian>()? as usize;
            let bytes = read_exact(cursor, len)?;
            handler.string(&bytes)
        }
        0xc6 => {
            let len = cursor.read_u32::<BigEndian>()? as usize;
            let bytes = read_exact(cursor, len)?;
            handler.string(&bytes)
        }
        0xca => {
            let v = cursor.read_f32::<BigEndian>()?;
            handler.real(v as f64)
        }
        0xcb => {
            let v = cursor.read_f64::<BigEndian>()?;
            handler.real(v)
        }
        0xcc => handler.unsigned(read_u8(cursor)? as u64),
        0xcd => handler.unsigned(cursor.read_u16::<BigEndian>()? as u64),
        0xce => handler.unsigned(cursor.read_u32::<BigEndian>()? as u64),
        0xcf => handler.unsigned(cursor.read_u64::<BigEndian>()?),
        0xd0 => handler.integer(cursor.read_i8()? as i64),
        0xd1 => handler.integer(cursor.read_i16::<BigEndian>()? as i64),
        0xd2 => handler.integer(cursor.read_i32::<BigEndian>()? as i64),
        0xd3 => handler.integer(cursor.read_i64::<BigEndian>()?),
        0xd9 => {
            let len = read_u8(cursor)? as usize;
            let bytes = read_exact(cursor, len)?;
            handler.string(&bytes)
        }
        0xda => {
            let len = cursor.read_u16::<BigEndian>()? as usize;
            let bytes = read_exact(cursor, len)?;
            handler.string(&bytes)
        }
        0xdb => {
            let len = cursor.read_u32::<BigEndian>()? as usize;
            let bytes = read_exact(cursor, len)?;
            handler.string(&bytes)
        }
        0xdc => {
            let len = cursor.read_u16::<BigEndian>()? as usize;
            parse_array(cursor, handler, depth, len)
        }
        0xdd => {
            let len = cursor.read_u32::<BigEndian>()? as usize;
            parse_array(cursor, handler, depth, len)
        }
        0xde => {
            let len = cursor.read_u16::<BigEndian>()? as usize;
            parse_map(cursor, handler, depth, len)
        }
        0xdf => {
            let len = cursor.read_u32::<BigEndian>()? as usize;
            parse_map(cursor, handler, depth, len)
        }
        other => Err(Error::new(
            ErrorKind::InvalidType,
            format!("unsupported MessagePack type byte {:#04x}", other),
        )),
    }
}

fn parse_array(cursor: &mut Cursor<&[u8]>, handler: &mut dyn Handler, depth: usize, len: usize) -> Result<()> {
    handler.start_array(Some(len))?;
    for _ in 0..len {
        parse_value(cursor, handler, depth + 1)?;
    }
    handler.end_array()
}

fn parse_map(cursor: &mut Cursor<&[u8]>, handler: &mut dyn Handler, depth: usize, len: usize) -> Result<()> {
    handler.start_object(Some(len))?;
    for _ in 0..len {
        // Keys may be any MessagePack value in general, but this crate's
        // value tree (and every format it round-trips through) only ever
        // uses string keys, so read the key as a string directly.
        let tag = read_u8(cursor)?;
        let key = match tag {
            0xa0..=0xbf => read_exact(cursor, (tag & 0x1f) as usize)?,
            0xd9 => {
                let len = read_u8(cursor)? as usize;
                read_exact(cursor, len)?
            }
            0xda => {
                let len = cursor.read_u16::<BigEndian>()? as usize;
                read_exact(cursor, len)?
            }
            0xdb => {
                let len = cursor.read_u32::<BigEndian>()? as usize;
                read_exact(cursor, len)?
            }
            other => {
                return Err(Error::new(
                    ErrorKind::InvalidType,
                    format!("unsupported MessagePack map key type byte {:#04x}", other),
                ))
            }
        };
        handler.key(&key)?;
        parse_value(cursor, handler, depth + 1)?;
    }
    handler.end_object()
}

/// A [`Handler`] that accumulates MessagePack bytes, picking the smallest
/// encoding that fits each value.
struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Writer { out: Vec::new() }
    }

    fn finish(self) -> Vec<u8> {
        self.out
    }

    fn write_str_header(&mut self, len: usize) -> Result<()> {
        if len <= 0x1f {
            self.out.push(0xa0 | len as u8);
        } else if len <= u8::MAX as usize {
            self.out.push(0xd9);
            self.out.push(len as u8);
        } else if len <= u16::MAX as usize {
            self.out.push(0xda);
            self.out.write_u16::<BigEndian>(len as u16)?;
        } else {
            self.out.push(0xdb);
            self.out.write_u32::<BigEndian>(len as u32)?;
        }
        Ok(())
    }
}

impl Handler for Writer {
    fn null(&mut self) -> Result<()> {
        self.out.push(0xc0);
        Ok(())
    }

    fn boolean(&mut self, b: bool) -> Result<()> {
        self.out.push(if b { 0xc3 } else { 0xc2 });
        Ok(())
    }

    fn integer(&mut self, i: i64) -> Result<()> {
        if i >= 0 {
            return self.unsigned(i as u64);
        }
        if i >= -32 {
            self.out.push(i as i8 as u8);
        } else if let Ok(v) = i8::try_from(i) {
            self.out.push(0xd0);
            self.out.push(v as u8);
        } else if let Ok(v) = i16::try_from(i) {
            self.out.push(0xd1);
            self.out.write_i16::<BigEndian>(v)?;
        } else if let Ok(v) = i32::try_from(i) {
            self.out.push(0xd2);
            self.out.write_i32::<BigEndian>(v)?;
        } else {
            self.out.push(0xd3);
            self.out.write_i64::<BigEndian>(i)?;
        }
        Ok(())
    }

    fn unsigned(&mut self, u: u64) -> Result<()> {
        if u <= 0x7f {
            self.out.push(u as u8);
        } else if let Ok(v) = u8::try_from(u) {
            self.out.push(0xcc);
            self.out.push(v);
        } else if let Ok(v) = u16::try_from(u) {
            self.out.push(0xcd);
            self.out.write_u16::<BigEndian>(v)?;
        } else if let Ok(v) = u32::try_from(u) {
            self.out.push(0xce);
            self.out.write_u32::<BigEndian>(v)?;
        } else {
            self.out.push(0xcf);
            self.out.write_u64::<BigEndian>(u)?;
        }
        Ok(())
    }

    fn real(&mut self, d: f64) -> Result<()> {
        self.out.push(0xcb);
        self.out.write_f64::<BigEndian>(d)?;
        Ok(())
    }

    fn string(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_str_header(bytes.len())?;
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    fn start_array(&mut self, hint: Option<usize>) -> Result<()> {
        let len = hint.unwrap_or(0);
        if len <= 0x0f {
            self.out.push(0x90 | len as u8);
        } else if len <= u16::MAX as usize {
            self.out.push(0xdc);
            self.out.write_u16::<BigEndian>(len as u16)?;
        } else {
            self.out.push(0xdd);
            self.out.write_u32::<BigEndian>(len as u32)?;
        }
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_object(&mut self, hint: Option<usize>) -> Result<()> {
        let len = hint.unwrap_or(0);
        if len <= 0x0f {
            self.out.push(0x80 | len as u8);
        } else if len <= u16::MAX as usize {
            self.out.push(0xde);
            self.out.write_u16::<BigEndian>(len as u16)?;
        } else {
            self.out.push(0xdf);
            self.out.write_u32::<BigEndian>(len as u32)?;
        }
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        Ok(())
    }

    fn key(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_str_header(bytes.len())?;
        self.out.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widening_parses_to_smallest_fitting_tag() {
        // array of one element: ce 49 96 02 d2 == uint32 1234567890
        let bytes = [0x91, 0xce, 0x49, 0x96, 0x02, 0xd2];
        let v = parse_to_value(&bytes).unwrap();
        let elem = &v.get_array().unwrap()[0];
        assert!(elem.is_int());
        assert_eq!(elem.get_i64().unwrap(), 1_234_567_890);
    }

    #[test]
    fn array32_header_with_widened_element() {
        let bytes = [0xdd, 0x00, 0x00, 0x00, 0x01, 0xce, 0x49, 0x96, 0x02, 0xd2];
        let v = parse_to_value(&bytes).unwrap();
        assert_eq!(v.get_array().unwrap().len(), 1);
        assert_eq!(v.get_array().unwrap()[0].get_i64().unwrap(), 1_234_567_890);
    }

    #[test]
    fn bare_top_level_scalar_is_invalid_document() {
        let bytes = [0x01];
        assert!(parse_to_value(&bytes).is_err());
    }

    #[test]
    fn round_trips_map_and_array() {
        let mut obj = crate::value::Object::new();
        obj.insert("a", Value::Array(vec![Value::Int32(1), Value::Int32(2)]));
        obj.insert("b", Value::String("hi".into()));
        let v = Value::Object(obj);
        let bytes = to_bytes(&v).unwrap();
        let v2 = parse_to_value(&bytes).unwrap();
        assert_eq!(v, v2);
    }

    #[test]
    fn unsupported_type_byte_is_invalid_type() {
        // 0xc1 is reserved/unused in the MessagePack spec.
        let bytes = [0x91, 0xc1];
        assert!(matches!(
            parse_to_value(&bytes).unwrap_err().kind(),
            ErrorKind::InvalidType
        ));
    }
}
