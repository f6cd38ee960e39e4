//! Strict RFC 8259 JSON parser and writer over the shared [`Handler`]
//! event contract.
use crate::error::{Error, ErrorKind, Result};
use crate::parser::Handler;
use crate::value::{Value, ValueBuilder};

/// Parse a single top-level JSON value, driving `handler` as it goes.
/// Trailing non-whitespace after the value is `ExtraData`.
pub fn parse(input: &str, handler: &mut dyn Handler) -> Result<()> {
    let bytes = input.as_bytes();
    let mut pos = 0usize;
    skip_ws(bytes, &mut pos);
    parse_value(bytes, &mut pos, handler, 0)?;
    skip_ws(bytes, &mut pos);
    if pos != bytes.len() {
        return Err(Error::new(ErrorKind::ExtraData, format!("trailing data at byte {}", pos)));
    }
    Ok(())
}

/// Parse `input` directly into a [`Value`] tree.
pub fn parse_to_value(input: &str) -> Result<Value> {
    let mut builder = ValueBuilder::new();
    parse(input, &mut builder)?;
    builder.finish()
}

/// Serialize `value` to a compact JSON string.
pub fn to_string(value: &Value) -> Result<String> {
    let mut writer = Writer::new();
    value.serialize(&mut writer)?;
    Ok(writer.finish())
}

fn skip_ws(bytes: &[u8], pos: &mut usize) {
    while *pos < bytes.len() && matches!(bytes[*pos], b' ' | b'\t' | b'\n' | b'\r') {
        *pos += 1;
    }
}

fn peek(bytes: &[u8], pos: usize) -> Result<u8> {
    bytes
        .get(pos)
        .copied()
        .ok_or_else(|| Error::new(ErrorKind::InvalidDocument, "unexpected end of input"))
}

fn parse_value(bytes: &[u8], pos: &mut usize, handler: &mut dyn Handler, depth: usize) -> Result<()> {
    if depth > crate::value::MAX_NESTING_DEPTH {
        return Err(Error::new(ErrorKind::NestingTooDeep, "JSON nesting exceeds limit"));
    }
    skip_ws(bytes, pos);
    match peek(bytes, *pos)? {
        b'{' => parse_object(bytes, pos, handler, depth),
        b'[' => parse_array(bytes, pos, handler, depth),
        b'"' => {
            let s = parse_string(bytes, pos)?;
            handler.string(&s)
        }
        b't' => expect_literal(bytes, pos, b"true").and_then(|_| handler.boolean(true)),
        b'f' => expect_literal(bytes, pos, b"false").and_then(|_| handler.boolean(false)),
        b'n' => expect_literal(bytes, pos, b"null").and_then(|_| handler.null()),
        b'-' | b'0'..=b'9' => parse_number(bytes, pos, handler),
        other => Err(Error::new(
            ErrorKind::InvalidDocument,
            format!("unexpected byte {:#04x} at {}", other, *pos),
        )),
    }
}

fn expect_literal(bytes: &[u8], pos: &mut usize, literal: &[u8]) -> Result<()> {
    if bytes.len() >= *pos + literal.len() && &bytes[*pos..*pos + literal.len()] == literal {
        *pos += literal.len();
        Ok(())
    } else {
        Err(Error::new(ErrorKind::InvalidDocument, "invalid literal"))
    }
}

fn parse_object(bytes: &[u8], pos: &mut usize, handler: &mut dyn Handler, depth: usize) -> Result<()> {
    *pos += 1; // '{'
    handler.start_object(None)?;
    skip_ws(bytes, pos);
    if peek(bytes, *pos)? == b'}' {
        *pos += 1;
        return handler.end_object();
    }
    loop {
        skip_ws(bytes, pos);
        if peek(bytes, *pos)? != b'"' {
            return Err(Error::new(ErrorKind::InvalidDocument, "expected object key"));
        }
        let key = parse_string(bytes, pos)?;
        handler.key(&key)?;
        skip_ws(bytes, pos);
        if peek(bytes, *pos)? != b':' {
            return Err(Error::new(ErrorKind::InvalidDocument, "expected ':' after key"));
        }
        *pos += 1;
        parse_value(bytes, pos, handler, depth + 1)?;
        skip_ws(bytes, pos);
        match peek(bytes, *pos)? {
            b',' => {
                *pos += 1;
            }
            b'}' => {
                *pos += 1;
                return handler.end_object();
            }
            _ => return Err(Error::new(ErrorKind::InvalidDocument, "expected ',' or '}'")),
        }
    }
}

fn parse_array(bytes: &[u8], pos: &mut usize, handler: &mut dyn Handler, depth: usize) -> Result<()> {
    *pos += 1; // '['
    handler.start_array(None)?;
    skip_ws(bytes, pos);
    if peek(bytes, *pos)? == b']' {
        *pos += 1;
        return handler.end_array();
    }
    loop {
        parse_value(bytes, pos, handler, depth + 1)?;
        skip_ws(bytes, pos);
        match peek(bytes, *pos)? {
            b',' => {
                *pos += 1;
            }
            b']' => {
                *pos += 1;
                return handler.end_array();
            }
            _ => return Err(Error::new(ErrorKind::InvalidDocument, "expected ',' or ']'")),
        }
    }
}

fn parse_string(bytes: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    *pos += 1; // opening quote
    let mut out = Vec::new();
    loop {
        let b = peek(bytes, *pos)?;
        *pos += 1;
        match b {
            b'"' => return Ok(out),
            b'\\' => {
                let esc = peek(bytes, *pos)?;
                *pos += 1;
                match esc {
                    b'"' => out.push(b'"'),
                    b'\\' => out.push(b'\\'),
                    b'/' => out.push(b'/'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'u' => {
                        let cp = parse_hex4(bytes, pos)?;
                        let ch = if (0xd800..=0xdbff).contains(&cp) {
                            if peek(bytes, *pos)? == b'\\' && peek(bytes, *pos + 1)? == b'u' {
                                *pos += 2;
                                let low = parse_hex4(bytes, pos)?;
                                let combined =
                                    0x10000 + ((cp - 0xd800) << 10) + (low - 0xdc00);
                                char::from_u32(combined)
                            } else {
                                return Err(Error::new(ErrorKind::InvalidDocument, "unpaired surrogate"));
                            }
                        } else {
                            char::from_u32(cp as u32)
                        };
                        let ch = ch.ok_or_else(|| {
                            Error::new(ErrorKind::InvalidDocument, "invalid unicode escape")
                        })?;
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                    }
                    other => {
                        return Err(Error::new(
                            ErrorKind::InvalidDocument,
                            format!("invalid escape \\{}", other as char),
                        ))
                    }
                }
            }
            other => out.push(other),
        }
    }
}

fn parse_hex4(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    if *pos + 4 > bytes.len() {
        return Err(Error::new(ErrorKind::InvalidDocument, "truncated \\u escape"));
    }
    let s = std::str::from_utf8(&bytes[*pos..*pos + 4])?;
    let v = u32::from_str_radix(s, 16)
        .map_err(|_| Error::new(ErrorKind::InvalidDocument, "invalid \\u escape"))?;
    *pos += 4;
    Ok(v)
}

fn parse_number(bytes: &[u8], pos: &mut usize, handler: &mut dyn Handler) -> Result<()> {
    let start = *pos;
    if peek(bytes, *pos)? == b'-' {
        *pos += 1;
    }
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    let mut is_float = false;
    if *pos < bytes.len() && bytes[*pos] == b'.' {
        is_float = true;
        *pos += 1;
        while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
    }
    if *pos < bytes.len() && matches!(bytes[*pos], b'e' | b'E') {
        is_float = true;
        *pos += 1;
        if *pos < bytes.len() && matches!(bytes[*pos], b'+' | b'-') {
            *pos += 1;
        }
        while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
    }
    let text = std::str::from_utf8(&bytes[start..*pos])?;
    if is_float {
        let v: f64 = text
            .parse()
            .map_err(|_| Error::new(ErrorKind::InvalidDocument, "invalid number"))?;
        handler.real(v)
    } else if let Some(stripped) = text.strip_prefix('-') {
        let v: i64 = format!("-{}", stripped)
            .parse()
            .map_err(|_| Error::new(ErrorKind::InvalidDocument, "invalid integer"))?;
        handler.integer(v)
    } else {
        let v: u64 = text
            .parse()
            .map_err(|_| Error::new(ErrorKind::InvalidDocument, "invalid integer"))?;
        handler.unsigned(v)
    }
}

/// A [`Handler`] that accumulates compact JSON text.
struct Writer {
    out: String,
    need_comma: Vec<bool>,
}

impl Writer {
    fn new() -> Self {
        Writer {
            out: String::new(),
            need_comma: Vec::new(),
        }
    }

    fn finish(self) -> String {
        self.out
    }

    fn before_value(&mut self) {
        if let Some(need) = self.need_comma.last_mut() {
            if *need {
                self.out.push(',');
            }
            *need = true;
        }
    }

    /// `bytes` must be valid UTF-8 (guaranteed for a [`Value::String`], since
    /// it is built from a Rust `String`); multi-byte sequences are escaped by
    /// full `char`, not by individual byte, or a 2+-byte-wide codepoint would
    /// come out mangled into several bogus Latin-1 codepoints.
    fn escape_into(&mut self, bytes: &[u8]) -> Result<()> {
        let s = std::str::from_utf8(bytes)?;
        self.out.push('"');
        for ch in s.chars() {
            match ch {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\u{8}' => self.out.push_str("\\b"),
                '\u{c}' => self.out.push_str("\\f"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if (c as u32) < 0x20 => self.out.push_str(&format!("\\u{:04x}", c as u32)),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
        Ok(())
    }
}

impl Handler for Writer {
    fn null(&mut self) -> Result<()> {
        self.before_value();
        self.out.push_str("null");
        Ok(())
    }

    fn boolean(&mut self, b: bool) -> Result<()> {
        self.before_value();
        self.out.push_str(if b { "true" } else { "false" });
        Ok(())
    }

    fn integer(&mut self, i: i64) -> Result<()> {
        self.before_value();
        self.out.push_str(&i.to_string());
        Ok(())
    }

    fn unsigned(&mut self, u: u64) -> Result<()> {
        self.before_value();
        self.out.push_str(&u.to_string());
        Ok(())
    }

    fn real(&mut self, d: f64) -> Result<()> {
        self.before_value();
        self.out.push_str(&d.to_string());
        Ok(())
    }

    fn string(&mut self, bytes: &[u8]) -> Result<()> {
        self.before_value();
        self.escape_into(bytes)
    }

    fn start_array(&mut self, _hint: Option<usize>) -> Result<()> {
        self.before_value();
        self.out.push('[');
        self.need_comma.push(false);
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        self.need_comma.pop();
        self.out.push(']');
        Ok(())
    }

    fn start_object(&mut self, _hint: Option<usize>) -> Result<()> {
        self.before_value();
        self.out.push('{');
        self.need_comma.push(false);
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        self.need_comma.pop();
        self.out.push('}');
        Ok(())
    }

    fn key(&mut self, bytes: &[u8]) -> Result<()> {
        self.before_value();
        self.escape_into(bytes)?;
        self.out.push(':');
        // the key itself counted as a value for comma purposes; the
        // following value must not add another comma.
        *self.need_comma.last_mut().unwrap() = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_document() {
        let v = parse_to_value(r#"{"a":1,"b":[true,null,"x"],"c":-0}"#).unwrap();
        assert_eq!(v.at("a").unwrap().get_i64().unwrap(), 1);
        assert_eq!(v.at("b").unwrap().get_array().unwrap().len(), 3);
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(parse_to_value("1 2").is_err());
    }

    #[test]
    fn rejects_invalid_escape() {
        assert!(parse_to_value(r#""\x""#).is_err());
    }

    #[test]
    fn round_trips_through_writer() {
        let v = parse_to_value(r#"{"k":[1,2.5,"s"]}"#).unwrap();
        let text = to_string(&v).unwrap();
        let v2 = parse_to_value(&text).unwrap();
        assert_eq!(v, v2);
    }

    #[test]
    fn surrogate_pairs_combine() {
        let v = parse_to_value(r#""😀""#).unwrap();
        assert_eq!(v.get_string().unwrap(), "\u{1f600}");
    }

    #[test]
    fn writer_round_trips_multibyte_utf8() {
        let v = Value::String("caf\u{e9} \u{1f600} \u{4e2d}\u{6587}".into());
        let text = to_string(&v).unwrap();
        assert_eq!(parse_to_value(&text).unwrap(), v);
    }
}
