//! A dynamically-typed value tree, shared by the JSON and MessagePack
//! codecs.
pub mod path;

use std::fmt;

use crate::error::{Error, ErrorKind, Result};
use crate::parser::Handler;

/// Maximum nesting depth of arrays/objects this crate will parse or accept
/// via the mutators below.
pub const MAX_NESTING_DEPTH: usize = 19;

/// An insertion-ordered, duplicate-tolerant-at-parse mapping from string
/// keys to values. A plain `Vec` rather than a map, because parsing must be
/// able to keep every occurrence of a duplicate key while `at`/`[]` expose
/// only the first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object(Vec<(String, Value)>);

impl Object {
    pub fn new() -> Self {
        Object(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert preserving insertion order. Does not overwrite or deduplicate
    /// an existing key — matches "permitting duplicate keys at parse time".
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.push((key.into(), value));
    }

    /// First value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Mutable access to the first value stored under `key`, creating it
    /// (as `Null`) if absent.
    pub fn get_or_insert(&mut self, key: &str) -> &mut Value {
        if let Some(pos) = self.0.iter().position(|(k, _)| k == key) {
            return &mut self.0[pos].1;
        }
        self.0.push((key.to_string(), Value::Null));
        &mut self.0.last_mut().unwrap().1
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn erase(&mut self, key: &str) -> bool {
        if let Some(pos) = self.0.iter().position(|(k, _)| k == key) {
            self.0.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// The tagged-union value. Numeric predicates are range-aware: `is_int`
/// holds for any numeric tag whose stored value fits in a signed 32-bit
/// integer, regardless of which numeric variant actually holds it.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
}

/// Numeric tags compare by mathematical value, not by which tag holds it —
/// serialization is free to widen an int, so a round-tripped `Int32(1)` must
/// still equal the `Uint32(1)` it came back as.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => match (a.as_u64(), b.as_u64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.get_double().ok() == b.get_double().ok(),
                },
            },
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

macro_rules! is_predicate {
    ($name:ident, $check:expr) => {
        pub fn $name(&self) -> bool {
            let f: fn(&Value) -> bool = $check;
            f(self)
        }
    };
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Uint32(_) | Value::Int64(_) | Value::Uint64(_) | Value::Double(_)
        )
    }

    fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int32(v) => Some(v as i64),
            Value::Uint32(v) => Some(v as i64),
            Value::Int64(v) => Some(v),
            Value::Uint64(v) if v <= i64::MAX as u64 => Some(v as i64),
            Value::Double(v) if v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Uint32(v) => Some(v as u64),
            Value::Uint64(v) => Some(v),
            Value::Int32(v) if v >= 0 => Some(v as u64),
            Value::Int64(v) if v >= 0 => Some(v as u64),
            Value::Double(v) if v.fract() == 0.0 && v >= 0.0 => Some(v as u64),
            _ => None,
        }
    }

    is_predicate!(is_int8, |v| v
        .as_i64()
        .map(|n| i8::try_from(n).is_ok())
        .unwrap_or(false));
    is_predicate!(is_uint8, |v| v
        .as_u64()
        .map(|n| u8::try_from(n).is_ok())
        .unwrap_or(false));
    is_predicate!(is_int16, |v| v
        .as_i64()
        .map(|n| i16::try_from(n).is_ok())
        .unwrap_or(false));
    is_predicate!(is_uint16, |v| v
        .as_u64()
        .map(|n| u16::try_from(n).is_ok())
        .unwrap_or(false));
    is_predicate!(is_int, |v| v
        .as_i64()
        .map(|n| i32::try_from(n).is_ok())
        .unwrap_or(false));
    is_predicate!(is_uint, |v| v
        .as_u64()
        .map(|n| u32::try_from(n).is_ok())
        .unwrap_or(false));
    is_predicate!(is_int64, |v| v.as_i64().is_some());
    is_predicate!(is_uint64, |v| v.as_u64().is_some());

    pub fn is_float(&self) -> bool {
        self.get_double()
            .map(|v| v as f32 as f64 == v)
            .unwrap_or(false)
    }

    pub fn is_double(&self) -> bool {
        self.is_number()
    }

    pub fn get_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(bad_cast("bool", self)),
        }
    }

    pub fn get_i32(&self) -> Result<i32> {
        self.as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| bad_cast("i32", self))
    }

    pub fn get_u32(&self) -> Result<u32> {
        self.as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| bad_cast("u32", self))
    }

    pub fn get_i64(&self) -> Result<i64> {
        self.as_i64().ok_or_else(|| bad_cast("i64", self))
    }

    pub fn get_u64(&self) -> Result<u64> {
        self.as_u64().ok_or_else(|| bad_cast("u64", self))
    }

    pub fn get_double(&self) -> Result<f64> {
        match *self {
            Value::Double(v) => Ok(v),
            Value::Int32(v) => Ok(v as f64),
            Value::Uint32(v) => Ok(v as f64),
            Value::Int64(v) => Ok(v as f64),
            Value::Uint64(v) => Ok(v as f64),
            _ => Err(bad_cast("double", self)),
        }
    }

    pub fn get_string(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            _ => Err(bad_cast("string", self)),
        }
    }

    pub fn get_array(&self) -> Result<&[Value]> {
        match self {
            Value::Array(a) => Ok(a.as_slice()),
            _ => Err(bad_cast("array", self)),
        }
    }

    pub fn get_array_mut(&mut self) -> Result<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(bad_cast("array", self)),
        }
    }

    pub fn get_object(&self) -> Result<&Object> {
        match self {
            Value::Object(o) => Ok(o),
            _ => Err(bad_cast("object", self)),
        }
    }

    pub fn get_object_mut(&mut self) -> Result<&mut Object> {
        match self {
            Value::Object(o) => Ok(o),
            _ => Err(bad_cast("object", self)),
        }
    }

    /// Fallible key access; errors if this is not an object or the key is
    /// absent.
    pub fn at(&self, key: &str) -> Result<&Value> {
        self.get_object()?
            .get(key)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no such key: {}", key)))
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Array(a) => a.len(),
            Value::Object(o) => o.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all elements, keeping the container tag (array stays an array,
    /// object stays an object). A no-op on any other tag.
    pub fn clear(&mut self) {
        match self {
            Value::Array(a) => a.clear(),
            Value::Object(o) => o.clear(),
            _ => {}
        }
    }

    /// Reserve capacity for `additional` more elements in an array.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.get_array_mut()?.reserve(additional);
        Ok(())
    }

    /// Append to an array.
    pub fn push_back(&mut self, value: Value) -> Result<()> {
        self.get_array_mut()?.push(value);
        Ok(())
    }

    /// Remove and return an array's last element.
    pub fn pop_back(&mut self) -> Result<Option<Value>> {
        Ok(self.get_array_mut()?.pop())
    }

    /// Swap the full contents of two values of the same container tag.
    pub fn swap(&mut self, other: &mut Value) -> Result<()> {
        match (self.get_array_mut(), other.get_array_mut()) {
            (Ok(a), Ok(b)) => {
                std::mem::swap(a, b);
                return Ok(());
            }
            _ => {}
        }
        let a = self.get_object_mut()?;
        let b = other.get_object_mut()?;
        std::mem::swap(a, b);
        Ok(())
    }

    /// Whether an array has an element at `index`.
    pub fn contains_index(&self, index: usize) -> bool {
        matches!(self, Value::Array(a) if index < a.len())
    }

    /// Walk `self` to build it from a stream of events emitted by `handler`
    /// calls — see [`crate::parser`].
    pub fn builder() -> ValueBuilder {
        ValueBuilder::new()
    }

    /// Emit this value as a stream of events into `handler`.
    pub fn serialize(&self, handler: &mut dyn Handler) -> Result<()> {
        match self {
            Value::Null => handler.null(),
            Value::Bool(b) => handler.boolean(*b),
            Value::Int32(v) => handler.integer(*v as i64),
            Value::Uint32(v) => handler.unsigned(*v as u64),
            Value::Int64(v) => handler.integer(*v),
            Value::Uint64(v) => handler.unsigned(*v),
            Value::Double(v) => handler.real(*v),
            Value::String(s) => handler.string(s.as_bytes()),
            Value::Array(items) => {
                handler.start_array(Some(items.len()))?;
                for item in items {
                    item.serialize(handler)?;
                }
                handler.end_array()
            }
            Value::Object(obj) => {
                handler.start_object(Some(obj.len()))?;
                for (k, v) in obj.iter() {
                    handler.key(k.as_bytes())?;
                    v.serialize(handler)?;
                }
                handler.end_object()
            }
        }
    }
}

impl std::ops::Index<&str> for Value {
    type Output = Value;
    /// Panics on a non-object or a missing key — use [`Value::at`] for a
    /// fallible form.
    fn index(&self, key: &str) -> &Value {
        self.at(key).expect("Value::index: missing key or not an object")
    }
}

impl std::ops::IndexMut<&str> for Value {
    fn index_mut(&mut self, key: &str) -> &mut Value {
        self.get_object_mut()
            .expect("Value::index_mut: not an object")
            .get_or_insert(key)
    }
}

impl std::ops::Index<usize> for Value {
    type Output = Value;
    fn index(&self, i: usize) -> &Value {
        &self.get_array().expect("Value::index: not an array")[i]
    }
}

impl std::ops::IndexMut<usize> for Value {
    fn index_mut(&mut self, i: usize) -> &mut Value {
        &mut self.get_array_mut().expect("Value::index_mut: not an array")[i]
    }
}

fn bad_cast(expected: &str, actual: &Value) -> Error {
    Error::new(
        ErrorKind::InvalidType,
        format!("expected {}, found {:?}", expected, std::mem::discriminant(actual)),
    )
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Uint32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Uint64(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(_) => write!(f, "[array of {} elements]", self.len()),
            Value::Object(_) => write!(f, "{{object of {} members}}", self.len()),
        }
    }
}

/// A [`Handler`] that builds a [`Value`] tree from an event stream. This is
/// what `Value`'s JSON/MessagePack deserialization drives.
pub struct ValueBuilder {
    stack: Vec<Frame>,
    pending_key: Option<String>,
    root: Option<Value>,
}

enum Frame {
    Array(Vec<Value>),
    Object(Object),
}

impl ValueBuilder {
    pub fn new() -> Self {
        ValueBuilder {
            stack: Vec::new(),
            pending_key: None,
            root: None,
        }
    }

    pub fn finish(self) -> Result<Value> {
        self.root
            .ok_or_else(|| Error::new(ErrorKind::InvalidDocument, "no value was built"))
    }

    fn push_value(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Frame::Object(obj)) => {
                let key = self
                    .pending_key
                    .take()
                    .ok_or_else(|| Error::new(ErrorKind::InvalidDocument, "object value without a key"))?;
                obj.insert(key, value);
                Ok(())
            }
            None => {
                if self.root.is_some() {
                    return Err(Error::new(ErrorKind::ExtraData, "multiple top-level values"));
                }
                self.root = Some(value);
                Ok(())
            }
        }
    }
}

impl Default for ValueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for ValueBuilder {
    fn null(&mut self) -> Result<()> {
        self.push_value(Value::Null)
    }

    fn boolean(&mut self, b: bool) -> Result<()> {
        self.push_value(Value::Bool(b))
    }

    fn integer(&mut self, i: i64) -> Result<()> {
        self.push_value(i32::try_from(i).map(Value::Int32).unwrap_or(Value::Int64(i)))
    }

    fn unsigned(&mut self, u: u64) -> Result<()> {
        self.push_value(u32::try_from(u).map(Value::Uint32).unwrap_or(Value::Uint64(u)))
    }

    fn real(&mut self, d: f64) -> Result<()> {
        self.push_value(Value::Double(d))
    }

    fn string(&mut self, bytes: &[u8]) -> Result<()> {
        let s = String::from_utf8(bytes.to_vec())?;
        self.push_value(Value::String(s))
    }

    fn start_array(&mut self, hint: Option<usize>) -> Result<()> {
        if self.stack.len() >= MAX_NESTING_DEPTH {
            return Err(Error::new(ErrorKind::NestingTooDeep, "array nesting exceeds limit"));
        }
        self.stack.push(Frame::Array(Vec::with_capacity(hint.unwrap_or(0))));
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.push_value(Value::Array(items)),
            _ => Err(Error::new(ErrorKind::InvalidDocument, "end_array without start_array")),
        }
    }

    fn start_object(&mut self, _hint: Option<usize>) -> Result<()> {
        if self.stack.len() >= MAX_NESTING_DEPTH {
            return Err(Error::new(ErrorKind::NestingTooDeep, "object nesting exceeds limit"));
        }
        self.stack.push(Frame::Object(Object::new()));
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Object(obj)) => self.push_value(Value::Object(obj)),
            _ => Err(Error::new(ErrorKind::InvalidDocument, "end_object without start_object")),
        }
    }

    fn key(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending_key = Some(String::from_utf8(bytes.to_vec())?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_aware_predicates() {
        let v = Value::Int64(12);
        assert!(v.is_int8());
        assert!(v.is_uint8());
        assert!(v.is_int());
        assert!(v.is_uint());
    }

    #[test]
    fn negative_value_is_not_unsigned() {
        let v = Value::Int32(-1);
        assert!(!v.is_uint());
        assert!(v.is_int8());
    }

    #[test]
    fn object_preserves_duplicate_keys_but_at_returns_first() {
        let mut obj = Object::new();
        obj.insert("a", Value::Int32(1));
        obj.insert("a", Value::Int32(2));
        assert_eq!(obj.len(), 2);
        assert_eq!(obj.get("a"), Some(&Value::Int32(1)));
    }

    #[test]
    fn index_mut_creates_missing_keys() {
        let mut v = Value::Object(Object::new());
        v["x"] = Value::Int32(42);
        assert_eq!(v.at("x").unwrap(), &Value::Int32(42));
    }

    #[test]
    fn is_float_checks_f32_representability_for_every_numeric_tag() {
        assert!(Value::Int32(12).is_float());
        assert!(!Value::Int64(1_234_567_891_011).is_float());
        assert!(Value::Double(1.5).is_float());
        assert!(!Value::Double(0.1).is_float());
    }

    #[test]
    fn builder_rejects_excess_nesting() {
        let mut builder = ValueBuilder::new();
        for _ in 0..=MAX_NESTING_DEPTH {
            builder.start_array(None).ok();
        }
        let err = builder.start_array(None);
        assert!(err.is_err());
    }
}
