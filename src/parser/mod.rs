//! Format-agnostic SAX-style parser/writer contract shared by the JSON and
//! MessagePack codecs, and implemented by [`crate::value::ValueBuilder`]
//! to build a `Value` tree out of either one.
pub mod json;
pub mod msgpack;

use crate::error::Result;

/// A sink for a stream of parse events. Every concrete parser (JSON,
/// MessagePack) drives an implementor of this trait; `ValueBuilder` is one
/// such implementor, but a caller can write their own to stream straight
/// into an application type without materializing a `Value` tree.
pub trait Handler {
    fn null(&mut self) -> Result<()>;
    fn boolean(&mut self, b: bool) -> Result<()>;
    fn integer(&mut self, i: i64) -> Result<()>;
    fn unsigned(&mut self, u: u64) -> Result<()>;
    fn real(&mut self, d: f64) -> Result<()>;
    fn string(&mut self, bytes: &[u8]) -> Result<()>;
    fn start_array(&mut self, hint: Option<usize>) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
    fn start_object(&mut self, hint: Option<usize>) -> Result<()>;
    fn end_object(&mut self) -> Result<()>;
    fn key(&mut self, bytes: &[u8]) -> Result<()>;
}
