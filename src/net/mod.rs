//! Layered socket abstraction: raw option-setting layer at the bottom,
//! datagram and stream semantics on top of it, TLS wrapping a stream.
//!
//! The layers compose by holding rather than inheriting: [`DatagramSocket`]
//! and [`StreamSocket`] each hold a [`BasicSocket`], and [`TlsSocket`] holds
//! a [`StreamSocket`]. [`SocketIo`] is the common trait generic code (the
//! DNS transports, the `read_exactly`/`write_exactly` helpers) programs
//! against.
pub mod basic_socket;
pub mod datagram_socket;
pub mod option;
pub mod stream_socket;
pub mod tls_socket;

pub use basic_socket::BasicSocket;
pub use datagram_socket::DatagramSocket;
pub use stream_socket::StreamSocket;
pub use tls_socket::TlsSocket;

use crate::error::Result;

/// Common capability of "any socket that can do timed byte I/O": the raw,
/// datagram, stream, and TLS layers all implement it, so helpers like
/// `read_exactly` work uniformly over whichever one a caller holds.
pub trait SocketIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    fn wait_ready_read(&mut self, timeout_ms: u64) -> Result<bool>;
    fn wait_ready_write(&mut self, timeout_ms: u64) -> Result<bool>;
}

/// Read exactly `buf.len()` bytes, restarting on `TemporaryError` after
/// waiting for readability, failing on anything else.
pub fn read_exactly<S: SocketIo>(socket: &mut S, buf: &mut [u8], timeout_ms: u64) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match socket.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(crate::error::Error::new(
                    crate::error::ErrorKind::ConnectionClosed,
                    "peer closed before all bytes were read",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == crate::error::ErrorKind::TemporaryError => {
                socket.wait_ready_read(timeout_ms)?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Write exactly `buf.len()` bytes, restarting on `TemporaryError` after
/// waiting for writability, failing on anything else.
pub fn write_exactly<S: SocketIo>(socket: &mut S, buf: &[u8], timeout_ms: u64) -> Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        match socket.write(&buf[sent..]) {
            Ok(n) => sent += n,
            Err(e) if e.kind() == crate::error::ErrorKind::TemporaryError => {
                socket.wait_ready_write(timeout_ms)?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
