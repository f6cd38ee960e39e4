//! TCP stream sockets: connect, three-way handshake completion, and a
//! lingering half-close on disconnect.
use std::time::{Duration, Instant};

use socket2::Domain;

use crate::endpoint::{Endpoint, Protocol};
use crate::error::{Error, ErrorKind, Result};
use crate::net::basic_socket::{BasicSocket, State};
use crate::net::option::SocketOption;
use crate::net::SocketIo;

pub struct StreamSocket<P: Protocol> {
    basic: BasicSocket<P>,
}

impl<P: Protocol> StreamSocket<P> {
    pub fn new() -> Self {
        StreamSocket {
            basic: BasicSocket::new(),
        }
    }

    pub fn state(&self) -> State {
        self.basic.state()
    }

    pub fn bind(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.ensure_open(endpoint)?;
        self.basic.bind(endpoint)
    }

    /// Begin a connect. Non-blocking sockets return immediately with state
    /// `Connecting`; the caller resolves it with [`Self::wait_connected`].
    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.ensure_open(endpoint)?;
        let addr: std::net::SocketAddr = endpoint.try_into()?;
        self.basic.set_state(State::Connecting);
        match self.basic.raw()?.connect(&addr.into()) {
            Ok(()) => {
                self.basic.set_state(State::Connected);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => {
                self.basic.set_state(State::Closed);
                Err(Error::from(e))
            }
        }
    }

    /// Resolve an in-progress connect by waiting for writability then
    /// inspecting `SO_ERROR`.
    pub fn wait_connected(&mut self, timeout_ms: u64) -> Result<()> {
        if self.basic.state() == State::Connected {
            return Ok(());
        }
        self.basic.wait_ready_write(timeout_ms)?;
        match self.basic.raw()?.take_error() {
            Ok(None) => {
                self.basic.set_state(State::Connected);
                Ok(())
            }
            Ok(Some(e)) => {
                self.basic.set_state(State::Closed);
                Err(Error::from(e))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    pub fn set_option(&mut self, opt: SocketOption) -> Result<()> {
        self.basic.set_option(opt)
    }

    /// Half-close in the lingering manner: shut down writes, drain whatever
    /// the peer still has in flight, then shut down reads and close.
    /// A would-block while draining returns `TemporaryError`; the caller
    /// retries via [`Self::wait_disconnected`].
    pub fn disconnect(&mut self) -> Result<()> {
        if self.basic.state() == State::Closed {
            return Ok(());
        }
        self.basic.set_state(State::Disconnecting);
        self.basic
            .raw()?
            .shutdown(std::net::Shutdown::Write)
            .map_err(Error::from)?;

        let mut sink = [0u8; 4096];
        loop {
            match self.basic.read(&mut sink) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::TemporaryError => {
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
        self.basic.close()
    }

    /// Loop [`Self::disconnect`] until it stops returning `TemporaryError`
    /// or `timeout_ms` elapses.
    pub fn wait_disconnected(&mut self, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match self.disconnect() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::TemporaryError => {
                    if Instant::now() >= deadline {
                        return Err(Error::new(ErrorKind::TimedOut, "lingering close timed out"));
                    }
                    self.basic.wait_ready_read(timeout_ms)?;
                }
                Err(e) => return Err(e),
            }
        }
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

    pub(crate) fn basic_mut(&mut self) -> &mut BasicSocket<P> {
        &mut self.basic
    }
}

impl<P: Protocol> Default for StreamSocket<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Protocol> SocketIo for StreamSocket<P> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.basic.read(buf) {
            Ok(0) => {
                self.basic.set_state(State::Disconnected);
                Err(Error::new(ErrorKind::ConnectionClosed, "peer closed the connection"))
            }
            other => other,
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.basic.write(buf)
    }

    fn wait_ready_read(&mut self, timeout_ms: u64) -> Result<bool> {
        self.basic.wait_ready_read(timeout_ms)
    }

    fn wait_ready_write(&mut self, timeout_ms: u64) -> Result<bool> {
        self.basic.wait_ready_write(timeout_ms)
    }
}
