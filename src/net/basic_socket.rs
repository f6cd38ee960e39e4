//! The raw option-setting layer underneath [`super::DatagramSocket`] and
//! [`super::StreamSocket`].
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use socket2::{Domain, SockAddr, Socket};

use crate::endpoint::{Endpoint, Protocol};
use crate::error::{Error, ErrorKind, Result};
use crate::net::option::{self, SocketOption};

/// Lifecycle state shared by every layer of the socket stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// The raw open/bind/close/option layer, parameterized by a [`Protocol`]
/// marker supplying the address-family-independent socket type/protocol.
pub struct BasicSocket<P: Protocol> {
    inner: Option<Socket>,
    state: State,
    _protocol: PhantomData<P>,
}

impl<P: Protocol> BasicSocket<P> {
    pub fn new() -> Self {
        BasicSocket {
            inner: None,
            state: State::Closed,
            _protocol: PhantomData,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Open the underlying socket. Fails with `InUse` unless the socket is
    /// currently `Closed`.
    pub fn open(&mut self, domain: Domain) -> Result<()> {
        if self.state != State::Closed {
            return Err(Error::new(ErrorKind::InUse, "socket is already open"));
        }
        let sock = Socket::new(domain, P::socket_type(), P::protocol(domain))
            .map_err(|e| Error::new(ErrorKind::OperationFailed, e.to_string()))?;
        if domain == Domain::IPV6 {
            // accept v4-mapped traffic too.
            let _ = sock.set_only_v6(false);
        }
        self.inner = Some(sock);
        self.state = State::Disconnected;
        Ok(())
    }

    /// Bind to `endpoint`. Implicitly sets `SO_REUSEADDR` for IP endpoints.
    pub fn bind(&mut self, endpoint: &Endpoint) -> Result<()> {
        let sock = self.require_socket()?;
        match endpoint {
            Endpoint::Ip(_, _) => {
                sock.set_reuse_address(true)
                    .map_err(|e| Error::new(ErrorKind::OperationFailed, e.to_string()))?;
                let addr: SocketAddr = endpoint.try_into()?;
                sock.bind(&SockAddr::from(addr))
                    .map_err(|e| Error::new(ErrorKind::OperationFailed, e.to_string()))
            }
            Endpoint::Unix(path) => {
                let _ = std::fs::remove_file(path);
                sock.bind(&SockAddr::unix(path).map_err(Error::from)?)
                    .map_err(Error::from)
            }
        }
    }

    pub fn set_mode(&mut self, blocking: bool) -> Result<()> {
        self.require_socket()?
            .set_nonblocking(!blocking)
            .map_err(Error::from)
    }

    pub fn set_option(&mut self, opt: SocketOption) -> Result<()> {
        option::apply(self.require_socket()?, opt)
    }

    pub fn local_endpoint(&self) -> Result<Endpoint> {
        let addr = self
            .require_socket()?
            .local_addr()
            .map_err(Error::from)?
            .as_socket()
            .ok_or_else(|| Error::new(ErrorKind::OperationFailed, "not an IP socket address"))?;
        Ok(Endpoint::from(addr))
    }

    /// Bytes immediately available to read without blocking, via a
    /// zero-copy peek.
    pub fn can_read(&self) -> Result<usize> {
        let sock = self.require_socket()?;
        let mut probe = [0u8; 2048];
        match sock.peek(&mut probe) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(Error::from(e)),
        }
    }

    /// Poll readability (`timeout_ms == 0`) or wait up to `timeout_ms`.
    pub fn wait_ready_read(&self, timeout_ms: u64) -> Result<bool> {
        self.wait_ready(timeout_ms, true)
    }

    pub fn wait_ready_write(&self, timeout_ms: u64) -> Result<bool> {
        self.wait_ready(timeout_ms, false)
    }

    fn wait_ready(&self, timeout_ms: u64, read: bool) -> Result<bool> {
        let sock = self.require_socket()?;
        let mut poll = mio::Poll::new().map_err(Error::from)?;
        let mut source = mio::unix::SourceFd(&sock.as_raw_fd());
        let interest = if read {
            mio::Interest::READABLE
        } else {
            mio::Interest::WRITABLE
        };
        poll.registry()
            .register(&mut source, mio::Token(0), interest)
            .map_err(Error::from)?;
        let mut events = mio::Events::with_capacity(1);
        let timeout = if timeout_ms == 0 {
            Some(Duration::from_millis(0))
        } else {
            Some(Duration::from_millis(timeout_ms))
        };
        poll.poll(&mut events, timeout).map_err(Error::from)?;
        if events.is_empty() {
            return Err(Error::new(ErrorKind::TimedOut, "readiness wait timed out"));
        }
        Ok(true)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        use std::io::Read;
        (&mut &*self.require_socket()?).read(buf).map_err(Error::from)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        use std::io::Write;
        (&mut &*self.require_socket()?).write(buf).map_err(Error::from)
    }

    pub fn close(&mut self) -> Result<()> {
        self.inner = None;
        self.state = State::Closed;
        Ok(())
    }

    pub fn handle(&self) -> Result<RawFd> {
        Ok(self.require_socket()?.as_raw_fd())
    }

    pub(crate) fn raw(&self) -> Result<&Socket> {
        self.require_socket()
    }

    pub(crate) fn raw_mut(&mut self) -> Result<&mut Socket> {
        self.inner
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::OperationFailed, "socket is not open"))
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
    }

    fn require_socket(&self) -> Result<&Socket> {
        self.inner
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::OperationFailed, "socket is not open"))
    }
}

impl<P: Protocol> Default for BasicSocket<P> {
    fn default() -> Self {
        Self::new()
    }
}
