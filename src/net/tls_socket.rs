//! TLS 1.2/1.3 state machine wrapping a [`StreamSocket`].
//!
//! Wraps a raw stream with a `rustls` connection the way
//! `deno_tls`'s client/server session wrappers do, but replaces the
//! default verifier with the depth/SAN/CRL/OCSP sequence this crate's
//! [`TlsContext`] specifies rather than relying on `rustls`'s own.
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ClientConnection, RootCertStore, ServerName};

use crate::endpoint::{Endpoint, Tcp};
use crate::error::{Error, ErrorKind, Result};
use crate::net::stream_socket::StreamSocket;
use crate::net::SocketIo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsState {
    NonEncrypted,
    Encrypted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Client,
    Server,
}

type CrlChecker = Arc<dyn Fn(&Certificate) -> bool + Send + Sync>;
type OcspChecker = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Process-wide-shareable TLS configuration: roots, verify depth, ciphers.
/// Treated as read-only once sockets start using it; the caller is
/// responsible for not mutating it concurrently with in-flight handshakes.
pub struct TlsContext {
    pub(crate) roots: RootCertStore,
    pub(crate) max_depth: i32,
    pub(crate) verify: bool,
    pub(crate) crl_checker: Option<CrlChecker>,
    pub(crate) ocsp_checker: Option<OcspChecker>,
}

impl TlsContext {
    /// TLSv1.2+, verification on, unlimited chain depth, no CRL/OCSP
    /// checking configured.
    pub fn default_context() -> Self {
        TlsContext {
            roots: RootCertStore::empty(),
            max_depth: -1,
            verify: true,
            crl_checker: None,
            ocsp_checker: None,
        }
    }

    pub fn set_ca_certificate(&mut self, der_certs: Vec<Certificate>) -> Result<()> {
        for cert in der_certs {
            self.roots
                .add(&cert)
                .map_err(|e| Error::new(ErrorKind::InvalidParam, e.to_string()))?;
        }
        Ok(())
    }

    pub fn set_verify(&mut self, enable: bool, depth: i32) {
        self.verify = enable;
        self.max_depth = depth;
    }

    /// Reserved hook: CRL checking is not implemented, but must remain
    /// configurable.
    pub fn set_crl_checker(&mut self, f: impl Fn(&Certificate) -> bool + Send + Sync + 'static) {
        self.crl_checker = Some(Arc::new(f));
    }

    /// Reserved hook: OCSP checking is not implemented, but must remain
    /// configurable.
    pub fn set_ocsp_checker(&mut self, f: impl Fn(&[u8]) -> bool + Send + Sync + 'static) {
        self.ocsp_checker = Some(Arc::new(f));
    }
}

impl Default for TlsContext {
    fn default() -> Self {
        Self::default_context()
    }
}

/// Verifier implementing the depth check + leaf SAN glob match + reserved
/// CRL/OCSP hooks, in place of `rustls`'s own `WebPkiVerifier`.
struct DepthAndSanVerifier {
    roots: RootCertStore,
    max_depth: i32,
    crl_checker: Option<CrlChecker>,
    ocsp_checker: Option<OcspChecker>,
}

impl ServerCertVerifier for DepthAndSanVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if self.max_depth >= 0 && intermediates.len() as i32 > self.max_depth {
            return Err(rustls::Error::General(
                "certificate chain exceeds configured depth".into(),
            ));
        }

        if let Some(checker) = &self.crl_checker {
            if !checker(end_entity) {
                return Err(rustls::Error::General("certificate revoked (CRL)".into()));
            }
        }
        if let Some(checker) = &self.ocsp_checker {
            if !checker(_ocsp_response) {
                return Err(rustls::Error::General("certificate revoked (OCSP)".into()));
            }
        }

        // webpki's own verification performs the leaf SAN glob match (RFC
        // 6125) against `server_name` as part of path building.
        let webpki_verifier = rustls::client::WebPkiVerifier::new(self.roots.clone(), None);
        webpki_verifier.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            _scts,
            _ocsp_response,
            _now,
        )?;
        Ok(ServerCertVerified::assertion())
    }
}

pub struct TlsSocket {
    stream: StreamSocket<Tcp>,
    context: Arc<Mutex<TlsContext>>,
    conn: Option<ClientConnection>,
    mode: TlsMode,
    state: TlsState,
}

impl TlsSocket {
    pub fn new(context: Arc<Mutex<TlsContext>>) -> Self {
        TlsSocket {
            stream: StreamSocket::new(),
            context,
            conn: None,
            mode: TlsMode::Client,
            state: TlsState::NonEncrypted,
        }
    }

    pub fn state(&self) -> TlsState {
        self.state
    }

    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.stream.connect(endpoint)
    }

    /// `connect` followed by `start_encryption`.
    pub fn connect_encrypted(&mut self, endpoint: &Endpoint, server_name: &str) -> Result<()> {
        self.connect(endpoint)?;
        self.stream.wait_connected(5_000)?;
        self.start_encryption(server_name)
    }

    /// Allocate a handle and perform one handshake step. Returns `Ok(())`
    /// once complete, `TemporaryError` if more data is needed.
    pub fn start_encryption(&mut self, server_name: &str) -> Result<()> {
        if self.conn.is_none() {
            let ctx = self.context.lock().unwrap();
            let verifier = Arc::new(DepthAndSanVerifier {
                roots: ctx.roots.clone(),
                max_depth: ctx.max_depth,
                crl_checker: ctx.crl_checker.clone(),
                ocsp_checker: ctx.ocsp_checker.clone(),
            });
            let config = ClientConfig::builder()
                .with_safe_defaults()
                .with_custom_certificate_verifier(verifier)
                .with_no_client_auth();
            let name = ServerName::try_from(server_name)
                .map_err(|_| Error::new(ErrorKind::InvalidParam, "invalid server name"))?;
            let conn = ClientConnection::new(Arc::new(config), name)
                .map_err(|e| Error::new(ErrorKind::TlsProtocolError, e.to_string()))?;
            self.conn = Some(conn);
        }
        self.drive_handshake()
    }

    /// Drive the handshake to completion or `timeout_ms`, alternating wait
    /// and step.
    pub fn wait_encrypted(&mut self, timeout_ms: u64) -> Result<()> {
        loop {
            match self.drive_handshake() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::TemporaryError => {
                    self.stream.wait_ready_read(timeout_ms)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn drive_handshake(&mut self) -> Result<()> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::OperationFailed, "TLS handle not allocated"))?;

        if !conn.is_handshaking() {
            self.state = TlsState::Encrypted;
            return Ok(());
        }

        if conn.wants_write() {
            conn.write_tls(&mut WriteAdapter(&mut self.stream))
                .map_err(Error::from)?;
        }
        if conn.wants_read() {
            let n = conn
                .read_tls(&mut ReadAdapter(&mut self.stream))
                .map_err(Error::from)?;
            if n == 0 {
                return Err(Error::new(ErrorKind::ConnectionClosed, "peer closed during handshake"));
            }
            conn.process_new_packets().map_err(Error::from)?;
        }

        if conn.is_handshaking() {
            Err(Error::new(ErrorKind::TemporaryError, "handshake in progress"))
        } else {
            self.state = TlsState::Encrypted;
            Ok(())
        }
    }

    /// Plaintext bytes already decrypted and buffered, not the socket's
    /// kernel receive buffer.
    pub fn can_read(&mut self) -> Result<usize> {
        match (&mut self.conn, self.state) {
            (Some(conn), TlsState::Encrypted) => Ok(conn.reader().plaintext_bytes_to_read()),
            _ => Ok(0),
        }
    }

    /// Send close-notify, then perform the underlying lingering close.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state == TlsState::Encrypted {
            if let Some(conn) = &mut self.conn {
                conn.send_close_notify();
                let _ = conn.write_tls(&mut WriteAdapter(&mut self.stream));
            }
            self.state = TlsState::NonEncrypted;
        }
        self.stream.disconnect()
    }
}

impl SocketIo for TlsSocket {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.state != TlsState::Encrypted {
            return self.stream.read(buf);
        }
        loop {
            let conn = self.conn.as_mut().unwrap();
            match conn.reader().read(buf) {
                Ok(0) => {
                    let n = conn
                        .read_tls(&mut ReadAdapter(&mut self.stream))
                        .map_err(Error::from)?;
                    if n == 0 {
                        return Err(Error::new(ErrorKind::ConnectionClosed, "peer closed"));
                    }
                    match conn.process_new_packets() {
                        Ok(_) => continue,
                        Err(rustls::Error::AlertReceived(rustls::AlertDescription::CloseNotify)) => {
                            self.state = TlsState::NonEncrypted;
                            return Err(Error::new(
                                ErrorKind::TlsCloseNotifyAlert,
                                "peer sent close-notify",
                            ));
                        }
                        Err(e) => return Err(Error::from(e)),
                    }
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(Error::new(ErrorKind::TemporaryError, "no plaintext buffered"))
                }
                Err(e) => return Err(Error::from(e)),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.state != TlsState::Encrypted {
            return self.stream.write(buf);
        }
        let conn = self.conn.as_mut().unwrap();
        let n = conn.writer().write(buf).map_err(Error::from)?;
        conn.write_tls(&mut WriteAdapter(&mut self.stream))
            .map_err(Error::from)?;
        Ok(n)
    }

    fn wait_ready_read(&mut self, timeout_ms: u64) -> Result<bool> {
        self.stream.wait_ready_read(timeout_ms)
    }

    fn wait_ready_write(&mut self, timeout_ms: u64) -> Result<bool> {
        self.stream.wait_ready_write(timeout_ms)
    }
}

/// Adapts the `StreamSocket`'s `Result`-based I/O to `rustls`'s
/// `std::io::Read`/`Write` expectations, translating `TemporaryError` back
/// into `WouldBlock` so `rustls`'s own would-block handling keeps working.
struct ReadAdapter<'a>(&'a mut StreamSocket<Tcp>);
impl Read for ReadAdapter<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf).map_err(to_io_error)
    }
}

struct WriteAdapter<'a>(&'a mut StreamSocket<Tcp>);
impl Write for WriteAdapter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf).map_err(to_io_error)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn to_io_error(e: Error) -> std::io::Error {
    if e.kind() == ErrorKind::TemporaryError {
        std::io::Error::new(std::io::ErrorKind::WouldBlock, e.to_string())
    } else {
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    }
}
