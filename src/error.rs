//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Call sites
//! written in a polling style (check-then-read-the-error) can instead read
//! [`last_error`] after a call, which mirrors the most recent `Err` on the
//! current thread.
use std::cell::Cell;
use std::fmt;
use std::io;
use std::str;

use thiserror::Error as ThisError;

/// The full error taxonomy surfaced by this crate.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("resource already in use")]
    InUse,
    #[error("invalid parameter")]
    InvalidParam,
    #[error("operation failed")]
    OperationFailed,
    #[error("permission denied")]
    PermissionDenied,
    #[error("operation timed out")]
    TimedOut,
    #[error("not found")]
    NotFound,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("operation would block, retry")]
    TemporaryError,
    #[error("unknown error")]
    UnknownError,
    #[error("TLS close-notify alert received")]
    TlsCloseNotifyAlert,
    #[error("TLS protocol error")]
    TlsProtocolError,
    #[error("extra data after document")]
    ExtraData,
    #[error("nesting too deep")]
    NestingTooDeep,
    #[error("invalid type for this accessor")]
    InvalidType,
    #[error("invalid document")]
    InvalidDocument,
}

/// A crate error: an [`ErrorKind`] plus a human-readable context string.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        set_last_error(kind);
        Error {
            kind,
            context: context.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.context)
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::WouldBlock => ErrorKind::TemporaryError,
            io::ErrorKind::TimedOut => ErrorKind::TimedOut,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                ErrorKind::ConnectionClosed
            }
            io::ErrorKind::AddrInUse => ErrorKind::InUse,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorKind::InvalidParam,
            _ => ErrorKind::OperationFailed,
        };
        Error::new(kind, e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::new(ErrorKind::InvalidDocument, e.to_string())
    }
}

impl From<str::Utf8Error> for Error {
    fn from(e: str::Utf8Error) -> Self {
        Error::new(ErrorKind::InvalidDocument, e.to_string())
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        use rustls::Error as RE;
        let kind = match e {
            RE::AlertReceived(rustls::AlertDescription::CloseNotify) => {
                ErrorKind::TlsCloseNotifyAlert
            }
            _ => ErrorKind::TlsProtocolError,
        };
        Error::new(kind, e.to_string())
    }
}

/// A specific custom `Result` for all functions in this crate.
pub type Result<T> = std::result::Result<T, Error>;

thread_local! {
    static LAST_ERROR: Cell<Option<ErrorKind>> = Cell::new(None);
}

/// Record `kind` as the current thread's last error. Called internally right
/// before a fallible operation returns `Err`.
pub(crate) fn set_last_error(kind: ErrorKind) {
    LAST_ERROR.with(|cell| cell.set(Some(kind)));
}

/// The most recent error kind recorded on this thread, if any.
///
/// ```
/// use joinet::error::last_error;
/// assert_eq!(last_error(), None);
/// ```
pub fn last_error() -> Option<ErrorKind> {
    LAST_ERROR.with(|cell| cell.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructing_an_error_updates_the_thread_local_last_error() {
        let _ = Error::new(ErrorKind::TimedOut, "probe");
        assert_eq!(last_error(), Some(ErrorKind::TimedOut));
        let _ = Error::new(ErrorKind::NotFound, "probe");
        assert_eq!(last_error(), Some(ErrorKind::NotFound));
    }
}
