//! `joinet` — a foundational networking and serialization library.
//!
//! Two tightly-coupled subsystems:
//!
//! - A layered socket stack ([`net`], [`endpoint`], [`reactor`]) running
//!   raw, datagram, stream, and TLS-encrypted sockets over a single-threaded
//!   readiness reactor, plus a [`dns`] client built on top of it.
//! - A dynamically-typed [`value`] tree and a shared [`parser`] event
//!   contract implemented by a JSON and a MessagePack codec.
pub mod dns;
pub mod endpoint;
pub mod error;
pub mod ip_address;
pub mod net;
pub mod parser;
pub mod reactor;
pub mod value;

pub use endpoint::Endpoint;
pub use error::{Error, ErrorKind, Result};
pub use ip_address::{Family, IpAddress};
pub use reactor::{EventHandler, Reactor};
pub use value::Value;
