//! DNS wire codec and client: unicast DNS, mDNS, and DNS-over-TLS.
pub mod client;
pub mod packet;
pub mod resolver_conf;
pub mod services;
pub mod transport;
pub mod wire;

pub use client::Client;
pub use packet::{DnsPacket, QuestionRecord, ResourceRecord, Rdata};
pub use transport::{Dns, Dot, Mdns, Transport};
