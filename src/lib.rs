pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod transport;

pub use config::ValidatorConfig;
pub use dns::DNSPacket;
pub use dnssec::{SecurityStatus, TrustAnchorSource, TrustAnchorStore, ValidatedResponse, ValidatingResolver};
pub use error::{ConfigError, TransportError};
pub use transport::DnsTransport;
