//! The seam to whatever actually sends queries upstream.
//!
//! Retries, timeouts and server selection belong to the implementation.
//! The validator only calls [`DnsTransport::send`] and passes failures of
//! the primary query straight back to its caller.

use std::sync::Arc;

use async_trait::async_trait;

use crate::dns::DNSPacket;
use crate::error::TransportError;

#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// Send one query and wait for its response
    async fn send(&self, query: DNSPacket) -> Result<DNSPacket, TransportError>;
}

#[async_trait]
impl<T: DnsTransport + ?Sized> DnsTransport for Arc<T> {
    async fn send(&self, query: DNSPacket) -> Result<DNSPacket, TransportError> {
        (**self).send(query).await
    }
}
