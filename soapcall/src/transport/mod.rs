//! Transport seam: addresses, transport identifiers, and the traits the
//! engine calls through.
//!
//! Concrete transports (HTTP, TCP, mail, ...) live outside this crate. The
//! engine only needs "send bytes, maybe get bytes back" from a sender and
//! "start/stop something that will deliver bytes later" from a listener.

pub mod registry;
pub mod selector;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::correlation::RequestId;
use crate::error::ClientError;

/// A destination or bound location, URI-shaped (`scheme://rest`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Wrap a URI-shaped address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The scheme portion, when the address has one.
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once("://").map(|(scheme, _)| scheme)
    }

    /// The raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which a transport's sender and listener are registered.
///
/// By convention this is the address scheme the transport serves
/// (`"http"`, `"tcp"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportId(String);

impl TransportId {
    /// Wrap a transport id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound side of a transport.
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Send a serialized request and wait for the response bytes on the same
    /// channel (single-channel exchange).
    async fn send_and_receive(
        &self,
        request: &[u8],
        destination: &Address,
    ) -> Result<Vec<u8>, ClientError>;

    /// Send a serialized request without waiting for a response
    /// (dual-channel exchange; the reply arrives through a listener).
    async fn send_oneway(&self, request: &[u8], destination: &Address) -> Result<(), ClientError>;
}

/// Inbound side of a transport.
#[async_trait]
pub trait TransportListener: Send + Sync {
    /// Start listening. Deliveries go to `handler`; the returned address is
    /// the listener's bound location, from which reply addresses are
    /// composed.
    async fn start(&self, handler: Arc<dyn InboundHandler>) -> Result<Address, ClientError>;

    /// Stop listening.
    async fn stop(&self) -> Result<(), ClientError>;
}

/// Receiver of asynchronously delivered messages.
///
/// Implemented by the [`CallbackDispatcher`](crate::dispatcher::CallbackDispatcher);
/// transport listeners call this once per delivered message.
pub trait InboundHandler: Send + Sync {
    /// A transport listener delivered a message (or failed trying) for the
    /// given request identifier.
    fn on_message_delivered(&self, request_id: RequestId, delivery: Result<Vec<u8>, ClientError>);
}
