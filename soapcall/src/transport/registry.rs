//! Registry of available transports and engaged capabilities.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{TransportId, TransportListener, TransportSender};

/// Capability a transport stack must engage before dual-channel invocation
/// is legal: the ability to embed a machine-resolvable reply address in an
/// outgoing message.
pub const ADDRESSING_CAPABILITY: &str = "addressing";

/// Immutable lookup table from transport id to sender/listener, plus the set
/// of engaged capabilities.
///
/// Built once with the `with_*` methods and shared behind an `Arc`; nothing
/// mutates it after construction, so the engine can consult it from any
/// number of concurrent invocations without locking.
#[derive(Default)]
pub struct TransportRegistry {
    senders: HashMap<TransportId, Arc<dyn TransportSender>>,
    listeners: HashMap<TransportId, Arc<dyn TransportListener>>,
    capabilities: HashSet<String>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outbound sender under `id`.
    pub fn with_sender(mut self, id: TransportId, sender: Arc<dyn TransportSender>) -> Self {
        self.senders.insert(id, sender);
        self
    }

    /// Register an inbound listener under `id`.
    pub fn with_listener(mut self, id: TransportId, listener: Arc<dyn TransportListener>) -> Self {
        self.listeners.insert(id, listener);
        self
    }

    /// Engage a named capability.
    pub fn with_capability(mut self, name: impl Into<String>) -> Self {
        self.capabilities.insert(name.into());
        self
    }

    /// Look up the sender registered under `id`.
    pub fn sender(&self, id: &TransportId) -> Option<Arc<dyn TransportSender>> {
        self.senders.get(id).cloned()
    }

    /// Look up the listener registered under `id`.
    pub fn listener(&self, id: &TransportId) -> Option<Arc<dyn TransportListener>> {
        self.listeners.get(id).cloned()
    }

    /// Whether a sender exists for `id`.
    pub fn has_sender(&self, id: &TransportId) -> bool {
        self.senders.contains_key(id)
    }

    /// Whether a listener exists for `id`.
    pub fn has_listener(&self, id: &TransportId) -> bool {
        self.listeners.contains_key(id)
    }

    /// Whether the named capability is engaged.
    pub fn is_capability_engaged(&self, name: &str) -> bool {
        self.capabilities.contains(name)
    }
}
