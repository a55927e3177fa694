//! Inbound-side dispatch: completing pending callbacks as transport
//! listeners deliver messages.

use std::sync::Arc;

use crate::correlation::{CorrelationRegistry, RequestId};
use crate::error::ClientError;
use crate::transport::InboundHandler;
use crate::wire::EnvelopeCodec;

/// Handler a transport listener delivers into.
///
/// Resolves the request identifier against the correlation registry and
/// completes the matching callback exactly once. Because resolution removes
/// the registry entry, a second delivery for the same identifier finds
/// nothing and is dropped; double completion is impossible by construction.
pub struct CallbackDispatcher {
    registry: Arc<CorrelationRegistry>,
    codec: Arc<dyn EnvelopeCodec>,
}

impl CallbackDispatcher {
    /// Create a dispatcher completing callbacks from `registry`, parsing
    /// deliveries with `codec`.
    pub fn new(registry: Arc<CorrelationRegistry>, codec: Arc<dyn EnvelopeCodec>) -> Self {
        Self { registry, codec }
    }
}

impl InboundHandler for CallbackDispatcher {
    fn on_message_delivered(&self, request_id: RequestId, delivery: Result<Vec<u8>, ClientError>) {
        let Some(pending) = self.registry.resolve(request_id) else {
            // Late or duplicate delivery: no one is waiting. Not an error.
            tracing::warn!(%request_id, "dropping delivery with no pending call");
            return;
        };

        let elapsed = pending.created_at.elapsed();
        let result = delivery.and_then(|bytes| {
            let envelope = self.codec.decode_envelope(&bytes)?;
            if envelope.has_fault() {
                let descriptor = envelope.fault_descriptor().unwrap_or_default();
                Err(ClientError::ApplicationFault(descriptor))
            } else {
                Ok(envelope)
            }
        });

        tracing::debug!(%request_id, ?elapsed, ok = result.is_ok(), "completing pending call");
        pending.callback.complete(result);
    }
}
