//! Transport selection for an invocation.
//!
//! Resolves which sender carries the request and, for dual-channel calls,
//! which listener receives the reply, validating prerequisites before any
//! listener is started or any bytes are sent.

use crate::engine::CallOptions;
use crate::error::ClientError;

use super::registry::{ADDRESSING_CAPABILITY, TransportRegistry};
use super::{Address, TransportId};

/// Outcome of transport selection: the sender to use and the listener a
/// dual-channel reply would arrive on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransports {
    /// Transport carrying the outgoing request.
    pub sender: TransportId,

    /// Transport the reply listener would run on.
    pub listener: TransportId,
}

/// Resolve the transports for a call against `destination`.
///
/// An unset sender is inferred from the destination's scheme; an unset
/// listener defaults to the sender's transport. Listener registration is
/// only enforced for dual-channel calls; a single-channel call never starts
/// a listener, so an unregistered listener transport is tolerated there.
/// Dual-channel calls additionally require the addressing capability to be
/// engaged: without it a reply address could be embedded but never routed
/// back, so the check fails here, before any listener start or send
/// attempt.
pub fn resolve(
    options: &CallOptions,
    destination: &Address,
    registry: &TransportRegistry,
) -> Result<ResolvedTransports, ClientError> {
    let sender = match &options.sender_transport {
        Some(id) => id.clone(),
        None => {
            let scheme = destination
                .scheme()
                .ok_or_else(|| ClientError::UnknownTransport {
                    scheme: destination.to_string(),
                })?;
            TransportId::new(scheme)
        }
    };
    if !registry.has_sender(&sender) {
        return Err(ClientError::UnknownTransport {
            scheme: sender.to_string(),
        });
    }

    let listener = options
        .listener_transport
        .clone()
        .unwrap_or_else(|| sender.clone());
    if options.use_separate_listener {
        if !registry.has_listener(&listener) {
            return Err(ClientError::UnknownTransport {
                scheme: listener.to_string(),
            });
        }
        if !registry.is_capability_engaged(ADDRESSING_CAPABILITY) {
            return Err(ClientError::MissingCapability {
                capability: ADDRESSING_CAPABILITY.to_string(),
            });
        }
    }

    tracing::debug!(sender = %sender, listener = %listener, "transports resolved");
    Ok(ResolvedTransports { sender, listener })
}
