//! Error types for the invocation engine.

use crate::correlation::RequestId;
use crate::wire::FaultDescriptor;
use thiserror::Error;

/// Errors surfaced by the invocation engine and its collaborators.
///
/// `UnknownTransport` and `MissingCapability` are setup errors: they are
/// returned synchronously before any bytes are sent. `Transport` and `Codec`
/// errors surface synchronously on blocking calls and through
/// [`ResponseHandler::on_error`](crate::correlation::ResponseHandler::on_error)
/// on non-blocking ones. `ApplicationFault` is recoverable by policy: the
/// `throw_on_fault` option decides whether it is raised or the faulting
/// envelope is returned as data.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No transport is registered for the requested scheme or id.
    #[error("unknown transport: {scheme}")]
    UnknownTransport {
        /// The scheme or transport id that could not be resolved.
        scheme: String,
    },

    /// Dual-channel invocation requested without the required routing
    /// capability engaged.
    #[error("dual-channel invocation requires the {capability} capability")]
    MissingCapability {
        /// Name of the capability that is not engaged.
        capability: String,
    },

    /// Blocking dual-channel deadline elapsed before the response arrived.
    #[error("response timed out")]
    ResponseTimeout,

    /// The peer returned a fault envelope.
    #[error("application fault: {0}")]
    ApplicationFault(FaultDescriptor),

    /// Send or receive failed below the message layer.
    #[error("transport error: {message}")]
    Transport {
        /// Details about the transport failure.
        message: String,
    },

    /// Bytes could not be parsed into an envelope.
    #[error("codec error: {message}")]
    Codec {
        /// Details about the codec failure.
        message: String,
    },

    /// A request identifier was registered twice. Defensive: ids are
    /// generated fresh per call, so this indicates a registry invariant
    /// violation.
    #[error("duplicate request id: {id}")]
    DuplicateRequestId {
        /// The colliding request identifier.
        id: RequestId,
    },
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Codec {
            message: err.to_string(),
        }
    }
}
