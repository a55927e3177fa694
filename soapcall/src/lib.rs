//! # soapcall
//!
//! Client-side invocation engine for SOAP-style RPC over pluggable
//! transports.
//!
//! The engine turns "invoke operation X on endpoint Y with message M" into a
//! correctly sequenced wire exchange, whether the transport answers on the
//! same channel (HTTP-style request/response) or the reply travels over a
//! second, independently addressed channel that must be correlated back to
//! the caller.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ ServiceClient (invocation engine)                            │
//! │   four call patterns, worker pool, fault classification      │
//! ├────────────────┬──────────────────────┬──────────────────────┤
//! │ selector       │ ListenerManager      │ CorrelationRegistry  │
//! │ pick sender +  │ refcounted reply     │ RequestId → pending  │
//! │ listener,      │ listeners, reply     │ callback             │
//! │ capability     │ address composition  ├──────────────────────┤
//! │ precondition   │                      │ CallbackDispatcher   │
//! │                │                      │ inbound completion   │
//! ├────────────────┴──────────────────────┴──────────────────────┤
//! │ transport seam: TransportSender / TransportListener /        │
//! │ InboundHandler · codec seam: EnvelopeCodec                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Call patterns
//!
//! | Pattern | Channel | Caller |
//! |---------|---------|--------|
//! | [`ServiceClient::invoke_blocking`], default options | single | waits on the round-trip |
//! | [`ServiceClient::invoke_blocking`], separate listener | dual | waits via bounded poll |
//! | [`ServiceClient::invoke_non_blocking`], default options | single | handler fires from a worker |
//! | [`ServiceClient::invoke_non_blocking`], separate listener | dual | handler fires on correlated delivery |
//!
//! Concrete transports, the SOAP object model, and WSDL stub generation are
//! external collaborators behind the [`transport`] and [`wire`] seams.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Modules
// =============================================================================

/// Request identifiers, callbacks, and the correlation registry.
pub mod correlation;

/// Inbound-side completion of pending callbacks.
pub mod dispatcher;

/// Call options, invocation modes, and the engine itself.
pub mod engine;

/// Error taxonomy.
pub mod error;

/// Reply-listener lifecycle management.
pub mod listener;

/// Transport seam, registry, and selection.
pub mod transport;

/// Wire-level message model and codec seam.
pub mod wire;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use correlation::{
    Callback, CorrelationRegistry, PendingCall, RequestId, ResponseHandler, SyncCallback,
};
pub use dispatcher::CallbackDispatcher;
pub use engine::{CallOptions, EngineConfig, InvocationMode, ServiceClient};
pub use error::ClientError;
pub use listener::ListenerManager;
pub use transport::registry::{ADDRESSING_CAPABILITY, TransportRegistry};
pub use transport::selector::ResolvedTransports;
pub use transport::{Address, InboundHandler, TransportId, TransportListener, TransportSender};
pub use wire::{
    Envelope, EnvelopeCodec, FaultBlock, FaultDescriptor, JsonEnvelopeCodec, OutboundRequest,
    ReplyTo,
};
