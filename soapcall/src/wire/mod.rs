//! Wire-level message model: outgoing requests, response envelopes, fault
//! descriptors, and the codec seam.
//!
//! The engine treats payloads as opaque. The only structure it relies on is
//! the fault predicate of a response envelope and the addressing fields of an
//! outgoing request (message id and reply-to). Everything else passes through
//! untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::correlation::RequestId;
use crate::error::ClientError;
use crate::transport::Address;

/// A response payload with a fault predicate.
///
/// Built by an [`EnvelopeCodec`] from the bytes a transport delivered. The
/// body is opaque to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque response body.
    pub body: Vec<u8>,

    /// Present when the peer signalled an application-level error.
    fault: Option<FaultBlock>,
}

impl Envelope {
    /// Create a non-faulting envelope around an opaque body.
    pub fn new(body: Vec<u8>) -> Self {
        Self { body, fault: None }
    }

    /// Create a faulting envelope.
    pub fn with_fault(fault: FaultBlock) -> Self {
        Self {
            body: Vec::new(),
            fault: Some(fault),
        }
    }

    /// Whether this envelope carries an application-level fault.
    pub fn has_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// Extract a structured fault descriptor, if this envelope is faulting.
    ///
    /// Extraction is tolerant: a missing code or reason degrades to an empty
    /// string and a missing cause to `None`. It never fails on a partial
    /// fault block.
    pub fn fault_descriptor(&self) -> Option<FaultDescriptor> {
        self.fault.as_ref().map(|block| FaultDescriptor {
            code: block.code.clone().unwrap_or_default(),
            reason: block.reason.clone().unwrap_or_default(),
            cause: block.detail.clone(),
        })
    }
}

/// Raw fault fields as they appear on the wire. All optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultBlock {
    /// Fault code (e.g. `"Server"`, `"Client"`).
    pub code: Option<String>,

    /// Human-readable reason text.
    pub reason: Option<String>,

    /// Embedded cause detail, when the peer attached one.
    pub detail: Option<String>,
}

/// Structured fault descriptor extracted from a faulting envelope.
///
/// Missing wire fields have already been degraded to empty strings; this type
/// never holds a "null" code or reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultDescriptor {
    /// Fault code, empty when absent on the wire.
    pub code: String,

    /// Reason text, empty when absent on the wire.
    pub reason: String,

    /// Embedded cause, when present.
    pub cause: Option<String>,
}

impl fmt::Display for FaultDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Prefer the embedded cause; otherwise synthesize from code/reason,
        // treating missing parts as empty.
        match &self.cause {
            Some(cause) => write!(f, "{}", cause),
            None => write!(f, "code={} reason={}", self.code, self.reason),
        }
    }
}

/// Reply routing information embedded in an outgoing request.
///
/// When the engine fills in the listener's reply address for a caller that
/// already supplied a `ReplyTo`, only the address field is overwritten;
/// `reference_path` and `metadata` are caller-owned and survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyTo {
    address: String,

    /// Caller-chosen path segment appended by the peer when replying.
    pub reference_path: Option<String>,

    /// Caller-supplied routing metadata, passed through untouched.
    pub metadata: BTreeMap<String, String>,
}

impl ReplyTo {
    /// Create a reply-to pointing at `address` with no extra routing detail.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reference_path: None,
            metadata: BTreeMap::new(),
        }
    }

    /// The reply address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Overwrite only the address, preserving path and metadata.
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = address.into();
    }
}

/// An outgoing request, addressed but not yet serialized.
///
/// The engine stamps `message_id` on every invocation and fills `reply_to`
/// for dual-channel calls; callers provide the destination and body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Destination address.
    pub to: Address,

    /// Operation name, set by the engine from the invocation entry point.
    pub operation: String,

    /// Process-unique message identifier, stamped fresh per invocation.
    pub message_id: Option<RequestId>,

    /// Where the reply should be delivered, for dual-channel exchanges.
    pub reply_to: Option<ReplyTo>,

    /// Opaque request body.
    pub body: Vec<u8>,
}

impl OutboundRequest {
    /// Create a request to `to` carrying `body`.
    pub fn new(to: Address, body: Vec<u8>) -> Self {
        Self {
            to,
            operation: String::new(),
            message_id: None,
            reply_to: None,
            body,
        }
    }
}

/// Codec seam between the engine and the message object model.
///
/// Stands in for the streaming SOAP parser/serializer, which is an external
/// collaborator. The engine only needs "request to bytes" and "bytes to
/// envelope".
pub trait EnvelopeCodec: Send + Sync {
    /// Serialize an outgoing request.
    fn encode_request(&self, request: &OutboundRequest) -> Result<Vec<u8>, ClientError>;

    /// Parse delivered bytes into a response envelope.
    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope, ClientError>;
}

/// JSON codec, the built-in [`EnvelopeCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEnvelopeCodec;

impl EnvelopeCodec for JsonEnvelopeCodec {
    fn encode_request(&self, request: &OutboundRequest) -> Result<Vec<u8>, ClientError> {
        Ok(serde_json::to_vec(request)?)
    }

    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope, ClientError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_descriptor_degrades_missing_fields() {
        let envelope = Envelope::with_fault(FaultBlock::default());

        assert!(envelope.has_fault());
        let descriptor = envelope.fault_descriptor().unwrap();
        assert_eq!(descriptor.code, "");
        assert_eq!(descriptor.reason, "");
        assert_eq!(descriptor.cause, None);
    }

    #[test]
    fn test_fault_descriptor_display_prefers_cause() {
        let with_cause = FaultDescriptor {
            code: "Server".to_string(),
            reason: "boom".to_string(),
            cause: Some("division by zero".to_string()),
        };
        assert_eq!(with_cause.to_string(), "division by zero");

        let without_cause = FaultDescriptor {
            code: "Server".to_string(),
            reason: String::new(),
            cause: None,
        };
        assert!(without_cause.to_string().contains("Server"));
    }

    #[test]
    fn test_reply_to_partial_overwrite_preserves_metadata() {
        let mut reply_to = ReplyTo::new("http://caller.example/old");
        reply_to.reference_path = Some("session/42".to_string());
        reply_to
            .metadata
            .insert("routing-key".to_string(), "priority".to_string());

        reply_to.set_address("http://listener.example:6060/Service/op");

        assert_eq!(reply_to.address(), "http://listener.example:6060/Service/op");
        assert_eq!(reply_to.reference_path.as_deref(), Some("session/42"));
        assert_eq!(
            reply_to.metadata.get("routing-key").map(String::as_str),
            Some("priority")
        );
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let codec = JsonEnvelopeCodec;
        let result = codec.decode_envelope(b"not json at all");
        assert!(matches!(result, Err(ClientError::Codec { .. })));
    }

    #[test]
    fn test_non_faulting_envelope_has_no_descriptor() {
        let envelope = Envelope::new(b"payload".to_vec());
        assert!(!envelope.has_fault());
        assert!(envelope.fault_descriptor().is_none());
    }
}
