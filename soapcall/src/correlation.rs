//! Request identifiers, callbacks, and the correlation registry.
//!
//! A dual-channel call parts ways with its response: the request goes out
//! through a sender, the response comes back later through a listener. The
//! [`CorrelationRegistry`] is the rendezvous point, mapping the request's
//! identifier to the callback that must receive its eventual response.
//!
//! Ownership is strict: a [`PendingCall`] belongs to the registry from
//! `register` until exactly one of response arrival, timeout cancellation,
//! or engine close removes it. Because `resolve` removes the entry, a second
//! delivery for the same identifier finds nothing and cannot double-complete
//! a callback.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClientError;
use crate::wire::Envelope;

/// Process-unique identifier correlating a request with its response.
///
/// Generated fresh per outbound call, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh identifier.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uuid:{}", self.0)
    }
}

/// What an invocation's caller hears back.
///
/// Exactly one of `on_complete`/`on_error` fires, exactly once, per call.
pub trait ResponseHandler: Send + Sync {
    /// The call completed with a (possibly faulting) response envelope.
    fn on_complete(&self, envelope: Envelope);

    /// The call failed before a usable response could be produced.
    fn on_error(&self, error: ClientError);
}

/// A handler wrapped with single-fire and completion bookkeeping.
///
/// `fire` guards exactly-once delivery; `completed` flips only after the
/// handler has returned, so a waiter that observes `is_completed()` can rely
/// on the handler's side effects (e.g. a stored result) being visible.
pub struct Callback {
    handler: Arc<dyn ResponseHandler>,
    fired: AtomicBool,
    completed: AtomicBool,
}

impl Callback {
    /// Wrap a response handler.
    pub fn new(handler: Arc<dyn ResponseHandler>) -> Self {
        Self {
            handler,
            fired: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        }
    }

    /// Whether the handler has been invoked and has returned.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Deliver the outcome. Idempotent: a second call is a logged no-op.
    pub fn complete(&self, result: Result<Envelope, ClientError>) {
        if self.fired.swap(true, Ordering::AcqRel) {
            tracing::warn!("duplicate callback completion ignored");
            return;
        }
        match result {
            Ok(envelope) => self.handler.on_complete(envelope),
            Err(error) => self.handler.on_error(error),
        }
        self.completed.store(true, Ordering::Release);
    }
}

/// Handler that stores the outcome for a polling waiter.
///
/// Used by the blocking dual-channel path: the engine registers this behind a
/// [`Callback`], polls [`Callback::is_completed`], then takes the result.
#[derive(Default)]
pub struct SyncCallback {
    result: Mutex<Option<Result<Envelope, ClientError>>>,
}

impl SyncCallback {
    /// Create an empty sync callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the stored outcome, if one has been delivered.
    pub fn take_result(&self) -> Option<Result<Envelope, ClientError>> {
        self.result.lock().take()
    }
}

impl ResponseHandler for SyncCallback {
    fn on_complete(&self, envelope: Envelope) {
        *self.result.lock() = Some(Ok(envelope));
    }

    fn on_error(&self, error: ClientError) {
        *self.result.lock() = Some(Err(error));
    }
}

/// A registered call awaiting its asynchronous response.
pub struct PendingCall {
    /// The correlation key.
    pub id: RequestId,

    /// The callback to complete when the response lands.
    pub callback: Arc<Callback>,

    /// When the call was registered.
    pub created_at: Instant,
}

/// Engine-owned map from request identifier to pending callback.
///
/// Shared-mutable state between the invocation path (`register`) and the
/// delivery path (`resolve`); every mutation is atomic under the lock. One
/// authoritative instance per engine, so independent engines (and tests) do
/// not share state.
#[derive(Default)]
pub struct CorrelationRegistry {
    pending: Mutex<HashMap<RequestId, PendingCall>>,
}

impl CorrelationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending call. Fails if the identifier is already present;
    /// ids are generated fresh so this is a defensive invariant check.
    pub fn register(&self, id: RequestId, callback: Arc<Callback>) -> Result<(), ClientError> {
        let mut pending = self.pending.lock();
        if pending.contains_key(&id) {
            return Err(ClientError::DuplicateRequestId { id });
        }
        pending.insert(
            id,
            PendingCall {
                id,
                callback,
                created_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Remove and return the pending call for `id`.
    ///
    /// `None` means no one is waiting (a late or duplicate delivery); that is
    /// not an error at this layer and is the caller's cue to drop the
    /// message.
    pub fn resolve(&self, id: RequestId) -> Option<PendingCall> {
        self.pending.lock().remove(&id)
    }

    /// Remove an entry without completing its callback. Used on timeout and
    /// shutdown.
    pub fn cancel(&self, id: RequestId) -> Option<PendingCall> {
        self.pending.lock().remove(&id)
    }

    /// Discard every pending entry, returning how many were dropped.
    pub fn cancel_all(&self) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        pending.clear();
        count
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
