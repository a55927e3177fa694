//! The invocation engine: call options, mode derivation, and the
//! [`ServiceClient`] orchestrating the four call patterns.
//!
//! # Call patterns
//!
//! ```text
//! invoke_blocking, single-channel:
//!   resolve transports -> send_and_receive -> decode -> classify -> return
//!
//! invoke_blocking, dual-channel:
//!   delegate to the non-blocking dual-channel path with a SyncCallback,
//!   then poll is_completed() every poll_interval up to the timeout
//!
//! invoke_non_blocking, single-channel:
//!   resolve transports synchronously, hand the round-trip to a bounded
//!   worker, fire the handler from the worker
//!
//! invoke_non_blocking, dual-channel:
//!   fresh RequestId -> ensure listener -> fill reply-to -> register ->
//!   one-way send -> return; the CallbackDispatcher completes the handler
//!   when the reply lands
//! ```
//!
//! The engine itself holds no per-call state: everything lives in the
//! correlation registry and the listener table, so one engine instance can
//! serve any number of concurrent callers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::correlation::{Callback, CorrelationRegistry, RequestId, ResponseHandler, SyncCallback};
use crate::dispatcher::CallbackDispatcher;
use crate::error::ClientError;
use crate::listener::ListenerManager;
use crate::transport::registry::TransportRegistry;
use crate::transport::selector::{self, ResolvedTransports};
use crate::transport::{TransportId, TransportSender};
use crate::wire::{Envelope, EnvelopeCodec, OutboundRequest, ReplyTo};

/// Per-invocation configuration. Immutable once an invocation starts.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Route the reply over a separately started listener instead of the
    /// sending channel.
    pub use_separate_listener: bool,

    /// Deadline for blocking dual-channel calls.
    pub timeout: Duration,

    /// Outbound transport; inferred from the destination scheme when unset.
    pub sender_transport: Option<TransportId>,

    /// Reply-listener transport; defaults to the sender's transport when
    /// unset.
    pub listener_transport: Option<TransportId>,

    /// Whether a fault envelope is raised as [`ClientError::ApplicationFault`]
    /// or returned to the caller as data.
    pub throw_on_fault: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            use_separate_listener: false,
            timeout: Duration::from_secs(30),
            sender_transport: None,
            listener_transport: None,
            throw_on_fault: true,
        }
    }
}

impl CallOptions {
    /// Enable or disable dual-channel invocation.
    pub fn with_separate_listener(mut self, use_separate_listener: bool) -> Self {
        self.use_separate_listener = use_separate_listener;
        self
    }

    /// Set the blocking dual-channel timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pin the outbound transport instead of inferring it.
    pub fn with_sender_transport(mut self, id: TransportId) -> Self {
        self.sender_transport = Some(id);
        self
    }

    /// Pin the reply-listener transport instead of defaulting it.
    pub fn with_listener_transport(mut self, id: TransportId) -> Self {
        self.listener_transport = Some(id);
        self
    }

    /// Choose whether fault envelopes raise or are returned as data.
    pub fn with_throw_on_fault(mut self, throw_on_fault: bool) -> Self {
        self.throw_on_fault = throw_on_fault;
        self
    }
}

/// The four call patterns, derived from the options and the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Request and reply share one transport round-trip; caller waits.
    BlockingSingleChannel,

    /// Reply arrives on a separate listener; caller waits via polling.
    BlockingDualChannel,

    /// Round-trip runs on a worker; caller's handler fires on completion.
    NonBlockingSingleChannel,

    /// Reply arrives on a separate listener and is correlated to the
    /// caller's handler.
    NonBlockingDualChannel,
}

impl InvocationMode {
    /// Derive the mode from whether a separate listener was requested and
    /// whether the call site supplied a handler.
    pub fn derive(use_separate_listener: bool, has_callback: bool) -> Self {
        match (use_separate_listener, has_callback) {
            (false, false) => InvocationMode::BlockingSingleChannel,
            (true, false) => InvocationMode::BlockingDualChannel,
            (false, true) => InvocationMode::NonBlockingSingleChannel,
            (true, true) => InvocationMode::NonBlockingDualChannel,
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Service name used as the leading segment of reply routes.
    pub service_name: String,

    /// Maximum concurrent non-blocking single-channel workers. Calls beyond
    /// the limit queue; they are never rejected.
    pub worker_limit: usize,

    /// Granularity of the blocking dual-channel completion poll.
    pub poll_interval: Duration,
}

impl EngineConfig {
    /// Configuration for a client of `service_name` with default limits.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            worker_limit: 16,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Set the worker pool size.
    pub fn with_worker_limit(mut self, worker_limit: usize) -> Self {
        self.worker_limit = worker_limit;
        self
    }

    /// Set the completion poll granularity.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Client-side invocation engine.
///
/// Owns the correlation registry, the reply-listener lifecycle, and the
/// bounded worker pool. Stateless per call; share one instance behind an
/// `Arc` across concurrent callers.
pub struct ServiceClient {
    config: EngineConfig,
    transports: Arc<TransportRegistry>,
    codec: Arc<dyn EnvelopeCodec>,
    registry: Arc<CorrelationRegistry>,
    listeners: Arc<ListenerManager>,
    workers: Arc<Semaphore>,
    // How many ensure_started increments this engine took per transport,
    // released on close().
    listener_usage: parking_lot::Mutex<HashMap<TransportId, usize>>,
}

impl ServiceClient {
    /// Create an engine over the given transports and codec.
    pub fn new(
        config: EngineConfig,
        transports: Arc<TransportRegistry>,
        codec: Arc<dyn EnvelopeCodec>,
    ) -> Self {
        let registry = Arc::new(CorrelationRegistry::new());
        let dispatcher = Arc::new(CallbackDispatcher::new(registry.clone(), codec.clone()));
        let listeners = Arc::new(ListenerManager::new(transports.clone(), dispatcher));
        let workers = Arc::new(Semaphore::new(config.worker_limit));
        Self {
            config,
            transports,
            codec,
            registry,
            listeners,
            workers,
            listener_usage: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// The engine's correlation registry, for observing pending calls.
    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Invoke `operation` and wait for the outcome.
    ///
    /// Single-channel by default: the transport round-trip itself is the
    /// synchronization primitive and the correlation registry is not
    /// involved. With `use_separate_listener` the call is sugar over the
    /// non-blocking dual-channel path plus a bounded completion poll; if the
    /// deadline elapses the pending entry is cancelled first, so a late
    /// reply hits the dispatcher's drop path instead of resurrecting the
    /// call.
    pub async fn invoke_blocking(
        &self,
        operation: &str,
        request: OutboundRequest,
        options: &CallOptions,
    ) -> Result<Envelope, ClientError> {
        let mode = InvocationMode::derive(options.use_separate_listener, false);
        tracing::debug!(?mode, operation, to = %request.to, "invoking");
        if options.use_separate_listener {
            return self.invoke_blocking_dual(operation, request, options).await;
        }

        let resolved = selector::resolve(options, &request.to, &self.transports)?;
        let sender = self.sender(&resolved)?;
        let mut request = request;
        request.operation = operation.to_string();
        request.message_id = Some(RequestId::fresh());

        let envelope = round_trip(&*self.codec, &*sender, &request).await?;
        classify_response(envelope, options.throw_on_fault)
    }

    /// Invoke `operation` and return once the request is on its way; the
    /// outcome reaches `handler` later.
    ///
    /// Setup failures (`UnknownTransport`, `MissingCapability`) are returned
    /// synchronously before any bytes move. After setup, single-channel
    /// calls run their round-trip on a bounded worker and report through the
    /// handler; dual-channel calls report through the handler when the
    /// correlated reply is delivered. Non-blocking calls carry no timeout:
    /// if the peer never replies the handler never fires, and the pending
    /// entry is swept at [`close`](Self::close).
    pub async fn invoke_non_blocking(
        &self,
        operation: &str,
        request: OutboundRequest,
        options: &CallOptions,
        handler: Arc<dyn ResponseHandler>,
    ) -> Result<(), ClientError> {
        let mode = InvocationMode::derive(options.use_separate_listener, true);
        tracing::debug!(?mode, operation, to = %request.to, "invoking");
        let callback = Arc::new(Callback::new(handler));
        if options.use_separate_listener {
            self.dispatch_dual_channel(operation, request, options, callback)
                .await?;
            return Ok(());
        }

        let resolved = selector::resolve(options, &request.to, &self.transports)?;
        let sender = self.sender(&resolved)?;
        let mut request = request;
        request.operation = operation.to_string();
        request.message_id = Some(RequestId::fresh());

        let workers = self.workers.clone();
        let codec = self.codec.clone();
        tokio::spawn(async move {
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!("worker pool closed, dropping invocation");
                    return;
                }
            };
            let result = round_trip(&*codec, &*sender, &request)
                .await
                .and_then(|envelope| {
                    if envelope.has_fault() {
                        let descriptor = envelope.fault_descriptor().unwrap_or_default();
                        Err(ClientError::ApplicationFault(descriptor))
                    } else {
                        Ok(envelope)
                    }
                });
            callback.complete(result);
        });
        Ok(())
    }

    /// Release every listener use this engine took and sweep pending calls.
    ///
    /// Decrements shared listeners rather than force-stopping them; a
    /// listener other callers still hold stays up.
    pub async fn close(&self) -> Result<(), ClientError> {
        let usage: Vec<(TransportId, usize)> = {
            let mut listener_usage = self.listener_usage.lock();
            listener_usage.drain().collect()
        };
        for (transport_id, count) in usage {
            for _ in 0..count {
                self.listeners.stop(&transport_id).await?;
            }
        }

        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "swept pending calls at close");
        }
        Ok(())
    }

    async fn invoke_blocking_dual(
        &self,
        operation: &str,
        request: OutboundRequest,
        options: &CallOptions,
    ) -> Result<Envelope, ClientError> {
        let sync = Arc::new(SyncCallback::new());
        let callback = Arc::new(Callback::new(sync.clone() as Arc<dyn ResponseHandler>));
        let request_id = self
            .dispatch_dual_channel(operation, request, options, callback.clone())
            .await?;

        // Bounded-latency emulation of "wait for the correlation to land":
        // poll the completion flag rather than suspending on a wakeup. No
        // lock is held while sleeping.
        let deadline = Instant::now() + options.timeout;
        while !callback.is_completed() {
            if Instant::now() >= deadline {
                self.registry.cancel(request_id);
                tracing::debug!(%request_id, "blocking dual-channel call timed out");
                return Err(ClientError::ResponseTimeout);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        match sync.take_result() {
            Some(result) => result,
            // The callback completed, so the handler stored an outcome.
            None => Err(ClientError::Transport {
                message: "completed call yielded no result".to_string(),
            }),
        }
    }

    /// The shared dual-channel send path: fresh id, listener, reply-to,
    /// registration, one-way send.
    async fn dispatch_dual_channel(
        &self,
        operation: &str,
        mut request: OutboundRequest,
        options: &CallOptions,
        callback: Arc<Callback>,
    ) -> Result<RequestId, ClientError> {
        let resolved = selector::resolve(options, &request.to, &self.transports)?;
        let sender = self.sender(&resolved)?;

        let request_id = RequestId::fresh();
        request.operation = operation.to_string();
        request.message_id = Some(request_id);

        let route_key = format!("{}/{}", self.config.service_name, operation);
        let reply_address = self
            .listeners
            .ensure_started(&resolved.listener, &route_key)
            .await?;
        *self
            .listener_usage
            .lock()
            .entry(resolved.listener.clone())
            .or_insert(0) += 1;

        // Only fill the reply-to if the caller left it unset; a caller-built
        // reply-to keeps its path and metadata and has just its address
        // replaced with the listener's.
        match request.reply_to.as_mut() {
            Some(reply_to) => reply_to.set_address(reply_address.as_str()),
            None => request.reply_to = Some(ReplyTo::new(reply_address.as_str())),
        }

        let bytes = self.codec.encode_request(&request)?;
        self.registry.register(request_id, callback)?;
        if let Err(error) = sender.send_oneway(&bytes, &request.to).await {
            // No reply can arrive for a request that never left.
            self.registry.cancel(request_id);
            return Err(error);
        }
        tracing::debug!(%request_id, to = %request.to, "dual-channel request sent");
        Ok(request_id)
    }

    fn sender(
        &self,
        resolved: &ResolvedTransports,
    ) -> Result<Arc<dyn TransportSender>, ClientError> {
        self.transports
            .sender(&resolved.sender)
            .ok_or_else(|| ClientError::UnknownTransport {
                scheme: resolved.sender.to_string(),
            })
    }
}

async fn round_trip(
    codec: &dyn EnvelopeCodec,
    sender: &dyn TransportSender,
    request: &OutboundRequest,
) -> Result<Envelope, ClientError> {
    let bytes = codec.encode_request(request)?;
    let response = sender.send_and_receive(&bytes, &request.to).await?;
    codec.decode_envelope(&response)
}

/// Shared fault classification for the single-channel paths.
fn classify_response(envelope: Envelope, throw_on_fault: bool) -> Result<Envelope, ClientError> {
    if envelope.has_fault() && throw_on_fault {
        let descriptor = envelope.fault_descriptor().unwrap_or_default();
        return Err(ClientError::ApplicationFault(descriptor));
    }
    Ok(envelope)
}
