//! Reply-listener lifecycle: starting, reusing, and stopping the inbound
//! listeners dual-channel calls receive their responses on.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ClientError;
use crate::transport::registry::TransportRegistry;
use crate::transport::{Address, InboundHandler, TransportId};

struct ListenerEntry {
    bound: Address,
    refcount: usize,
}

/// Starts, reuses, and stops named inbound listeners.
///
/// One listener per transport id, shared across concurrent calls by
/// refcount. A listener is physically stopped only when its refcount reaches
/// zero through explicit [`stop`](ListenerManager::stop) calls; it is never
/// torn down implicitly mid-call.
///
/// All state transitions serialize on one async lock, so callers racing to
/// start the same listener observe exactly one physical start. The lock is
/// held across the listener's own `start()` await; that is the serialization
/// point. No poll loop ever sleeps under it.
pub struct ListenerManager {
    transports: Arc<TransportRegistry>,
    handler: Arc<dyn InboundHandler>,
    listeners: tokio::sync::Mutex<HashMap<TransportId, ListenerEntry>>,
}

impl ListenerManager {
    /// Create a manager starting listeners from `transports`, delivering
    /// into `handler`.
    pub fn new(transports: Arc<TransportRegistry>, handler: Arc<dyn InboundHandler>) -> Self {
        Self {
            transports,
            handler,
            listeners: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Make sure a listener runs for `transport_id` and return the reply
    /// address for `route_key`.
    ///
    /// Idempotent: an already-running listener has its refcount incremented
    /// and its existing bound location reused. The reply address is the
    /// bound location with the route key appended, so replies carry enough
    /// path to be routed back to this client.
    pub async fn ensure_started(
        &self,
        transport_id: &TransportId,
        route_key: &str,
    ) -> Result<Address, ClientError> {
        let mut listeners = self.listeners.lock().await;

        if let Some(entry) = listeners.get_mut(transport_id) {
            entry.refcount += 1;
            return Ok(reply_address(&entry.bound, route_key));
        }

        let listener =
            self.transports
                .listener(transport_id)
                .ok_or_else(|| ClientError::UnknownTransport {
                    scheme: transport_id.to_string(),
                })?;
        let bound = listener.start(self.handler.clone()).await?;
        tracing::debug!(transport = %transport_id, %bound, "reply listener started");

        listeners.insert(
            transport_id.clone(),
            ListenerEntry {
                bound: bound.clone(),
                refcount: 1,
            },
        );
        Ok(reply_address(&bound, route_key))
    }

    /// Release one use of the listener for `transport_id`, physically
    /// stopping it when the last use is released. No-op when no listener is
    /// active for the transport.
    pub async fn stop(&self, transport_id: &TransportId) -> Result<(), ClientError> {
        let mut listeners = self.listeners.lock().await;

        let Some(entry) = listeners.get_mut(transport_id) else {
            return Ok(());
        };
        entry.refcount -= 1;
        if entry.refcount > 0 {
            return Ok(());
        }

        listeners.remove(transport_id);
        if let Some(listener) = self.transports.listener(transport_id) {
            listener.stop().await?;
        }
        tracing::debug!(transport = %transport_id, "reply listener stopped");
        Ok(())
    }

    /// Current refcount for `transport_id`; zero when not running.
    pub async fn refcount(&self, transport_id: &TransportId) -> usize {
        self.listeners
            .lock()
            .await
            .get(transport_id)
            .map(|entry| entry.refcount)
            .unwrap_or(0)
    }
}

fn reply_address(bound: &Address, route_key: &str) -> Address {
    Address::new(format!(
        "{}/{}",
        bound.as_str().trim_end_matches('/'),
        route_key
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::correlation::RequestId;
    use crate::transport::TransportListener;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopHandler;

    impl InboundHandler for NoopHandler {
        fn on_message_delivered(
            &self,
            _request_id: RequestId,
            _delivery: Result<Vec<u8>, ClientError>,
        ) {
        }
    }

    struct CountingListener {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl TransportListener for CountingListener {
        async fn start(&self, _handler: Arc<dyn InboundHandler>) -> Result<Address, ClientError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(Address::new("http://127.0.0.1:6060"))
        }

        async fn stop(&self) -> Result<(), ClientError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager() -> (Arc<CountingListener>, ListenerManager) {
        let counting = Arc::new(CountingListener {
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        });
        let transports = Arc::new(
            TransportRegistry::new().with_listener(TransportId::new("http"), counting.clone()),
        );
        (counting, ListenerManager::new(transports, Arc::new(NoopHandler)))
    }

    #[tokio::test]
    async fn test_ensure_started_reuses_running_listener() {
        let (counting, manager) = manager();
        let id = TransportId::new("http");

        let first = manager.ensure_started(&id, "Echo/ping").await.unwrap();
        let second = manager.ensure_started(&id, "Echo/ping").await.unwrap();

        assert_eq!(counting.starts.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "http://127.0.0.1:6060/Echo/ping");
        assert_eq!(manager.refcount(&id).await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_started_starts_once() {
        let (counting, manager) = manager();
        let id = TransportId::new("http");

        let (a, b) = tokio::join!(
            manager.ensure_started(&id, "Echo/ping"),
            manager.ensure_started(&id, "Echo/ping"),
        );

        assert_eq!(counting.starts.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_stop_is_refcounted() {
        let (counting, manager) = manager();
        let id = TransportId::new("http");

        manager.ensure_started(&id, "Echo/ping").await.unwrap();
        manager.ensure_started(&id, "Echo/ping").await.unwrap();

        manager.stop(&id).await.unwrap();
        assert_eq!(counting.stops.load(Ordering::SeqCst), 0);

        manager.stop(&id).await.unwrap();
        assert_eq!(counting.stops.load(Ordering::SeqCst), 1);
        assert_eq!(manager.refcount(&id).await, 0);
    }

    #[tokio::test]
    async fn test_stop_without_listener_is_noop() {
        let (_counting, manager) = manager();
        assert!(manager.stop(&TransportId::new("tcp")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_transport_fails_start() {
        let (_counting, manager) = manager();
        let result = manager.ensure_started(&TransportId::new("mail"), "x").await;
        assert!(matches!(result, Err(ClientError::UnknownTransport { .. })));
    }
}
