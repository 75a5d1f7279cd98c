//! Composition root: one broker per client, scoped to one origin.

use crate::dispatcher::{Completion, RequestDispatcher};
use crate::error::ProtocolError;
use crate::handles::HandleTable;
use crate::origin::Origin;
use crate::protocol::{decode_request, Request};
use crate::sink::ResponseSink;
use crate::store::CacheStore;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Counters reported when a broker's event loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Envelopes that decoded into a request.
    pub requests: u64,
    /// Envelopes rejected with a protocol error.
    pub rejected: u64,
    /// Responses handed to the sink.
    pub responses: u64,
    /// Responses that reported an error to the client.
    pub errors: u64,
    /// Disposals that actually removed a mapping.
    pub released: u64,
}

/// Exposes a [`CacheStore`] to one remote client.
///
/// The broker is driven by a single owner task: [`Broker::handle`] issues
/// store calls without waiting for them, and completions are applied by
/// [`Broker::complete_next`] or [`Broker::run`] on that same task. Dropping
/// the broker releases every handle it still holds and turns outstanding
/// completions into no-ops.
pub struct Broker<S: CacheStore> {
    dispatcher: RequestDispatcher<S>,
    handles: HandleTable<S::Cache>,
    completions: mpsc::UnboundedReceiver<Completion<S::Cache>>,
    sink: Box<dyn ResponseSink>,
    in_flight: usize,
    stats: BrokerStats,
}

impl<S: CacheStore> Broker<S> {
    pub fn new(store: Arc<S>, origin: Origin, sink: impl ResponseSink + 'static) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            dispatcher: RequestDispatcher::new(store, origin, tx),
            handles: HandleTable::new(),
            completions: rx,
            sink: Box::new(sink),
            in_flight: 0,
            stats: BrokerStats::default(),
        }
    }

    pub fn origin(&self) -> &Origin {
        self.dispatcher.origin()
    }

    pub fn handles(&self) -> &HandleTable<S::Cache> {
        &self.handles
    }

    /// Requests issued to the store and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn stats(&self) -> BrokerStats {
        self.stats
    }

    /// Decode one inbound envelope and dispatch it.
    ///
    /// Rejected envelopes never reach the store. Must be called from within a
    /// tokio runtime.
    pub fn handle(&mut self, envelope: &[u8]) -> Result<(), ProtocolError> {
        match decode_request(envelope) {
            Ok(request) => {
                self.dispatch(request);
                Ok(())
            }
            Err(e) => {
                self.stats.rejected += 1;
                tracing::warn!(origin = %self.origin(), "rejected envelope: {}", e);
                Err(e)
            }
        }
    }

    /// Dispatch an already-decoded request.
    pub fn dispatch(&mut self, request: Request) {
        self.stats.requests += 1;
        if let (Some(request_id), Some(op)) = (request.request_id(), request.operation()) {
            tracing::debug!(request_id = request_id.0, op = op.as_str(), "dispatching request");
        }
        match request {
            Request::Get {
                request_id,
                cache_name,
            } => self.dispatcher.get(request_id, cache_name),
            Request::Has {
                request_id,
                cache_name,
            } => self.dispatcher.has(request_id, cache_name),
            Request::Create {
                request_id,
                cache_name,
            } => self.dispatcher.create(request_id, cache_name),
            Request::Delete {
                request_id,
                cache_name,
            } => self.dispatcher.delete(request_id, cache_name),
            Request::Keys { request_id } => self.dispatcher.keys(request_id),
            Request::DisposeHandle { handle } => {
                if self.handles.release(handle) {
                    self.stats.released += 1;
                    tracing::debug!(%handle, live = self.handles.len(), "released cache handle");
                } else {
                    tracing::debug!(%handle, "disposal of unknown cache handle ignored");
                }
                return;
            }
        }
        self.in_flight += 1;
    }

    /// Wait for the next store completion and emit its response.
    ///
    /// Returns `false` without waiting when nothing is in flight.
    pub async fn complete_next(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.completions.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Answer every in-flight request.
    pub async fn drain(&mut self) {
        while self.complete_next().await {}
    }

    /// Serve envelopes from `inbound` until it closes, then answer whatever is
    /// still in flight.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<String>) -> BrokerStats {
        let mut inbound_open = true;
        loop {
            tokio::select! {
                envelope = inbound.recv(), if inbound_open => match envelope {
                    Some(envelope) => {
                        // Rejections are already logged and counted.
                        let _ = self.handle(envelope.as_bytes());
                    }
                    None => inbound_open = false,
                },
                Some(completion) = self.completions.recv(), if self.in_flight > 0 => {
                    self.apply(completion);
                }
                else => break,
            }
        }
        tracing::info!(
            origin = %self.origin(),
            requests = self.stats.requests,
            rejected = self.stats.rejected,
            responses = self.stats.responses,
            errors = self.stats.errors,
            live_handles = self.handles.len(),
            "broker stopped"
        );
        self.stats
    }

    fn apply(&mut self, completion: Completion<S::Cache>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let response = self.dispatcher.complete(completion, &mut self.handles);
        self.stats.responses += 1;
        if response.is_error() {
            self.stats.errors += 1;
        }
        self.sink.send(response);
    }
}

impl<S: CacheStore> std::fmt::Debug for Broker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("origin", self.origin())
            .field("handles", &self.handles)
            .field("in_flight", &self.in_flight)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WireError;
    use crate::handles::CacheId;
    use crate::memory::MemoryCacheStore;
    use crate::protocol::{Operation, RequestId, Response};

    fn broker() -> (Broker<MemoryCacheStore>, mpsc::UnboundedReceiver<Response>) {
        let origin = Origin::from_scope("https://example.com/").unwrap();
        let store = Arc::new(MemoryCacheStore::new());
        store.preload(&origin, ["images"]).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        (Broker::new(store, origin, tx), rx)
    }

    #[tokio::test]
    async fn test_dispose_is_synchronous_and_unanswered() {
        let (mut broker, mut rx) = broker();
        broker
            .handle(br#"{"op":"get","request_id":1,"cache_name":"images"}"#)
            .unwrap();
        assert_eq!(broker.in_flight(), 1);
        broker.drain().await;
        assert_eq!(broker.handles().len(), 1);

        broker
            .handle(br#"{"op":"dispose_handle","handle":0}"#)
            .unwrap();
        assert_eq!(broker.in_flight(), 0);
        assert!(broker.handles().is_empty());
        assert!(!broker.complete_next().await);

        assert_eq!(
            rx.recv().await.unwrap(),
            Response::Handle {
                request_id: RequestId(1),
                op: Operation::Get,
                cache_id: CacheId::new(0)
            }
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(broker.stats().released, 1);
    }

    #[tokio::test]
    async fn test_protocol_errors_short_circuit() {
        let (mut broker, _rx) = broker();
        assert!(matches!(
            broker.handle(br#"{"op":"put","request_id":1}"#),
            Err(ProtocolError::UnknownOperation(_))
        ));
        assert!(broker.handle(b"garbage").is_err());
        assert_eq!(broker.in_flight(), 0);
        assert_eq!(broker.stats().rejected, 2);
        assert_eq!(broker.stats().requests, 0);
    }

    #[tokio::test]
    async fn test_run_answers_everything_before_returning() {
        let (broker, mut rx) = broker();
        let (tx, inbound) = mpsc::channel(8);
        let server = tokio::spawn(broker.run(inbound));

        tx.send(r#"{"op":"has","request_id":1,"cache_name":"images"}"#.to_string())
            .await
            .unwrap();
        tx.send(r#"{"op":"has","request_id":2,"cache_name":"fonts"}"#.to_string())
            .await
            .unwrap();
        tx.send("nonsense".to_string()).await.unwrap();
        drop(tx);

        let stats = server.await.unwrap();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.responses, 2);
        assert_eq!(stats.errors, 1);

        let mut responses = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        responses.sort_by_key(|r| r.request_id());
        assert_eq!(
            responses,
            vec![
                Response::Success {
                    request_id: RequestId(1),
                    op: Operation::Has
                },
                Response::Error {
                    request_id: RequestId(2),
                    op: Operation::Has,
                    error: WireError::NotFound
                },
            ]
        );
    }
}
