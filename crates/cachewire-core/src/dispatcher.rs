//! Forwarding of decoded requests to the cache store and correlation of their
//! completions back to responses.
//!
//! Each store call runs on its own spawned task. When it finishes, the task
//! posts a [`Completion`] to the broker's completion channel; the broker's
//! owner task turns it into a [`Response`] via [`RequestDispatcher::complete`].
//! Spawned tasks only hold a weak sender, so a completion that outlives the
//! broker is discarded without touching any broker state.

use crate::error::{translate, StorageError, WireError};
use crate::handles::HandleTable;
use crate::origin::Origin;
use crate::protocol::{Operation, RequestId, Response};
use crate::store::CacheStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Raw store result for one request, before translation.
#[derive(Debug)]
pub enum Outcome<C> {
    /// Get or Create.
    Cache(Result<Arc<C>, StorageError>),
    /// Has.
    Exists(Result<bool, StorageError>),
    /// Delete.
    Deleted(Result<bool, StorageError>),
    /// Keys.
    Names(Result<Vec<String>, StorageError>),
    /// The store call panicked or was cancelled before producing a result.
    Aborted { reason: String },
}

/// A finished store call, tagged with the request it answers.
#[derive(Debug)]
pub struct Completion<C> {
    pub request_id: RequestId,
    pub op: Operation,
    pub outcome: Outcome<C>,
}

pub type CompletionSender<C> = mpsc::UnboundedSender<Completion<C>>;

pub struct RequestDispatcher<S: CacheStore> {
    store: Arc<S>,
    origin: Origin,
    completions: CompletionSender<S::Cache>,
}

impl<S: CacheStore> RequestDispatcher<S> {
    pub fn new(store: Arc<S>, origin: Origin, completions: CompletionSender<S::Cache>) -> Self {
        Self {
            store,
            origin,
            completions,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn get(&self, request_id: RequestId, name: String) {
        self.issue(request_id, Operation::Get, move |store, origin| async move {
            Outcome::Cache(store.get(&origin, &name).await)
        });
    }

    pub fn has(&self, request_id: RequestId, name: String) {
        self.issue(request_id, Operation::Has, move |store, origin| async move {
            Outcome::Exists(store.has(&origin, &name).await)
        });
    }

    pub fn create(&self, request_id: RequestId, name: String) {
        self.issue(request_id, Operation::Create, move |store, origin| async move {
            Outcome::Cache(store.create(&origin, &name).await)
        });
    }

    pub fn delete(&self, request_id: RequestId, name: String) {
        self.issue(request_id, Operation::Delete, move |store, origin| async move {
            Outcome::Deleted(store.delete(&origin, &name).await)
        });
    }

    pub fn keys(&self, request_id: RequestId) {
        self.issue(request_id, Operation::Keys, move |store, origin| async move {
            Outcome::Names(store.enumerate(&origin).await)
        });
    }

    /// Spawn the store call. Returns immediately; the completion arrives on the
    /// broker's channel at some later point.
    ///
    /// Must be called from within a tokio runtime.
    fn issue<F, Fut>(&self, request_id: RequestId, op: Operation, call: F)
    where
        F: FnOnce(Arc<S>, Origin) -> Fut,
        Fut: Future<Output = Outcome<S::Cache>> + Send + 'static,
    {
        let call = call(Arc::clone(&self.store), self.origin.clone());
        let back = self.completions.downgrade();
        let span = tracing::info_span!(
            "cache_storage.call",
            op = op.as_str(),
            request_id = request_id.0,
            origin = %self.origin
        );

        // The call runs in its own task so a panicking store still yields a
        // completion and the request is answered.
        let call = tokio::spawn(call.instrument(span.clone()));
        tokio::spawn(
            async move {
                let outcome = match call.await {
                    Ok(outcome) => outcome,
                    Err(e) => Outcome::Aborted {
                        reason: e.to_string(),
                    },
                };
                let delivered = match back.upgrade() {
                    Some(tx) => tx
                        .send(Completion {
                            request_id,
                            op,
                            outcome,
                        })
                        .is_ok(),
                    None => false,
                };
                if !delivered {
                    tracing::debug!("broker torn down, discarding completion");
                }
            }
            .instrument(span),
        );
    }

    /// Translate a completion into its response. Runs on the broker's owner
    /// task; this is the only place handles are registered.
    pub fn complete(
        &self,
        completion: Completion<S::Cache>,
        handles: &mut HandleTable<S::Cache>,
    ) -> Response {
        let Completion {
            request_id,
            op,
            outcome,
        } = completion;

        match outcome {
            Outcome::Cache(Ok(cache)) => Response::Handle {
                request_id,
                op,
                cache_id: handles.register_or_lookup(&cache),
            },
            Outcome::Exists(Ok(true)) | Outcome::Deleted(Ok(true)) => {
                Response::Success { request_id, op }
            }
            // Existence is reported through the error channel.
            Outcome::Exists(Ok(false)) => Response::Error {
                request_id,
                op,
                error: WireError::NotFound,
            },
            Outcome::Deleted(Ok(false)) => {
                tracing::error!(
                    %request_id,
                    origin = %self.origin,
                    "cache store reported no deletion and no error"
                );
                Response::Error {
                    request_id,
                    op,
                    error: WireError::NotImplemented,
                }
            }
            Outcome::Aborted { reason } => {
                tracing::error!(
                    %request_id,
                    op = op.as_str(),
                    origin = %self.origin,
                    "cache store call aborted: {}",
                    reason
                );
                Response::Error {
                    request_id,
                    op,
                    error: WireError::NotImplemented,
                }
            }
            Outcome::Names(Ok(names)) => Response::Keys { request_id, names },
            Outcome::Cache(Err(err))
            | Outcome::Exists(Err(err))
            | Outcome::Deleted(Err(err))
            | Outcome::Names(Err(err)) => Response::Error {
                request_id,
                op,
                error: translate(&err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCacheStore;

    fn dispatcher() -> (
        RequestDispatcher<MemoryCacheStore>,
        mpsc::UnboundedReceiver<Completion<crate::memory::MemoryCache>>,
    ) {
        let origin = Origin::from_scope("https://example.com/").unwrap();
        let store = Arc::new(MemoryCacheStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        (RequestDispatcher::new(store, origin, tx), rx)
    }

    fn completion<C>(op: Operation, outcome: Outcome<C>) -> Completion<C> {
        Completion {
            request_id: RequestId(11),
            op,
            outcome,
        }
    }

    #[test]
    fn test_has_false_is_not_found_error() {
        let (dispatcher, _rx) = dispatcher();
        let mut handles = HandleTable::new();
        let response = dispatcher.complete(
            completion(Operation::Has, Outcome::Exists(Ok(false))),
            &mut handles,
        );
        assert_eq!(
            response,
            Response::Error {
                request_id: RequestId(11),
                op: Operation::Has,
                error: WireError::NotFound
            }
        );
    }

    #[test]
    fn test_delete_requires_deleted_flag() {
        let (dispatcher, _rx) = dispatcher();
        let mut handles = HandleTable::new();

        let ok = dispatcher.complete(
            completion(Operation::Delete, Outcome::Deleted(Ok(true))),
            &mut handles,
        );
        assert!(matches!(ok, Response::Success { .. }));

        let not_deleted = dispatcher.complete(
            completion(Operation::Delete, Outcome::Deleted(Ok(false))),
            &mut handles,
        );
        assert!(matches!(
            not_deleted,
            Response::Error {
                error: WireError::NotImplemented,
                ..
            }
        ));

        let failed = dispatcher.complete(
            completion(
                Operation::Delete,
                Outcome::Deleted(Err(StorageError::NotFound)),
            ),
            &mut handles,
        );
        assert!(matches!(
            failed,
            Response::Error {
                error: WireError::NotFound,
                ..
            }
        ));
        assert!(handles.is_empty());
    }

    #[test]
    fn test_failed_get_registers_nothing() {
        let (dispatcher, _rx) = dispatcher();
        let mut handles = HandleTable::new();
        let response = dispatcher.complete(
            completion(Operation::Get, Outcome::Cache(Err(StorageError::Closing))),
            &mut handles,
        );
        assert!(matches!(
            response,
            Response::Error {
                error: WireError::NotFound,
                ..
            }
        ));
        assert!(handles.is_empty());
    }

    #[test]
    fn test_aborted_call_is_answered_as_internal_error() {
        let (dispatcher, _rx) = dispatcher();
        let mut handles = HandleTable::new();
        let response = dispatcher.complete(
            completion(
                Operation::Create,
                Outcome::Aborted {
                    reason: "task panicked".to_string(),
                },
            ),
            &mut handles,
        );
        assert_eq!(
            response,
            Response::Error {
                request_id: RequestId(11),
                op: Operation::Create,
                error: WireError::NotImplemented
            }
        );
        assert!(handles.is_empty());
    }

    #[tokio::test]
    async fn test_issued_call_delivers_completion_with_request_id() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher.keys(RequestId(42));

        let completion = rx.recv().await.unwrap();
        assert_eq!(completion.request_id, RequestId(42));
        assert_eq!(completion.op, Operation::Keys);
        assert!(matches!(completion.outcome, Outcome::Names(Ok(ref names)) if names.is_empty()));
    }
}
