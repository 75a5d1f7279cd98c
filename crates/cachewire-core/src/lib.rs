//! Cache handle broker and request dispatcher.
//!
//! This crate exposes a per-origin, named-cache storage facility to a remote
//! client through an asynchronous request/response protocol:
//!
//! - Request envelopes are decoded and forwarded to a [`CacheStore`]
//! - Completions are correlated back to their request id, in whatever order
//!   the store finishes them
//! - Cache objects handed to the client are named by small integer handles
//!   tracked in a [`HandleTable`]
//! - Storage errors are translated into the narrower [`WireError`] domain
//!
//! # Quick Start
//!
//! ```no_run
//! use cachewire_core::{Broker, MemoryCacheStore, Origin};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> cachewire_core::BrokerResult<()> {
//! let origin = Origin::from_scope("https://example.com/app/")?;
//! let store = Arc::new(MemoryCacheStore::new());
//! let (responses, mut rx) = mpsc::unbounded_channel();
//!
//! let mut broker = Broker::new(store, origin, responses);
//! broker.handle(br#"{"op":"create","request_id":1,"cache_name":"images"}"#)?;
//! broker.drain().await;
//!
//! println!("{:?}", rx.recv().await);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `CACHEWIRE_SCOPE` | Client scope URL (default: `http://localhost/`) |
//! | `CACHEWIRE_INBOUND_CAPACITY` | Inbound queue bound (default: 256) |
//! | `CACHEWIRE_PRELOAD` | Comma-separated cache names created at startup |
//! | `CACHEWIRE_LOG_FORMAT` | `text` or `json` |

pub mod broker;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handles;
pub mod memory;
pub mod origin;
pub mod protocol;
pub mod sink;
pub mod store;

pub use broker::{Broker, BrokerStats};
pub use config::{BrokerConfig, LogFormat};
pub use dispatcher::{Completion, Outcome, RequestDispatcher};
pub use error::{translate, BrokerError, BrokerResult, ProtocolError, StorageError, WireError};
pub use handles::{CacheId, HandleTable};
pub use memory::{MemoryCache, MemoryCacheStore};
pub use origin::Origin;
pub use protocol::{decode_request, encode_response, Operation, Request, RequestId, Response};
pub use sink::{write_ndjson, ResponseSink};
pub use store::CacheStore;
