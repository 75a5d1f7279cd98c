//! Wire envelopes exchanged with the remote client.
//!
//! Envelopes are single JSON objects (one per line on stream transports).
//! Requests are tagged by `op`, responses by `status`.

use crate::error::{ProtocolError, WireError};
use crate::handles::CacheId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-chosen correlation id, echoed verbatim in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operations that complete through the store and produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Get,
    Has,
    Create,
    Delete,
    Keys,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Has => "has",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Keys => "keys",
        }
    }
}

/// Every `op` tag the decoder accepts.
pub const KNOWN_OPERATIONS: &[&str] = &["get", "has", "create", "delete", "keys", "dispose_handle"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Get {
        request_id: RequestId,
        cache_name: String,
    },
    Has {
        request_id: RequestId,
        cache_name: String,
    },
    Create {
        request_id: RequestId,
        cache_name: String,
    },
    Delete {
        request_id: RequestId,
        cache_name: String,
    },
    Keys {
        request_id: RequestId,
    },
    /// Fire-and-forget; never answered.
    DisposeHandle {
        handle: CacheId,
    },
}

impl Request {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Get { request_id, .. }
            | Self::Has { request_id, .. }
            | Self::Create { request_id, .. }
            | Self::Delete { request_id, .. }
            | Self::Keys { request_id } => Some(*request_id),
            Self::DisposeHandle { .. } => None,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Get { .. } => Some(Operation::Get),
            Self::Has { .. } => Some(Operation::Has),
            Self::Create { .. } => Some(Operation::Create),
            Self::Delete { .. } => Some(Operation::Delete),
            Self::Keys { .. } => Some(Operation::Keys),
            Self::DisposeHandle { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Get/Create succeeded; the cache is reachable through `cache_id`.
    Handle {
        request_id: RequestId,
        op: Operation,
        cache_id: CacheId,
    },
    /// Has/Delete succeeded.
    Success {
        request_id: RequestId,
        op: Operation,
    },
    /// Keys succeeded.
    Keys {
        request_id: RequestId,
        names: Vec<String>,
    },
    Error {
        request_id: RequestId,
        op: Operation,
        error: WireError,
    },
}

impl Response {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Handle { request_id, .. }
            | Self::Success { request_id, .. }
            | Self::Keys { request_id, .. }
            | Self::Error { request_id, .. } => *request_id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Decode one inbound envelope.
///
/// Unknown operations are distinguished from malformed ones so the caller can
/// report which it was.
pub fn decode_request(envelope: &[u8]) -> Result<Request, ProtocolError> {
    let value: Value = serde_json::from_slice(envelope).map_err(ProtocolError::Malformed)?;
    let op = match value.get("op") {
        Some(Value::String(op)) => op.clone(),
        Some(other) => return Err(ProtocolError::UnknownOperation(other.to_string())),
        None => return Err(ProtocolError::MissingOperation),
    };
    if !KNOWN_OPERATIONS.contains(&op.as_str()) {
        return Err(ProtocolError::UnknownOperation(op));
    }
    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidFields { op, source })
}

/// Encode a response as a single JSON line (no trailing newline).
pub fn encode_response(response: &Response) -> serde_json::Result<String> {
    serde_json::to_string(response)
}
