//! Origin under which named caches are scoped.

use crate::error::{BrokerError, BrokerResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// ASCII serialization of a URL origin (`scheme://host[:port]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// Derive the origin of a scope URL, e.g. `https://example.com/app/` →
    /// `https://example.com`.
    ///
    /// Opaque origins (`data:`, `file:` and friends) are rejected since two of
    /// them never compare equal.
    pub fn from_scope(scope: &str) -> BrokerResult<Self> {
        let url = Url::parse(scope)
            .map_err(|e| BrokerError::config(format!("invalid scope '{}': {}", scope, e)))?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(BrokerError::config(format!(
                "scope '{}' has an opaque origin",
                scope
            )));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
