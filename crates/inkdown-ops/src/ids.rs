//! Identifiers for blocks and commit requests.
//!
//! Block ids are assigned by the editing surface at block-creation time and
//! are opaque to the engine — stable, globally unique strings that are never
//! reused. Request ids are generated locally per commit so asynchronous
//! acknowledgments (which may arrive out of order) can be correlated back to
//! the dispatch site.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one block in the document tree.
///
/// The engine never parses the contents; it only compares and transports
/// them. `generate()` is provided for callers creating fresh blocks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Wrap an existing block id from the editing surface.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh, time-ordered block id (UUIDv7, compact form).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// The raw string form, as it appears on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Locally generated identifier correlating one commit request with its
/// asynchronous acknowledgment or `txerr` push event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh request id (UUIDv7, so ids sort by creation time).
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_roundtrips_as_plain_string() {
        let id = BlockId::new("20240601120000-abc1234");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"20240601120000-abc1234\"");
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_generated_block_ids_are_unique() {
        let a = BlockId::generate();
        let b = BlockId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_ids_sort_by_creation() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        // v7 ids are time-ordered
        assert!(a.to_string() <= b.to_string());
    }
}
