//! Error types for the operation model.

use thiserror::Error;

use crate::BlockId;

/// Local structural-validation failures.
///
/// These never reach the network: the edit already happened on screen, so
/// the policy is fail-open — the batch is dropped and the failure is logged,
/// never surfaced as a user-facing error. The server stays authoritative.
#[derive(Error, Debug, PartialEq)]
pub enum ValidateError {
    /// An `insert`/`update` arrived without its `data` payload.
    #[error("{action} operation on {id} is missing its data payload")]
    MissingData { action: String, id: BlockId },

    /// A freshly introduced block names an anchor that is neither in the
    /// caller-tracked tree snapshot nor introduced earlier in the batch.
    #[error("insert of {id} anchors on unknown block {anchor}")]
    UnresolvedAnchor { id: BlockId, anchor: BlockId },
}
