//! Block document operations.
//!
//! Every structural or content mutation to the document tree is expressed as
//! an operation. Operations are:
//! - Serializable for network transmission (the JSON field names are the
//!   wire contract and must stay bit-compatible with the backend)
//! - Reversible: callers construct a paired inverse operation at the moment
//!   of mutation — the engine stores and replays pairs, it never infers them
//!
//! The action tag set is closed; unknown *fields* on a known action are
//! carried through the flattened `extra` bag unmodified, so feature payloads
//! this engine does not interpret survive a decode/encode round trip.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::BlockId;

/// Passthrough bag for per-action fields the engine does not interpret.
pub type ExtraFields = serde_json::Map<String, Value>;

/// Operations on block documents.
///
/// Internally tagged on the wire as `"action"`. For `insert`/`update`,
/// `data` carries the serialized block content (an HTML-like fragment for
/// one block subtree). Placement is anchored by `parentID` (first child of)
/// or `previousID` (sibling after); when both are absent on `insert` the
/// block is appended under the implicit root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(tag = "action", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Operation {
    /// Insert a new block.
    Insert {
        /// ID of the new block.
        id: BlockId,
        /// Serialized block content. Required; validated before send.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        /// Anchor: insert as first child of this block.
        #[serde(rename = "parentID", default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<BlockId>,
        /// Anchor: insert as the sibling after this block.
        #[serde(rename = "previousID", default, skip_serializing_if = "Option::is_none")]
        previous_id: Option<BlockId>,
        #[serde(flatten, default)]
        extra: ExtraFields,
    },

    /// Replace a block's content in place.
    Update {
        id: BlockId,
        /// Serialized block content. Required; validated before send.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(flatten, default)]
        extra: ExtraFields,
    },

    /// Delete a block. The anchors record where it was, so the paired
    /// inverse `insert` can restore the exact prior position.
    Delete {
        id: BlockId,
        #[serde(rename = "parentID", default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<BlockId>,
        #[serde(rename = "previousID", default, skip_serializing_if = "Option::is_none")]
        previous_id: Option<BlockId>,
        #[serde(flatten, default)]
        extra: ExtraFields,
    },

    /// Re-anchor an existing block among its siblings.
    Move {
        id: BlockId,
        #[serde(rename = "parentID", default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<BlockId>,
        #[serde(rename = "previousID", default, skip_serializing_if = "Option::is_none")]
        previous_id: Option<BlockId>,
        #[serde(flatten, default)]
        extra: ExtraFields,
    },

    /// Append a block as the last child of `parentID`.
    Append {
        id: BlockId,
        #[serde(rename = "parentID", default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<BlockId>,
        #[serde(flatten, default)]
        extra: ExtraFields,
    },

    /// Touch a block's updated-timestamp without content change.
    DoUpdateUpdated {
        id: BlockId,
        /// The timestamp payload, opaque to the engine.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(flatten, default)]
        extra: ExtraFields,
    },

    /// Bind blocks into an attribute view. Payload is transported opaquely.
    InsertAttrViewBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<BlockId>,
        #[serde(rename = "avID")]
        av_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        srcs: Vec<Value>,
        #[serde(rename = "blockID", default, skip_serializing_if = "Option::is_none")]
        block_id: Option<BlockId>,
        #[serde(rename = "previousID", default, skip_serializing_if = "Option::is_none")]
        previous_id: Option<BlockId>,
        #[serde(
            rename = "ignoreFillFilter",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        ignore_fill_filter: Option<bool>,
        #[serde(flatten, default)]
        extra: ExtraFields,
    },

    /// Unbind blocks from an attribute view. Payload is transported opaquely.
    RemoveAttrViewBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<BlockId>,
        #[serde(rename = "avID")]
        av_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        srcs: Vec<Value>,
        #[serde(flatten, default)]
        extra: ExtraFields,
    },
}

impl Operation {
    /// The wire name of this operation's action tag.
    pub fn action(&self) -> &str {
        self.as_ref()
    }

    /// The block this operation targets, if it names one.
    pub fn target(&self) -> Option<&BlockId> {
        match self {
            Operation::Insert { id, .. }
            | Operation::Update { id, .. }
            | Operation::Delete { id, .. }
            | Operation::Move { id, .. }
            | Operation::Append { id, .. }
            | Operation::DoUpdateUpdated { id, .. } => Some(id),
            Operation::InsertAttrViewBlock { id, .. }
            | Operation::RemoveAttrViewBlock { id, .. } => id.as_ref(),
        }
    }

    /// Whether this operation changes block ordering or existence.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Operation::Insert { .. }
                | Operation::Delete { .. }
                | Operation::Move { .. }
                | Operation::Append { .. }
        )
    }

    /// Whether the wire contract requires a `data` payload for this action.
    pub fn requires_data(&self) -> bool {
        matches!(self, Operation::Insert { .. } | Operation::Update { .. })
    }

    /// The serialized content payload, when present.
    pub fn data(&self) -> Option<&str> {
        match self {
            Operation::Insert { data, .. }
            | Operation::Update { data, .. }
            | Operation::DoUpdateUpdated { data, .. } => data.as_deref(),
            _ => None,
        }
    }
}
