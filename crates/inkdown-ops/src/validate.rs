//! Best-effort structural validation of operation batches.
//!
//! Pure data-shape checks with no side effects, run before a batch is
//! handed to the sync client. This is local sanity checking only — the
//! server remains authoritative, and a validation failure means the batch
//! is dropped with a log line, not that the user is blocked from editing.

use std::collections::HashSet;

use crate::{BlockId, Operation, ValidateError};

/// Validate a batch against the block-id snapshot the caller tracks.
///
/// Checks, scanning left-to-right so in-batch anchors resolve (an `insert`
/// may anchor on a block introduced earlier in the same batch):
/// - `insert`/`update` must carry `data`;
/// - an `insert` of a block not already in `known` must anchor on a
///   resolvable block — or on nothing at all, which means append under the
///   implicit root.
///
/// Anchor resolvability is only enforced for fresh ids; re-anchoring blocks
/// the snapshot already knows is left to the server to arbitrate.
pub fn validate(ops: &[Operation], known: &HashSet<BlockId>) -> Result<(), ValidateError> {
    let mut introduced: HashSet<&BlockId> = HashSet::new();

    for op in ops {
        if op.requires_data() && op.data().is_none() {
            return Err(ValidateError::MissingData {
                action: op.action().to_string(),
                id: op.target().cloned().unwrap_or_else(|| BlockId::new("")),
            });
        }

        if let Operation::Insert { id, parent_id, previous_id, .. } = op {
            let fresh = !known.contains(id);
            if fresh {
                for anchor in [parent_id, previous_id].into_iter().flatten() {
                    if !known.contains(anchor) && !introduced.contains(anchor) {
                        return Err(ValidateError::UnresolvedAnchor {
                            id: id.clone(),
                            anchor: anchor.clone(),
                        });
                    }
                }
            }
            introduced.insert(id);
        }
    }

    Ok(())
}
