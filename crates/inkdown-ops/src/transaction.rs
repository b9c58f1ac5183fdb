//! Transactions: atomic, ordered batches of operations with their inverses.

use serde::{Deserialize, Serialize};

use crate::Operation;

/// An ordered, non-empty list of operations (the "do" list) plus the
/// matching ordered list of inverse operations (the "undo" list).
///
/// Committed and undone as a single atomic unit. Order within each list is
/// applied left-to-right and must be preserved exactly: a `delete` of a
/// temporarily-empty placeholder block has to follow the `insert` operations
/// replacing its content, never precede them.
///
/// The undo list may be empty — that is the explicit irreversible opt-out
/// used by edits that do not support undo (e.g. cross-document moves); such
/// transactions are transmitted but never reach the undo stack.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Forward operations, in application order.
    #[serde(rename = "doOperations")]
    pub do_ops: Vec<Operation>,
    /// Inverse operations restoring the exact prior observable state.
    #[serde(rename = "undoOperations", default, skip_serializing_if = "Vec::is_empty")]
    pub undo_ops: Vec<Operation>,
}

impl Transaction {
    /// Build a reversible transaction from a forward/inverse pair.
    pub fn new(do_ops: Vec<Operation>, undo_ops: Vec<Operation>) -> Self {
        Self { do_ops, undo_ops }
    }

    /// Build an irreversible transaction (explicit undo opt-out).
    pub fn irreversible(do_ops: Vec<Operation>) -> Self {
        Self { do_ops, undo_ops: Vec::new() }
    }

    /// Whether the forward list is empty (a no-op transaction).
    pub fn is_empty(&self) -> bool {
        self.do_ops.is_empty()
    }

    /// Whether this transaction can be undone.
    pub fn is_reversible(&self) -> bool {
        !self.undo_ops.is_empty()
    }

    /// Number of forward operations.
    pub fn len(&self) -> usize {
        self.do_ops.len()
    }
}
