//! Per-editor undo/redo stacks.
//!
//! The stack stores whole [`Transaction`]s — forward list plus inverse
//! list — and performs no merging of its own. Coalescing of rapid
//! same-block keystrokes into one transaction happens at the input layer
//! (caller-side debounce) before `push` is ever called; keeping the stack
//! merge-free keeps its contract simple and testable.

use inkdown_ops::Transaction;
use tracing::trace;

/// Undo/redo stack pair scoped to one editing surface.
///
/// Unbounded by default; [`UndoStack::with_cap`] drops the oldest entry on
/// overflow. Must be cleared when the owning editor instance is destroyed —
/// stale entries referencing removed blocks are a correctness hazard, not
/// just a leak.
#[derive(Debug, Default)]
pub struct UndoStack {
    undo: Vec<Transaction>,
    redo: Vec<Transaction>,
    cap: Option<usize>,
}

impl UndoStack {
    /// New unbounded stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// New stack that keeps at most `cap` undo entries (oldest dropped).
    pub fn with_cap(cap: usize) -> Self {
        Self { undo: Vec::new(), redo: Vec::new(), cap: Some(cap) }
    }

    /// Record a fresh edit. Clears the redo branch: a new edit invalidates
    /// any previously undone future.
    pub fn push(&mut self, tx: Transaction) {
        self.undo.push(tx);
        self.redo.clear();

        if let Some(cap) = self.cap {
            if self.undo.len() > cap {
                trace!(cap, "undo stack full, dropping oldest entry");
                self.undo.remove(0);
            }
        }
    }

    /// Pop the most recent transaction for undo.
    ///
    /// The transaction moves (unchanged) onto the redo stack; the caller
    /// applies its **inverse** list. Silent `None` on empty — this is bound
    /// to a hotkey pressed at arbitrary times, never an error.
    pub fn undo(&mut self) -> Option<Transaction> {
        let tx = self.undo.pop()?;
        self.redo.push(tx.clone());
        Some(tx)
    }

    /// Pop the most recently undone transaction for redo.
    ///
    /// Moves back onto the undo stack; the caller applies its **forward**
    /// list. Silent `None` on empty.
    pub fn redo(&mut self) -> Option<Transaction> {
        let tx = self.redo.pop()?;
        self.undo.push(tx.clone());
        Some(tx)
    }

    /// Empty both stacks. Called on editor-instance teardown.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of undoable transactions.
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Number of redoable transactions.
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}
