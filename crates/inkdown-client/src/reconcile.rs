//! Failure reconciliation: translating async commit failures into
//! user-visible, recoverable session states.
//!
//! # State Machine
//!
//! ```text
//! +------+  commit rejected / unreachable   +----------+
//! | Live | -------------------------------> | Degraded |
//! +------+   (warn, editing NOT blocked)    +----------+
//!     |                                          |
//!     |        document locked / syncing         |
//!     +--------------------+---------------------+
//!                          v
//!                +-----------------+
//!                | DisabledForever |  terminal — only a fresh load of the
//!                +-----------------+  document supersedes this session
//! ```
//!
//! Intentionally coarse: no operation-level conflict resolution, no CRDT
//! merge, no three-way diff. Last local intent wins; the server may reject
//! wholesale. Local optimistic state is never rolled back.

use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::constants::HEALTH_EVENT_CAPACITY;
use crate::sync::CommitError;

/// Editing-surface health for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionHealth {
    /// Normal operation.
    Live,
    /// At least one commit failed; a warning is shown, editing continues —
    /// the local optimistic state may still be valid.
    Degraded,
    /// The document is locked server-side. The surface is forced read-only
    /// until a fresh load replaces this session. No automatic recovery.
    DisabledForever,
}

/// What the UI layer should show for a health transition.
#[derive(Clone, Debug)]
pub enum HealthEvent {
    /// Transient toast/message; editing continues.
    CommitFailed { message: String },
    /// Persistent banner; the surface goes read-only.
    Disabled { message: String },
}

/// Per-session failure reconciler.
///
/// UI code registers for transitions via [`ErrorReconciler::subscribe`]
/// (the `onCommitError` surface); the session routes commit outcomes and
/// push events here. State is discarded with the session — error state
/// never persists across instances.
#[derive(Debug)]
pub struct ErrorReconciler {
    health: SessionHealth,
    events: broadcast::Sender<HealthEvent>,
}

impl Default for ErrorReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReconciler {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(HEALTH_EVENT_CAPACITY);
        Self { health: SessionHealth::Live, events }
    }

    pub fn health(&self) -> SessionHealth {
        self.health
    }

    /// Whether every mutation path must be refused.
    pub fn is_read_only(&self) -> bool {
        self.health == SessionHealth::DisabledForever
    }

    /// Register for health transitions (UI toasts/banners).
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.events.subscribe()
    }

    /// Route a commit failure. `Rejected` and `Unreachable` degrade (warn,
    /// don't block); `Locked` disables permanently.
    pub fn on_commit_failure(&mut self, err: &CommitError) {
        match err {
            CommitError::Locked(msg) => self.on_document_locked(msg),
            CommitError::Rejected { .. } | CommitError::Unreachable(_) => {
                if self.health == SessionHealth::DisabledForever {
                    // Terminal state absorbs everything.
                    return;
                }
                warn!(error = %err, "commit failed, session degraded");
                self.health = SessionHealth::Degraded;
                // Every failure surfaces a message, not just the first.
                let _ = self.events.send(HealthEvent::CommitFailed { message: err.to_string() });
            }
        }
    }

    /// The document is mid-sync or frozen. Terminal.
    pub fn on_document_locked(&mut self, msg: &str) {
        if self.health == SessionHealth::DisabledForever {
            return;
        }
        error!(msg, "document locked, disabling editing surface");
        self.health = SessionHealth::DisabledForever;
        let _ = self.events.send(HealthEvent::Disabled { message: msg.to_string() });
    }
}
