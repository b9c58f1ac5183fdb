//! Client-side transaction engine for inkdown editors.
//!
//! Everything an editing surface needs between "the user changed the DOM"
//! and "the backend persisted it": per-editor sessions with undo/redo
//! ([`EditorSession`]), fire-and-forget commit transport ([`SyncClient`]),
//! pending-commit correlation ([`OperationLog`]), and the failure
//! reconciler that degrades or disables a session instead of rolling back
//! optimistic edits ([`ErrorReconciler`]).
//!
//! ```text
//!   UI edit ──▶ EditorSession.dispatch ──▶ SyncClient ──▶ backend
//!                    │        ▲                │
//!                undo stack   └── outcomes ◀───┘
//!                oplog            + txerr push events
//!                reconciler ──▶ HealthEvent broadcast ──▶ UI
//! ```

mod constants;
mod events;
mod oplog;
mod proto;
mod reconcile;
mod session;
mod sync;
mod undo;

pub use constants::{CODE_DOC_LOCKED, CODE_OK, HEALTH_EVENT_CAPACITY, MAX_PENDING_COMMITS};
pub use events::ServerEvent;
pub use oplog::{OperationLog, PendingCommit};
pub use proto::{CommitAck, CommitRequest};
pub use reconcile::{ErrorReconciler, HealthEvent, SessionHealth};
pub use session::{EditorSession, SessionEpoch};
pub use sync::{
    CommitError, CommitOutcome, CommitTransport, LoopbackTransport, ScriptedResponse, SyncClient,
    SyncHandle, TransportError,
};
