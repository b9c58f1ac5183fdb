//! The sync client: transmits commit batches and correlates acknowledgments.
//!
//! ```text
//!   EditorSession            mpsc          SyncClient actor
//!   ┌──────────────┐  ───────────────▶  ┌─────────────────────────┐
//!   │ .dispatch()  │   SyncCommand       │ one spawned task per    │
//!   │ .undo()      │                     │ request — commits are   │
//!   │ .redo()      │  ◀───────────────   │ NOT serialized against  │
//!   └──────────────┘   CommitOutcome     │ each other              │
//!                        channel         └─────────────────────────┘
//! ```
//!
//! Submissions enter in dispatch order over an unbounded channel; each one
//! is then committed on its own task, so acknowledgments can arrive in any
//! order and one slow request never blocks the next keystroke's commit.
//! There is no retry (operations are not idempotent — a replayed `insert`
//! duplicates a node) and no cancellation: a session that dies while a
//! commit is in flight simply ignores the late outcome via its epoch guard.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::constants::{CODE_DOC_LOCKED, CODE_OK};
use crate::proto::{CommitAck, CommitRequest};
use crate::session::SessionEpoch;

// ============================================================================
// Errors
// ============================================================================

/// Transport-level failure: the request never produced a server verdict.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("server unreachable: {0}")]
    Unreachable(String),
}

/// Why a commit did not take effect on the server.
///
/// The engine does not distinguish causes beyond what the user is shown;
/// `Rejected` and `Unreachable` get identical handling (warn, don't block,
/// never roll back). `Locked` is the one escalation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitError {
    /// Business-logic rejection (stale block id, permission, ...).
    #[error("commit rejected (code {code}): {msg}")]
    Rejected { code: i32, msg: String },

    /// Network/transport failure before any server verdict.
    #[error("commit unreachable: {0}")]
    Unreachable(String),

    /// The whole document is locked; the editing surface must go read-only.
    #[error("document locked: {0}")]
    Locked(String),
}

// ============================================================================
// Transport seam
// ============================================================================

/// The one true suspension point of the engine: a `POST`-style JSON
/// request/response primitive.
///
/// Implementations must not retry internally — a failed commit is terminal
/// for its transaction and surfaces through the reconciler.
#[async_trait]
pub trait CommitTransport: Send + Sync {
    async fn commit(&self, req: CommitRequest) -> Result<CommitAck, TransportError>;
}

// ============================================================================
// Outcomes
// ============================================================================

/// Resolution of one in-flight commit, posted on the outcome channel.
///
/// Tagged with the submitting session's epoch so outcomes that land after
/// the session was torn down (or superseded by a fresh load) are discarded
/// instead of touching dead state.
#[derive(Clone, Debug)]
pub struct CommitOutcome {
    pub request_id: inkdown_ops::RequestId,
    pub doc_id: String,
    pub epoch: SessionEpoch,
    pub result: Result<(), CommitError>,
}

// ============================================================================
// SyncClient actor
// ============================================================================

enum SyncCommand {
    Submit { req: CommitRequest, epoch: SessionEpoch },
}

/// Cheap, cloneable handle for fire-and-forget submissions.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    /// Queue a commit. Never blocks and never reports transport results to
    /// the caller — completion is observed only on the outcome channel.
    pub fn submit(&self, req: CommitRequest, epoch: SessionEpoch) {
        if self.tx.send(SyncCommand::Submit { req, epoch }).is_err() {
            warn!("sync client is gone, dropping commit");
        }
    }
}

/// Spawns the commit actor.
pub struct SyncClient;

impl SyncClient {
    /// Spawn the actor on the current tokio runtime.
    ///
    /// Returns the submission handle plus the outcome channel the app's
    /// event loop drains and routes to sessions (by doc id and epoch).
    pub fn spawn(
        transport: Arc<dyn CommitTransport>,
    ) -> (SyncHandle, mpsc::UnboundedReceiver<CommitOutcome>) {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(SyncCommand::Submit { req, epoch }) = cmd_rx.recv().await {
                let transport = Arc::clone(&transport);
                let out_tx = out_tx.clone();
                // Independent task per request: no client-side serialization
                // of commits, the backend arbitrates ordering.
                tokio::spawn(async move {
                    let request_id = req.request_id;
                    let doc_id = req.doc_id.clone();
                    trace!(req = %request_id, ops = req.ops.len(), "committing");
                    let result = match transport.commit(req).await {
                        Ok(ack) if ack.code == CODE_OK => Ok(()),
                        Ok(ack) if ack.code == CODE_DOC_LOCKED => {
                            Err(CommitError::Locked(ack.msg))
                        }
                        Ok(ack) => Err(CommitError::Rejected { code: ack.code, msg: ack.msg }),
                        Err(TransportError::Unreachable(msg)) => {
                            Err(CommitError::Unreachable(msg))
                        }
                    };
                    if let Err(e) = &result {
                        debug!(req = %request_id, error = %e, "commit failed");
                    }
                    let _ = out_tx.send(CommitOutcome { request_id, doc_id, epoch, result });
                });
            }
            debug!("sync client shutting down: channel closed");
        });

        (SyncHandle { tx: cmd_tx }, out_rx)
    }
}

// ============================================================================
// Loopback transport (for testing)
// ============================================================================

/// Scripted verdict the [`LoopbackTransport`] returns for one request.
#[derive(Clone, Debug)]
pub enum ScriptedResponse {
    Ok,
    Reject { code: i32, msg: String },
    Locked { msg: String },
    Unreachable { msg: String },
}

type Responder = dyn Fn(&CommitRequest) -> ScriptedResponse + Send + Sync;

/// In-memory transport for testing — the loopback analogue of a real
/// network client. Records every request it sees and answers via an
/// optional programmable responder (default: accept everything).
#[derive(Default)]
pub struct LoopbackTransport {
    requests: Mutex<Vec<CommitRequest>>,
    responder: Mutex<Option<Box<Responder>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a verdict function consulted per request.
    pub fn set_responder(
        &self,
        f: impl Fn(&CommitRequest) -> ScriptedResponse + Send + Sync + 'static,
    ) {
        *self.responder.lock() = Some(Box::new(f));
    }

    /// Every request committed so far, in transport-arrival order.
    pub fn requests(&self) -> Vec<CommitRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CommitTransport for LoopbackTransport {
    async fn commit(&self, req: CommitRequest) -> Result<CommitAck, TransportError> {
        let verdict = self
            .responder
            .lock()
            .as_ref()
            .map(|f| f(&req))
            .unwrap_or(ScriptedResponse::Ok);
        self.requests.lock().push(req);
        match verdict {
            ScriptedResponse::Ok => Ok(CommitAck::ok()),
            ScriptedResponse::Reject { code, msg } => Ok(CommitAck { code, msg }),
            ScriptedResponse::Locked { msg } => Ok(CommitAck { code: CODE_DOC_LOCKED, msg }),
            ScriptedResponse::Unreachable { msg } => Err(TransportError::Unreachable(msg)),
        }
    }
}
