//! In-flight commit bookkeeping.
//!
//! Every dispatched batch gets a [`PendingCommit`] entry keyed by its
//! request id. Entries are resolved when the acknowledgment (or a `txerr`
//! push event) arrives — which may be out of dispatch order, since commits
//! are independent requests. The log is bounded: on overflow the oldest
//! entry is dropped with a warning rather than refusing the new commit,
//! because refusing would block typing.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use inkdown_ops::RequestId;
use tracing::{trace, warn};

use crate::constants::MAX_PENDING_COMMITS;

/// One in-flight commit awaiting its asynchronous server acknowledgment.
#[derive(Clone, Debug)]
pub struct PendingCommit {
    pub request_id: RequestId,
    pub doc_id: String,
    /// Number of operations in the batch (diagnostics only).
    pub op_count: usize,
    pub submitted_at: Instant,
}

/// Append-only registry of pending commits for one editor session.
#[derive(Debug, Default)]
pub struct OperationLog {
    pending: HashMap<RequestId, PendingCommit>,
    order: VecDeque<RequestId>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly dispatched commit.
    pub fn record(&mut self, commit: PendingCommit) {
        if self.order.len() >= MAX_PENDING_COMMITS {
            if let Some(oldest) = self.order.pop_front() {
                self.pending.remove(&oldest);
                warn!(
                    %oldest,
                    cap = MAX_PENDING_COMMITS,
                    "pending commit log full, dropping oldest entry"
                );
            }
        }
        trace!(req = %commit.request_id, ops = commit.op_count, "commit pending");
        self.order.push_back(commit.request_id);
        self.pending.insert(commit.request_id, commit);
    }

    /// Resolve a commit by its request id. Returns the entry if it was
    /// still tracked; `None` for unknown or already-resolved ids (late
    /// duplicate signals are normal and ignored).
    pub fn resolve(&mut self, request_id: &RequestId) -> Option<PendingCommit> {
        let commit = self.pending.remove(request_id)?;
        self.order.retain(|id| id != request_id);
        trace!(req = %request_id, "commit resolved");
        Some(commit)
    }

    /// Number of commits still awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop all tracking. Called on session teardown; late acknowledgments
    /// for dropped entries are discarded by the session's epoch guard.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(doc: &str) -> PendingCommit {
        PendingCommit {
            request_id: RequestId::generate(),
            doc_id: doc.to_string(),
            op_count: 1,
            submitted_at: Instant::now(),
        }
    }

    #[test]
    fn test_record_and_resolve() {
        let mut log = OperationLog::new();
        let c = commit("doc-1");
        let id = c.request_id;
        log.record(c);
        assert_eq!(log.pending_count(), 1);

        let resolved = log.resolve(&id).unwrap();
        assert_eq!(resolved.request_id, id);
        assert!(log.is_empty());
    }

    #[test]
    fn test_resolve_unknown_is_none() {
        let mut log = OperationLog::new();
        assert!(log.resolve(&RequestId::generate()).is_none());
    }

    #[test]
    fn test_double_resolve_is_none() {
        let mut log = OperationLog::new();
        let c = commit("doc-1");
        let id = c.request_id;
        log.record(c);
        assert!(log.resolve(&id).is_some());
        assert!(log.resolve(&id).is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut log = OperationLog::new();
        let first = commit("doc-1");
        let first_id = first.request_id;
        log.record(first);
        for _ in 0..MAX_PENDING_COMMITS {
            log.record(commit("doc-1"));
        }
        assert_eq!(log.pending_count(), MAX_PENDING_COMMITS);
        // The very first entry was evicted
        assert!(log.resolve(&first_id).is_none());
    }

    #[test]
    fn test_clear() {
        let mut log = OperationLog::new();
        log.record(commit("doc-1"));
        log.record(commit("doc-1"));
        log.clear();
        assert!(log.is_empty());
    }
}
