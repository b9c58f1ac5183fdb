//! Engine configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Maximum number of in-flight commits tracked per session before the
/// oldest entry is dropped. Commits are independent fire-and-forget
/// requests, so a burst of rapid edits can legitimately have many pending.
pub const MAX_PENDING_COMMITS: usize = 128;

/// Capacity of the health-event broadcast channel UI subscribers consume.
pub const HEALTH_EVENT_CAPACITY: usize = 32;

/// Server result code: commit accepted.
pub const CODE_OK: i32 = 0;

/// Server result code: the whole document is locked (mid-sync or frozen).
/// Escalates to a permanently disabled editing surface — further local
/// edits would be silently lost.
pub const CODE_DOC_LOCKED: i32 = 24;
