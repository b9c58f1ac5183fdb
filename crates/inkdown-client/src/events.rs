//! Server-push event types.
//!
//! The backend has an out-of-band push channel (websocket-like) that can
//! deliver failure signals detached from any request/response cycle. These
//! are the typed, deserialized forms the app's event loop routes to each
//! [`EditorSession`](crate::EditorSession).

use inkdown_ops::RequestId;
use serde::{Deserialize, Serialize};

/// Events pushed from server to client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A previously accepted-for-processing commit failed server-side.
    /// Carries the commit identifier so the pending entry can be resolved.
    #[serde(rename = "txerr")]
    TransactionError {
        #[serde(rename = "reqId")]
        request_id: RequestId,
        #[serde(rename = "docID")]
        doc_id: String,
        code: i32,
        msg: String,
    },

    /// The document is mid-sync or otherwise frozen. Editing must stop;
    /// only a fresh load of the document supersedes this.
    DocumentLocked {
        #[serde(rename = "docID")]
        doc_id: String,
        #[serde(default)]
        msg: String,
    },
}
