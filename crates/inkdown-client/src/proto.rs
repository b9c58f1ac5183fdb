//! Wire types for the commit channel.
//!
//! The backend speaks JSON; these shapes are the contract. Field names are
//! bit-compatible with the existing server (`reqId`, `docID`).

use inkdown_ops::{Operation, RequestId};
use serde::{Deserialize, Serialize};

use crate::constants::CODE_OK;

/// One network batch of forward operations, tagged for correlation.
///
/// Carried as a single `POST`-style request body. The inverse list never
/// goes on the wire — the server only ever sees applied state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Locally generated id correlating the asynchronous ack or `txerr`.
    #[serde(rename = "reqId")]
    pub request_id: RequestId,
    /// Document these operations belong to.
    #[serde(rename = "docID")]
    pub doc_id: String,
    /// Forward operations, in application order.
    pub ops: Vec<Operation>,
}

/// Server response to a commit request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitAck {
    /// `CODE_OK` on success; any other value is a business-logic rejection.
    pub code: i32,
    #[serde(default)]
    pub msg: String,
}

impl CommitAck {
    pub fn ok() -> Self {
        Self { code: CODE_OK, msg: String::new() }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}
