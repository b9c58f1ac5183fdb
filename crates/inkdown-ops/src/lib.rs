//! Block operation and transaction model for inkdown.
//!
//! This crate defines the data half of the operation transaction engine:
//! the closed set of block mutations (`Operation`), the reversible batch
//! wrapper (`Transaction`), identifiers, and best-effort structural
//! validation. It has no behavior beyond data-shape checks — transport,
//! undo bookkeeping, and failure handling live in `inkdown-client`.
//!
//! # Design
//!
//! - The JSON field names are the wire contract (`parentID`, `previousID`,
//!   `doOperations`, ...) and must stay bit-compatible with the backend.
//! - Known actions are typed; unknown fields on a known action ride along
//!   in a flattened passthrough bag so nothing is lost in transit.
//! - Forward/inverse pairing is constructed by the editing surface at the
//!   moment of mutation. This crate stores shapes, it never derives
//!   inverses.

mod error;
pub mod ids;
mod op;
mod transaction;
mod validate;

pub use error::ValidateError;
pub use ids::{BlockId, RequestId};
pub use op::{ExtraFields, Operation};
pub use transaction::Transaction;
pub use validate::validate;

/// Result type for operation-model checks.
pub type Result<T> = std::result::Result<T, ValidateError>;
