//! Reversible edits, position patches, per-stream undo/redo, and the
//! multiplexer that serialises commits across streams (§3, §4.2–4.3).

pub mod batch;
pub mod edit;
pub mod multiplexer;
pub mod patch;
pub mod stream;

pub use batch::TransactionBatch;
pub use edit::SlokedCursorTransaction;
pub use multiplexer::Multiplexer;
pub use patch::SlokedTransactionPatch;
pub use stream::{SlokedTransactionStream, StreamEvent};
