//! `TransactionBatch` — groups adjacent edits into one batch transaction,
//! re-committing on every new sub-edit so each keystroke stays undoable
//! individually until `finish` collapses the run (§4.3).

use std::sync::Arc;

use crate::error::SlokedError;
use crate::position::TextPosition;
use crate::transaction::edit::SlokedCursorTransaction;
use crate::transaction::stream::SlokedTransactionStream;

pub struct TransactionBatch {
    stream: Arc<SlokedTransactionStream>,
    children: Vec<SlokedCursorTransaction>,
    open: bool,
}

impl TransactionBatch {
    pub fn new(stream: Arc<SlokedTransactionStream>) -> TransactionBatch {
        TransactionBatch { stream, children: Vec::new(), open: true }
    }

    /// Append `t` to the batch and re-commit the whole batch so far,
    /// rolling back the previous partial commit first if this isn't the
    /// first sub-edit.
    pub fn push(&mut self, t: SlokedCursorTransaction) -> Result<TextPosition, SlokedError> {
        if !self.open {
            return Err(SlokedError::Closed);
        }
        if !self.children.is_empty() {
            self.stream.rollback()?;
        }
        self.children.push(t);
        self.stream.commit(SlokedCursorTransaction::Batch { children: self.children.clone() })
    }

    /// Collapse the batch into a single underlying commit; further `push`
    /// calls are rejected.
    pub fn finish(mut self) -> Vec<SlokedCursorTransaction> {
        self.open = false;
        std::mem::take(&mut self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newline::NewLine;
    use crate::transaction::multiplexer::Multiplexer;

    #[test]
    fn batch_replays_whole_run_on_each_push() {
        let mux = Multiplexer::new("hello", NewLine::Lf);
        let stream = mux.open_stream();
        let mut batch = TransactionBatch::new(stream.clone());
        batch
            .push(SlokedCursorTransaction::Insert { pos: TextPosition::new(0, 5), content: "!".to_string() })
            .unwrap();
        batch
            .push(SlokedCursorTransaction::Insert { pos: TextPosition::new(0, 6), content: "?".to_string() })
            .unwrap();
        assert_eq!(mux.document_text(), "hello!?");
        let children = batch.finish();
        assert_eq!(children.len(), 2);
    }
}
