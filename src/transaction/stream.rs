//! `SlokedTransactionStream` — a per-writer undo/redo stack over a
//! document, serialised by its owning `Multiplexer` (§4.3).

use std::sync::{Arc, Mutex};

use crate::error::SlokedError;
use crate::position::TextPosition;
use crate::transaction::edit::SlokedCursorTransaction;
use crate::transaction::patch::SlokedTransactionPatch;

pub type StreamListener = Box<dyn Fn(StreamEvent) + Send + Sync>;

#[derive(Clone)]
pub enum StreamEvent {
    Commit(TextPosition),
    Rollback(TextPosition),
    RevertRollback(TextPosition),
}

/// The undo/redo bookkeeping belonging to one stream. Sibling streams'
/// instances are what the multiplexer rebases on every commit (§4.3).
#[derive(Default)]
pub struct StreamState {
    pub undo: Vec<SlokedCursorTransaction>,
    pub redo: Vec<SlokedCursorTransaction>,
}

impl StreamState {
    /// Rebase every pending transaction in both stacks against a sibling's
    /// just-committed patch, so recorded positions stay meaningful.
    pub fn rebase(&mut self, patch: &SlokedTransactionPatch) {
        for t in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            *t = rebase_transaction(t, patch);
        }
    }
}

fn rebase_transaction(t: &SlokedCursorTransaction, patch: &SlokedTransactionPatch) -> SlokedCursorTransaction {
    match t.clone() {
        SlokedCursorTransaction::Insert { pos, content } => {
            SlokedCursorTransaction::Insert { pos: patch.apply(pos), content }
        }
        SlokedCursorTransaction::Newline { pos, content } => {
            SlokedCursorTransaction::Newline { pos: patch.apply(pos), content }
        }
        SlokedCursorTransaction::DeleteForward { pos, deleted, width } => {
            SlokedCursorTransaction::DeleteForward { pos: patch.apply(pos), deleted, width }
        }
        SlokedCursorTransaction::DeleteBackward { pos, deleted, width } => {
            SlokedCursorTransaction::DeleteBackward { pos: patch.apply(pos), deleted, width }
        }
        SlokedCursorTransaction::Clear { from, to, replaced_lines } => {
            SlokedCursorTransaction::Clear { from: patch.apply(from), to: patch.apply(to), replaced_lines }
        }
        SlokedCursorTransaction::Batch { children } => SlokedCursorTransaction::Batch {
            children: children.iter().map(|c| rebase_transaction(c, patch)).collect(),
        },
    }
}

/// A handle into a `Multiplexer`'s stream table (§4.3, §9: streams observe
/// the multiplexer through a non-owning handle invalidated on close).
pub struct SlokedTransactionStream {
    pub(crate) id: usize,
    pub(crate) inner: Arc<Mutex<crate::transaction::multiplexer::MultiplexerInner>>,
    listeners: Mutex<Vec<(u64, StreamListener)>>,
    next_listener: std::sync::atomic::AtomicU64,
}

impl SlokedTransactionStream {
    pub(crate) fn new(id: usize, inner: Arc<Mutex<crate::transaction::multiplexer::MultiplexerInner>>) -> Self {
        SlokedTransactionStream {
            id,
            inner,
            listeners: Mutex::new(Vec::new()),
            next_listener: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn add_listener(&self, listener: StreamListener) -> u64 {
        let id = self.next_listener.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.listeners.lock().unwrap().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: u64) {
        self.listeners.lock().unwrap().retain(|(lid, _)| *lid != id);
    }

    pub(crate) fn fan_out(&self, event: StreamEvent) {
        let listeners = self.listeners.lock().unwrap();
        for (_, listener) in listeners.iter() {
            listener(event.clone());
        }
    }

    pub fn commit(&self, t: SlokedCursorTransaction) -> Result<TextPosition, SlokedError> {
        crate::transaction::multiplexer::Multiplexer::commit_on(self, t)
    }

    pub fn has_rollback(&self) -> bool {
        crate::transaction::multiplexer::Multiplexer::has_rollback_on(self)
    }

    pub fn rollback(&self) -> Result<TextPosition, SlokedError> {
        crate::transaction::multiplexer::Multiplexer::rollback_on(self)
    }

    pub fn has_revertable(&self) -> bool {
        crate::transaction::multiplexer::Multiplexer::has_revertable_on(self)
    }

    pub fn revert_rollback(&self) -> Result<TextPosition, SlokedError> {
        crate::transaction::multiplexer::Multiplexer::revert_rollback_on(self)
    }
}

impl std::fmt::Debug for StreamEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamEvent::Commit(p) => write!(f, "Commit({p:?})"),
            StreamEvent::Rollback(p) => write!(f, "Rollback({p:?})"),
            StreamEvent::RevertRollback(p) => write!(f, "RevertRollback({p:?})"),
        }
    }
}
