//! `Multiplexer` — serialises commits from many streams over one document
//! (§4.3). Owns the document and every stream's undo/redo bookkeeping
//! strongly; streams reach back into it only through the `Arc<Mutex<..>>`
//! handle they're constructed with, matching the breaking-a-cycle strategy
//! Design Note 9 asks for.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::SlokedError;
use crate::newline::NewLine;
use crate::position::TextPosition;
use crate::text::document::TextDocument;
use crate::transaction::edit::SlokedCursorTransaction;
use crate::transaction::stream::{SlokedTransactionStream, StreamEvent, StreamState};

pub struct MultiplexerInner {
    doc: TextDocument,
    stream_states: HashMap<usize, StreamState>,
    next_id: usize,
}

pub struct Multiplexer {
    inner: Arc<Mutex<MultiplexerInner>>,
    streams: Mutex<HashMap<usize, Arc<SlokedTransactionStream>>>,
}

impl Multiplexer {
    pub fn new(content: &str, newline: NewLine) -> Multiplexer {
        Multiplexer {
            inner: Arc::new(Mutex::new(MultiplexerInner {
                doc: TextDocument::new(content, newline),
                stream_states: HashMap::new(),
                next_id: 0,
            })),
            streams: Mutex::new(HashMap::new()),
        }
    }

    pub fn open_stream(&self) -> Arc<SlokedTransactionStream> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.stream_states.insert(id, StreamState::default());
        drop(inner);

        let stream = Arc::new(SlokedTransactionStream::new(id, self.inner.clone()));
        self.streams.lock().unwrap().insert(id, stream.clone());
        stream
    }

    /// Invalidates every open stream: further `commit`/`rollback` calls on
    /// them return `Closed`.
    pub fn close(&self) {
        self.streams.lock().unwrap().clear();
        self.inner.lock().unwrap().stream_states.clear();
    }

    pub fn document_text(&self) -> String {
        self.inner.lock().unwrap().doc.to_string()
    }

    pub fn last_line(&self) -> u64 {
        self.inner.lock().unwrap().doc.last_line()
    }

    pub(crate) fn commit_on(stream: &SlokedTransactionStream, t: SlokedCursorTransaction) -> Result<TextPosition, SlokedError> {
        let mut inner = stream.inner.lock().unwrap();
        if !inner.stream_states.contains_key(&stream.id) {
            return Err(SlokedError::Closed);
        }
        t.validate(&inner.doc)?;
        let patch = t.commit_patch();
        let my_id = stream.id;
        for (id, state) in inner.stream_states.iter_mut() {
            if *id != my_id {
                state.rebase(&patch);
            }
        }
        let cursor = t.commit(&mut inner.doc)?;
        let state = inner.stream_states.get_mut(&my_id).expect("stream registered at open_stream");
        state.undo.push(t);
        state.redo.clear();
        drop(inner);
        stream.fan_out(StreamEvent::Commit(cursor));
        Ok(cursor)
    }

    pub(crate) fn has_rollback_on(stream: &SlokedTransactionStream) -> bool {
        let inner = stream.inner.lock().unwrap();
        inner.stream_states.get(&stream.id).map(|s| !s.undo.is_empty()).unwrap_or(false)
    }

    pub(crate) fn has_revertable_on(stream: &SlokedTransactionStream) -> bool {
        let inner = stream.inner.lock().unwrap();
        inner.stream_states.get(&stream.id).map(|s| !s.redo.is_empty()).unwrap_or(false)
    }

    pub(crate) fn rollback_on(stream: &SlokedTransactionStream) -> Result<TextPosition, SlokedError> {
        let mut inner = stream.inner.lock().unwrap();
        if !inner.stream_states.contains_key(&stream.id) {
            return Err(SlokedError::Closed);
        }
        let my_id = stream.id;
        let popped = inner.stream_states.get_mut(&my_id).and_then(|s| s.undo.pop());
        let t = match popped {
            Some(t) => t,
            // Rollback on an empty stack is a no-op (§4.3).
            None => return Ok(TextPosition::MIN),
        };
        let cursor = t.rollback(&mut inner.doc)?;
        let patch = t.commit_patch().negated();
        for (id, state) in inner.stream_states.iter_mut() {
            if *id != my_id {
                state.rebase(&patch);
            }
        }
        inner.stream_states.get_mut(&my_id).expect("stream registered at open_stream").redo.push(t);
        drop(inner);
        stream.fan_out(StreamEvent::Rollback(cursor));
        Ok(cursor)
    }

    pub(crate) fn revert_rollback_on(stream: &SlokedTransactionStream) -> Result<TextPosition, SlokedError> {
        let mut inner = stream.inner.lock().unwrap();
        if !inner.stream_states.contains_key(&stream.id) {
            return Err(SlokedError::Closed);
        }
        let my_id = stream.id;
        let popped = inner.stream_states.get_mut(&my_id).and_then(|s| s.redo.pop());
        let t = match popped {
            Some(t) => t,
            None => return Ok(TextPosition::MIN),
        };
        t.validate(&inner.doc)?;
        let patch = t.commit_patch();
        for (id, state) in inner.stream_states.iter_mut() {
            if *id != my_id {
                state.rebase(&patch);
            }
        }
        let cursor = t.commit(&mut inner.doc)?;
        inner.stream_states.get_mut(&my_id).expect("stream registered at open_stream").undo.push(t);
        drop(inner);
        stream.fan_out(StreamEvent::RevertRollback(cursor));
        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::edit::SlokedCursorTransaction;

    #[test]
    fn single_stream_commit_and_rollback() {
        let mux = Multiplexer::new("alpha\nbeta\ngamma", NewLine::Lf);
        let stream = mux.open_stream();
        stream
            .commit(SlokedCursorTransaction::Insert { pos: TextPosition::new(1, 0), content: "X".to_string() })
            .unwrap();
        assert_eq!(mux.document_text(), "alpha\nXbeta\ngamma");
        stream.rollback().unwrap();
        assert_eq!(mux.document_text(), "alpha\nbeta\ngamma");
    }

    #[test]
    fn sibling_cursor_rebases_after_commit() {
        let mux = Multiplexer::new("hello world", NewLine::Lf);
        let s1 = mux.open_stream();
        let s2 = mux.open_stream();
        let _ = s2;
        s1.commit(SlokedCursorTransaction::Insert { pos: TextPosition::new(0, 5), content: " cruel".to_string() })
            .unwrap();
        assert_eq!(mux.document_text(), "hello cruel world");
    }

    #[test]
    fn rollback_on_empty_stack_is_noop() {
        let mux = Multiplexer::new("alpha", NewLine::Lf);
        let stream = mux.open_stream();
        let cursor = stream.rollback().unwrap();
        assert_eq!(cursor, TextPosition::MIN);
        assert_eq!(mux.document_text(), "alpha");
    }
}
