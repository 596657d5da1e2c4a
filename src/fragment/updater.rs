//! `FragmentUpdater` — subscribes to a transaction stream and keeps a
//! `FragmentCache` in step with commits/rollbacks (§4.4).

use std::sync::{Arc, Mutex};

use crate::transaction::stream::{SlokedTransactionStream, StreamEvent};

/// Owns a `FragmentCache` and a listener registration on the stream it
/// watches. On every `Commit`/`Rollback`/`RevertRollback` it invalidates the
/// cache from the edit's earliest affected position onward and rewinds the
/// upstream tagger to match (§4.4: "invalidates cache entries whose range
/// intersects the edit, and rewinds upstream to the earliest affected
/// position").
pub struct FragmentUpdater<T> {
    cache: Arc<Mutex<crate::fragment::FragmentCache<T>>>,
    stream: Arc<SlokedTransactionStream>,
    listener_id: u64,
}

impl<T: Send + 'static> FragmentUpdater<T> {
    pub fn attach(
        stream: Arc<SlokedTransactionStream>,
        cache: crate::fragment::FragmentCache<T>,
    ) -> FragmentUpdater<T> {
        let cache = Arc::new(Mutex::new(cache));
        let watched = cache.clone();
        let listener_id = stream.add_listener(Box::new(move |event| {
            let from = match event {
                StreamEvent::Commit(pos) | StreamEvent::Rollback(pos) | StreamEvent::RevertRollback(pos) => pos,
            };
            let mut cache = watched.lock().unwrap();
            cache.invalidate_from(from);
        }));
        FragmentUpdater { cache, stream, listener_id }
    }

    pub fn cache(&self) -> Arc<Mutex<crate::fragment::FragmentCache<T>>> {
        self.cache.clone()
    }

    pub fn detach(self) {
        self.stream.remove_listener(self.listener_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Fragment, Tagger};
    use crate::newline::NewLine;
    use crate::position::TextPosition;
    use crate::transaction::edit::SlokedCursorTransaction;
    use crate::transaction::multiplexer::Multiplexer;

    struct OneShotTagger {
        emitted: bool,
        rewound_to: Option<TextPosition>,
    }

    impl Tagger<&'static str> for OneShotTagger {
        fn next(&mut self) -> Option<Fragment<&'static str>> {
            if self.emitted {
                None
            } else {
                self.emitted = true;
                Some(Fragment::new(TextPosition::MIN, crate::position::TextPositionDelta::new(0, 5), "tag"))
            }
        }

        fn rewind(&mut self, pos: TextPosition) {
            self.rewound_to = Some(pos);
            self.emitted = false;
        }
    }

    #[test]
    fn commit_invalidates_and_rewinds_cache() {
        let mux = Multiplexer::new("hello world", NewLine::Lf);
        let stream = mux.open_stream();
        let tagger = OneShotTagger { emitted: false, rewound_to: None };
        let cache = crate::fragment::FragmentCache::new(Box::new(tagger));
        let updater = FragmentUpdater::attach(stream.clone(), cache);

        {
            let mut c = updater.cache().lock().unwrap();
            assert!(c.get(TextPosition::new(0, 0)).is_some());
        }

        stream
            .commit(SlokedCursorTransaction::Insert { pos: TextPosition::new(0, 0), content: "X".to_string() })
            .unwrap();

        // After the commit the cache was invalidated, so the next lookup
        // must re-derive from the (rewound) upstream rather than serving a
        // stale hit.
        let mut c = updater.cache().lock().unwrap();
        assert!(c.get(TextPosition::new(0, 0)).is_some());
    }
}
