//! `FragmentCache` — serves fragment lookups from the AVL map, pulling from
//! the upstream `Tagger` on a cache miss (§4.4).

use crate::fragment::map::{Fragment, TaggedFragmentMap};
use crate::fragment::tagger::Tagger;
use crate::position::TextPosition;

pub struct FragmentCache<T> {
    cache: TaggedFragmentMap<T>,
    upstream: Box<dyn Tagger<T> + Send>,
    /// First position the cache has not yet pulled fragments up to.
    frontier: TextPosition,
}

impl<T: Clone> FragmentCache<T> {
    pub fn new(upstream: Box<dyn Tagger<T> + Send>) -> FragmentCache<T> {
        FragmentCache { cache: TaggedFragmentMap::new(), upstream, frontier: TextPosition::MIN }
    }

    /// Serve `pos` from the cache, pulling upstream fragments one at a time
    /// until either the cache covers `pos` or the upstream is exhausted.
    pub fn get(&mut self, pos: TextPosition) -> Option<Fragment<T>>
    where
        T: Clone,
    {
        if let Some(fragment) = self.cache.get(&pos) {
            return Some(fragment.clone());
        }
        while pos >= self.frontier {
            match self.upstream.next() {
                Some(fragment) => {
                    self.frontier = fragment.end();
                    let hit = fragment.includes(&pos);
                    if self.cache.insert(fragment.start, fragment.length, fragment.tag.clone()).is_err() {
                        // Upstream produced something overlapping what's
                        // already cached; drop it rather than poison the map.
                        continue;
                    }
                    if hit {
                        return self.cache.get(&pos).cloned();
                    }
                }
                None => break,
            }
        }
        None
    }

    /// Drop every cached fragment intersecting `[from, to)` and rewind the
    /// upstream producer to `from`, so the next miss re-derives it.
    pub fn invalidate(&mut self, from: TextPosition, to: TextPosition) {
        let mut pos = from;
        while pos < to {
            self.cache.remove(&pos);
            pos = TextPosition::new(pos.line, pos.column + 1);
        }
        self.cache.remove(&from);
        self.upstream.rewind(from);
        self.frontier = from;
    }

    /// Drop every cached fragment starting at or after `from` and rewind
    /// upstream to `from`. Unlike `invalidate`, this is independent of how
    /// far downstream the edit's effects reach — exactly what an edit that
    /// shifts every following position (insert/erase a line) requires.
    pub fn invalidate_from(&mut self, from: TextPosition) {
        self.cache.retain_before(from);
        self.upstream.rewind(from);
        self.frontier = from;
    }
}
