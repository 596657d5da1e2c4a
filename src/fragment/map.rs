//! `TaggedFragmentMap` — an AVL tree of non-overlapping fragments keyed by
//! start position. Ported from `FragmentMap.h`.

use sloked_collections::{rebalance, AvlNode};

use crate::error::SlokedError;
use crate::position::{TextPosition, TextPositionDelta};

#[derive(Debug, Clone)]
pub struct Fragment<T> {
    pub start: TextPosition,
    pub length: TextPositionDelta,
    pub tag: T,
}

impl<T> Fragment<T> {
    pub fn new(start: TextPosition, length: TextPositionDelta, tag: T) -> Fragment<T> {
        Fragment { start, length, tag }
    }

    pub fn end(&self) -> TextPosition {
        self.start.apply(self.length)
    }

    pub fn includes(&self, pos: &TextPosition) -> bool {
        *pos >= self.start && *pos < self.end()
    }

    pub fn overlaps(&self, other: &Fragment<T>) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

struct FragmentMapNode<T> {
    content: Option<Fragment<T>>,
    begin: Option<Box<FragmentMapNode<T>>>,
    end: Option<Box<FragmentMapNode<T>>>,
    height: i64,
    empty: bool,
}

impl<T> FragmentMapNode<T> {
    fn leaf(fragment: Fragment<T>) -> FragmentMapNode<T> {
        FragmentMapNode { content: Some(fragment), begin: None, end: None, height: 0, empty: false }
    }

    fn get(&self, pos: &TextPosition) -> Option<&Fragment<T>> {
        if let Some(content) = &self.content {
            if content.includes(pos) {
                return Some(content);
            }
        }
        self.begin
            .as_ref()
            .and_then(|b| b.get(pos))
            .or_else(|| self.end.as_ref().and_then(|e| e.get(pos)))
    }

    fn min(&self) -> Option<&Fragment<T>> {
        self.begin.as_ref().and_then(|b| b.min()).or(self.content.as_ref())
    }

    fn max(&self) -> Option<&Fragment<T>> {
        self.end.as_ref().and_then(|e| e.max()).or(self.content.as_ref())
    }

    fn insert(&mut self, fragment: Fragment<T>) -> Result<(), SlokedError>
    where
        T: Clone,
    {
        if let Some(content) = &self.content {
            if content.overlaps(&fragment) {
                return Err(SlokedError::Other("fragment overlaps an existing one".to_string()));
            }
            if fragment.start < content.start {
                match &mut self.begin {
                    Some(b) => b.insert(fragment)?,
                    None => self.begin = Some(Box::new(FragmentMapNode::leaf(fragment))),
                }
            } else {
                match &mut self.end {
                    Some(e) => e.insert(fragment)?,
                    None => self.end = Some(Box::new(FragmentMapNode::leaf(fragment))),
                }
            }
        } else {
            let max_begin = self.begin.as_ref().and_then(|b| b.max());
            let min_end = self.end.as_ref().and_then(|e| e.min());
            if max_begin.is_some_and(|m| fragment.start < m.start) {
                self.begin.as_mut().unwrap().insert(fragment)?;
            } else if min_end.is_some_and(|m| m.start < fragment.start) {
                self.end.as_mut().unwrap().insert(fragment)?;
            } else {
                self.content = Some(fragment);
            }
        }
        self.recompute();
        Ok(())
    }

    fn remove(&mut self, pos: &TextPosition) {
        if let Some(content) = &self.content {
            if content.includes(pos) {
                self.content = None;
            }
        }
        if let Some(b) = self.begin.as_mut() {
            b.remove(pos);
        }
        if let Some(e) = self.end.as_mut() {
            e.remove(pos);
        }
        self.recompute();
        if self.begin.as_ref().is_some_and(|b| b.empty) {
            self.begin = None;
        }
        if self.end.as_ref().is_some_and(|e| e.empty) {
            self.end = None;
        }
    }
}

impl<T> AvlNode for FragmentMapNode<T> {
    fn height(&self) -> i64 {
        self.height
    }

    fn left(&self) -> Option<&Self> {
        self.begin.as_deref()
    }

    fn right(&self) -> Option<&Self> {
        self.end.as_deref()
    }

    fn left_mut(&mut self) -> &mut Option<Box<Self>> {
        &mut self.begin
    }

    fn right_mut(&mut self) -> &mut Option<Box<Self>> {
        &mut self.end
    }

    fn recompute(&mut self) {
        self.empty = self.begin.as_ref().map_or(true, |b| b.empty) && self.content.is_none() && self.end.as_ref().map_or(true, |e| e.empty);
        let bh = self.begin.as_ref().map(|b| b.height()).unwrap_or(-1);
        let eh = self.end.as_ref().map(|e| e.height()).unwrap_or(-1);
        self.height = 1 + bh.max(eh);
    }
}

/// Non-overlapping fragments covering parts of a document, stored in an AVL
/// tree keyed by start position (§3, §4.4).
pub struct TaggedFragmentMap<T> {
    root: Option<Box<FragmentMapNode<T>>>,
}

impl<T: Clone> TaggedFragmentMap<T> {
    pub fn new() -> TaggedFragmentMap<T> {
        TaggedFragmentMap { root: None }
    }

    pub fn get(&self, pos: &TextPosition) -> Option<&Fragment<T>> {
        self.root.as_ref().and_then(|r| r.get(pos))
    }

    pub fn has(&self, pos: &TextPosition) -> bool {
        self.get(pos).is_some()
    }

    pub fn insert(&mut self, start: TextPosition, length: TextPositionDelta, tag: T) -> Result<(), SlokedError> {
        let fragment = Fragment::new(start, length, tag);
        match &mut self.root {
            Some(root) => {
                root.insert(fragment)?;
                self.root = Some(rebalance(self.root.take().unwrap()));
            }
            None => self.root = Some(Box::new(FragmentMapNode::leaf(fragment))),
        }
        Ok(())
    }

    pub fn remove(&mut self, pos: &TextPosition) {
        if let Some(root) = &mut self.root {
            root.remove(pos);
            self.root = Some(rebalance(self.root.take().unwrap()));
        }
        if self.root.as_ref().is_some_and(|r| r.empty) {
            self.root = None;
        }
    }

    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Drop every fragment whose start is `>= bound`, keeping the rest.
    /// Used to invalidate "everything downstream of an edit" without
    /// walking the map one position at a time.
    pub fn retain_before(&mut self, bound: TextPosition) {
        let mut kept = Vec::new();
        if let Some(root) = self.root.take() {
            collect_fragments(&root, &mut kept);
        }
        for fragment in kept {
            if fragment.start < bound {
                // Safe to ignore: fragments drawn from a map that was
                // already non-overlapping stay non-overlapping on re-insert.
                let _ = self.insert(fragment.start, fragment.length, fragment.tag);
            }
        }
    }
}

fn collect_fragments<T: Clone>(node: &FragmentMapNode<T>, out: &mut Vec<Fragment<T>>) {
    if let Some(b) = &node.begin {
        collect_fragments(b, out);
    }
    if let Some(content) = &node.content {
        out.push(content.clone());
    }
    if let Some(e) = &node.end {
        collect_fragments(e, out);
    }
}

impl<T: Clone> Default for TaggedFragmentMap<T> {
    fn default() -> Self {
        TaggedFragmentMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_fragment() {
        let mut map: TaggedFragmentMap<&str> = TaggedFragmentMap::new();
        map.insert(TextPosition::new(0, 0), TextPositionDelta::new(0, 5), "keyword").unwrap();
        map.insert(TextPosition::new(0, 10), TextPositionDelta::new(0, 4), "ident").unwrap();
        assert_eq!(map.get(&TextPosition::new(0, 2)).map(|f| f.tag), Some("keyword"));
        assert_eq!(map.get(&TextPosition::new(0, 11)).map(|f| f.tag), Some("ident"));
        assert!(!map.has(&TextPosition::new(0, 7)));
    }

    #[test]
    fn overlapping_insert_is_rejected() {
        let mut map: TaggedFragmentMap<&str> = TaggedFragmentMap::new();
        map.insert(TextPosition::new(0, 0), TextPositionDelta::new(0, 5), "a").unwrap();
        let err = map.insert(TextPosition::new(0, 2), TextPositionDelta::new(0, 5), "b");
        assert!(err.is_err());
    }

    #[test]
    fn remove_clears_fragment_at_position() {
        let mut map: TaggedFragmentMap<&str> = TaggedFragmentMap::new();
        map.insert(TextPosition::new(0, 0), TextPositionDelta::new(0, 5), "a").unwrap();
        map.remove(&TextPosition::new(0, 2));
        assert!(!map.has(&TextPosition::new(0, 2)));
    }
}
