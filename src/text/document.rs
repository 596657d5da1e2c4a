//! `TextDocument` — owns the rope's root node and the active `NewLine`
//! strategy. Ported from `TextDocument.h`/`TextDocument.cpp`.

use crate::error::SlokedError;
use crate::newline::NewLine;
use crate::text::block::{LineView, TextBlock};
use crate::text::node::TextNode;
use crate::text::view;

#[derive(Debug)]
pub struct TextDocument {
    root: TextNode,
    newline: NewLine,
}

impl TextDocument {
    pub fn new(content: &str, newline: NewLine) -> TextDocument {
        let root = view::open(content, &newline);
        TextDocument { root, newline }
    }

    pub fn newline(&self) -> &NewLine {
        &self.newline
    }

    pub fn root(&self) -> &TextNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut TextNode {
        &mut self.root
    }

    /// Atomically swap the root under the same identity, e.g. after save
    /// reloads the backing file. Open Question (b) in the design notes: we
    /// do not resurrect a self-referential `newline = &newline` no-op here,
    /// the caller's new strategy simply replaces the old one.
    pub fn rebuild(&mut self, newline: NewLine, block: TextNode) {
        self.newline = newline;
        self.root = block;
    }

    pub fn last_line(&self) -> u64 {
        self.root.last_line()
    }

    pub fn total_length(&self) -> u64 {
        self.root.total_length()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn get_line(&self, line: u64) -> Result<LineView<'_>, SlokedError> {
        self.root.get_line(line)
    }

    pub fn visit(&self, start: u64, count: u64, visitor: &mut dyn FnMut(u64, &str)) -> Result<(), SlokedError> {
        self.root.visit(start, count, visitor)
    }

    /// Serialise the whole document back to bytes, joining lines with the
    /// active `NewLine` symbol.
    pub fn to_string(&self) -> String {
        let mut out = String::new();
        for line in 0..=self.last_line() {
            if line > 0 {
                out.push_str(self.newline.symbol());
            }
            if let Ok(view) = self.get_line(line) {
                out.push_str(&view);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_to_string() {
        let doc = TextDocument::new("alpha\nbeta\ngamma", NewLine::Lf);
        assert_eq!(doc.last_line(), 2);
        assert_eq!(doc.to_string(), "alpha\nbeta\ngamma");
    }

    #[test]
    fn rebuild_swaps_root_identity() {
        let mut doc = TextDocument::new("old", NewLine::Lf);
        let new_root = view::open("new content", &NewLine::Lf);
        doc.rebuild(NewLine::Lf, new_root);
        assert_eq!(doc.to_string(), "new content");
    }
}
