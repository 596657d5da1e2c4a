//! `TextNode` — the recursive sum of the three rope node kinds.
//!
//! The original keeps `TextChunk`/`TextRegion`/`TextBlockHandle` as distinct
//! classes behind a common `TextBlock*` pointer. A `Box<dyn TextBlock>` would
//! force every rotation and materialisation to downcast; instead we collapse
//! the three into one enum that owns its children directly, matching
//! diamond-types' preference for closed node sets over open trait-object
//! trees (`src/list/op.rs`'s `OpKind` discriminated-union shape; never a
//! `Box<dyn ...>` recursive type anywhere in that crate).

use crate::error::SlokedError;
use crate::newline::NewLine;
use crate::text::block::{LineView, TextBlock};
use crate::text::chunk::TextChunk;
use crate::text::handle::TextBlockHandle;
use crate::text::region::TextRegion;

#[derive(Debug)]
pub enum TextNode {
    Chunk(TextChunk),
    Region(TextRegion),
    Handle(TextBlockHandle),
}

impl TextNode {
    pub fn leaf(content: String, newline: &NewLine) -> TextNode {
        TextNode::Chunk(TextChunk::new(content, newline))
    }

    pub fn empty(newline: &NewLine) -> TextNode {
        TextNode::Chunk(TextChunk::new(String::new(), newline))
    }

    /// Materialise a `Handle` arm in place; no-op for the other variants.
    pub fn open(&mut self) -> Result<(), SlokedError> {
        let materialized = match &*self {
            TextNode::Handle(handle) => Some(handle.materialize()?),
            _ => None,
        };
        if let Some(node) = materialized {
            *self = node;
        }
        Ok(())
    }

    fn as_block(&self) -> &dyn TextBlock {
        match self {
            TextNode::Chunk(c) => c,
            TextNode::Region(r) => r,
            TextNode::Handle(h) => h,
        }
    }

    fn as_block_mut(&mut self) -> &mut dyn TextBlock {
        match self {
            TextNode::Chunk(c) => c,
            TextNode::Region(r) => r,
            TextNode::Handle(h) => h,
        }
    }
}

impl TextBlock for TextNode {
    fn last_line(&self) -> u64 {
        self.as_block().last_line()
    }

    fn total_length(&self) -> u64 {
        self.as_block().total_length()
    }

    fn get_line(&self, line: u64) -> Result<LineView<'_>, SlokedError> {
        self.as_block().get_line(line)
    }

    fn visit(
        &self,
        start: u64,
        count: u64,
        visitor: &mut dyn FnMut(u64, &str),
    ) -> Result<(), SlokedError> {
        self.as_block().visit(start, count, visitor)
    }

    fn set_line(&mut self, line: u64, content: String, newline: &NewLine) -> Result<(), SlokedError> {
        self.open()?;
        self.as_block_mut().set_line(line, content, newline)
    }

    fn erase_line(&mut self, line: u64, newline: &NewLine) -> Result<(), SlokedError> {
        self.open()?;
        self.as_block_mut().erase_line(line, newline)
    }

    fn insert_line(&mut self, line: u64, content: String, newline: &NewLine) -> Result<(), SlokedError> {
        self.open()?;
        self.as_block_mut().insert_line(line, content, newline)
    }

    fn optimize(&mut self, newline: &NewLine) {
        if let TextNode::Handle(_) = self {
            // A never-mutated handle has nothing to compact or rebalance.
            return;
        }
        self.as_block_mut().optimize(newline)
    }

    fn height(&self) -> i64 {
        self.as_block().height()
    }
}
