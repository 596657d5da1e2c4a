//! `TextBlockHandle` — a lazy, unmaterialised view over a cold region of a
//! memory-mapped file. Ported from `TextBlockHandle.h`; Design Note 9 models
//! it as a tagged union where the view arm serves reads and the first
//! mutating call drives the transition, which is exactly the shape of
//! `TextNode::open`.

use std::sync::Arc;

use crate::error::SlokedError;
use crate::newline::NewLine;
use crate::text::block::{LineView, TextBlock};
use crate::text::node::TextNode;

/// Precomputed `(byte_offset, byte_len)` for each line in the view, built
/// once by `TextView::open` without copying the underlying bytes.
#[derive(Debug, Clone)]
struct ViewLineMap {
    lines: Vec<(usize, usize)>,
}

impl ViewLineMap {
    fn build(view: &str, newline: &NewLine) -> ViewLineMap {
        let mut lines = Vec::new();
        let mut start = 0;
        newline.iterate(view, |offset, width| {
            lines.push((start, offset - start));
            start = offset + width;
        });
        lines.push((start, view.len() - start));
        ViewLineMap { lines }
    }
}

/// Builds the real block a handle materialises into. The original's
/// factory invokes the same chunk/region construction `TextView::open`
/// uses; we model it as a closure so handles carry no dependency on the
/// view module.
pub type BlockFactory = Arc<dyn Fn(&str, &NewLine) -> TextNode + Send + Sync>;

pub struct TextBlockHandle {
    view: Arc<str>,
    line_map: ViewLineMap,
    factory: BlockFactory,
    newline: NewLine,
}

impl std::fmt::Debug for TextBlockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBlockHandle")
            .field("bytes", &self.view.len())
            .field("lines", &self.line_map.lines.len())
            .finish()
    }
}

impl TextBlockHandle {
    pub fn new(view: Arc<str>, newline: NewLine, factory: BlockFactory) -> TextBlockHandle {
        let line_map = ViewLineMap::build(&view, &newline);
        TextBlockHandle { view, line_map, factory, newline }
    }

    /// Invoke the factory over the view, producing the real node this
    /// handle stood in for.
    pub fn materialize(&self) -> Result<TextNode, SlokedError> {
        Ok((self.factory)(&self.view, &self.newline))
    }
}

impl TextBlock for TextBlockHandle {
    fn last_line(&self) -> u64 {
        self.line_map.lines.len() as u64 - 1
    }

    fn total_length(&self) -> u64 {
        self.view.len() as u64
    }

    fn get_line(&self, line: u64) -> Result<LineView<'_>, SlokedError> {
        let (offset, len) = self
            .line_map
            .lines
            .get(line as usize)
            .copied()
            .ok_or(SlokedError::InvalidPosition)?;
        Ok(LineView::Borrowed(&self.view[offset..offset + len]))
    }

    fn visit(
        &self,
        start: u64,
        count: u64,
        visitor: &mut dyn FnMut(u64, &str),
    ) -> Result<(), SlokedError> {
        for line in start..start + count {
            let view = self.get_line(line)?;
            visitor(line, &view);
        }
        Ok(())
    }

    fn set_line(&mut self, _line: u64, _content: String, _newline: &NewLine) -> Result<(), SlokedError> {
        unreachable!("TextNode::open materialises the handle before any mutation reaches it")
    }

    fn erase_line(&mut self, _line: u64, _newline: &NewLine) -> Result<(), SlokedError> {
        unreachable!("TextNode::open materialises the handle before any mutation reaches it")
    }

    fn insert_line(&mut self, _line: u64, _content: String, _newline: &NewLine) -> Result<(), SlokedError> {
        unreachable!("TextNode::open materialises the handle before any mutation reaches it")
    }

    fn optimize(&mut self, _newline: &NewLine) {}

    fn height(&self) -> i64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_factory() -> BlockFactory {
        Arc::new(|view: &str, newline: &NewLine| TextNode::leaf(view.to_string(), newline))
    }

    #[test]
    fn handle_reads_without_materialising() {
        let nl = NewLine::Lf;
        let handle = TextBlockHandle::new(Arc::from("alpha\nbeta"), nl, leaf_factory());
        assert_eq!(handle.last_line(), 1);
        assert_eq!(handle.get_line(0).unwrap().as_ref(), "alpha");
        assert_eq!(handle.get_line(1).unwrap().as_ref(), "beta");
    }

    #[test]
    fn materialize_invokes_factory() {
        let nl = NewLine::Lf;
        let handle = TextBlockHandle::new(Arc::from("alpha\nbeta"), nl.clone(), leaf_factory());
        let node = handle.materialize().unwrap();
        assert_eq!(node.last_line(), 1);
        assert_eq!(node.get_line(0).unwrap().as_ref(), "alpha");
    }
}
