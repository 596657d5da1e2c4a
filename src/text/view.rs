//! `TextView::open` — splits a byte view into lazily-materialised handles
//! joined by a left-leaning spine of regions. Ported from `TextView.h`/
//! `TextView.cpp`.

use std::sync::Arc;

use crate::newline::NewLine;
use crate::text::block::TextBlock;
use crate::text::handle::{BlockFactory, TextBlockHandle};
use crate::text::node::TextNode;
use crate::text::region::TextRegion;

/// Chunks larger than this are handed to the caller as lazy handles rather
/// than materialised chunks, bounding memory for cold regions of a huge
/// mapped file (§4.1).
pub const MAX_CHUNK: usize = 2 * 1024 * 1024;

fn chunk_factory() -> BlockFactory {
    Arc::new(|view: &str, newline: &NewLine| TextNode::leaf(view.to_string(), newline))
}

/// Build a `TextNode` over `content`, deferring materialisation of any
/// segment at or above `MAX_CHUNK` bytes.
pub fn open(content: &str, newline: &NewLine) -> TextNode {
    if content.len() < MAX_CHUNK {
        return TextNode::leaf(content.to_string(), newline);
    }

    let mut segments: Vec<TextNode> = Vec::new();
    let mut start = 0usize;
    while start < content.len() {
        let mut end = (start + MAX_CHUNK).min(content.len());
        // Don't split a codepoint in half.
        while end < content.len() && !content.is_char_boundary(end) {
            end += 1;
        }
        let slice: Arc<str> = Arc::from(&content[start..end]);
        segments.push(TextNode::Handle(TextBlockHandle::new(slice, newline.clone(), chunk_factory())));
        start = end;
    }

    fold_left_leaning(segments, newline)
}

/// Combine `segments` into a left-leaning spine of `TextRegion`s: the
/// accumulator becomes each successive region's `begin`, the next segment
/// its `content`.
fn fold_left_leaning(mut segments: Vec<TextNode>, newline: &NewLine) -> TextNode {
    if segments.is_empty() {
        return TextNode::empty(newline);
    }
    let mut acc = segments.remove(0);
    for segment in segments {
        let region = TextRegion::new(Some(Box::new(acc)), Box::new(segment), None, newline);
        acc = TextNode::Region(region);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_content_is_a_single_chunk() {
        let nl = NewLine::Lf;
        let node = open("alpha\nbeta\ngamma", &nl);
        assert!(matches!(node, TextNode::Chunk(_)));
        assert_eq!(node.last_line(), 2);
        assert_eq!(node.get_line(1).unwrap().as_ref(), "beta");
    }

    #[test]
    fn large_content_splits_into_handles() {
        let nl = NewLine::Lf;
        let line = "x".repeat(100);
        let mut content = String::new();
        for _ in 0..(MAX_CHUNK / line.len() + 10) {
            content.push_str(&line);
            content.push('\n');
        }
        content.push_str("tail");
        let node = open(&content, &nl);
        assert!(matches!(node, TextNode::Region(_)));
        assert_eq!(node.get_line(node.last_line()).unwrap().as_ref(), "tail");
        assert_eq!(node.get_line(0).unwrap().as_ref(), line);
    }
}
