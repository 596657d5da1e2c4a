//! `TextChunk` — the rope's work-horse node: an optional middle content
//! string flanked by two optional child nodes, with a per-line map cached
//! over the concatenation. Ported from `TextChunk.h`/`TextChunk.cpp`.

use sloked_collections::RangeMap;

use crate::error::SlokedError;
use crate::newline::NewLine;
use crate::text::block::{LineView, TextBlock};
use crate::text::node::TextNode;

#[derive(Debug, Clone, Eq, PartialEq)]
enum LineSpan {
    InContent { offset: usize, len: usize },
    AtBegin,
    AtEnd,
}

#[derive(Debug)]
pub struct TextChunk {
    content: String,
    begin: Option<Box<TextNode>>,
    end: Option<Box<TextNode>>,
    line_map: RangeMap<u64, LineSpan>,
    height: i64,
    last_line: u64,
    total_length: u64,
}

impl TextChunk {
    pub fn new(content: String, newline: &NewLine) -> TextChunk {
        let mut chunk = TextChunk {
            content,
            begin: None,
            end: None,
            line_map: RangeMap::new(0),
            height: 0,
            last_line: 0,
            total_length: 0,
        };
        chunk.rebuild(newline);
        chunk
    }

    pub fn join(begin: Option<Box<TextNode>>, content: String, end: Option<Box<TextNode>>, newline: &NewLine) -> TextChunk {
        let mut chunk = TextChunk {
            content,
            begin,
            end,
            line_map: RangeMap::new(0),
            height: 0,
            last_line: 0,
            total_length: 0,
        };
        chunk.rebuild(newline);
        chunk
    }

    fn begin_lines(&self) -> u64 {
        self.begin.as_ref().map(|b| b.last_line() + 1).unwrap_or(0)
    }

    fn end_lines(&self) -> u64 {
        self.end.as_ref().map(|e| e.last_line() + 1).unwrap_or(0)
    }

    /// Rebuild the line map, height, total length and last-line cache by
    /// walking `begin → content → end`. Called after every structural
    /// change, per §4.1.
    fn rebuild(&mut self, newline: &NewLine) {
        let begin_lines = self.begin_lines();
        let mut map = RangeMap::new(0u64);
        if begin_lines > 0 {
            map.insert(0, begin_lines, LineSpan::AtBegin);
        }

        let mut offset = 0usize;
        let mut local = begin_lines;
        for part in newline.split(&self.content) {
            map.insert(local, local + 1, LineSpan::InContent { offset, len: part.len() });
            offset += part.len() + newline.width();
            local += 1;
        }

        let end_lines = self.end_lines();
        if end_lines > 0 {
            map.insert(local, local + end_lines, LineSpan::AtEnd);
        }

        self.line_map = map;
        self.last_line = local + end_lines - 1;

        let mut total = 0u64;
        if let Some(b) = &self.begin {
            total += b.total_length();
            total += newline.width() as u64;
        }
        total += self.content.len() as u64;
        if let Some(e) = &self.end {
            total += newline.width() as u64;
            total += e.total_length();
        }
        self.total_length = total;

        let bh = self.begin.as_ref().map(|b| b.height()).unwrap_or(-1);
        let eh = self.end.as_ref().map(|e| e.height()).unwrap_or(-1);
        self.height = 1 + bh.max(eh);
    }

    fn local_index(&self, line: u64) -> Result<(&LineSpan, u64), SlokedError> {
        match self.line_map.at(&line) {
            Some(span) => Ok((span, line)),
            None => Err(SlokedError::InvalidPosition),
        }
    }

    /// Drop children/content that collapsed to nothing, matching `compact()`.
    pub fn compact(&mut self, newline: &NewLine) {
        if let Some(b) = &self.begin {
            if b.is_empty() && b.last_line() == 0 {
                self.begin = None;
            }
        }
        if let Some(e) = &self.end {
            if e.is_empty() && e.last_line() == 0 {
                self.end = None;
            }
        }
        self.rebuild(newline);
    }

    /// Restore `|height(begin) - height(end)| <= 1` when both children are
    /// themselves chunks. Region/Handle children are left alone — rotating
    /// across a structural boundary isn't meaningful here, and `TextView`
    /// never builds trees deep enough on one side for that to matter, since
    /// it joins chunks into a left-leaning region spine instead (§4.1).
    pub fn rebalance(&mut self, newline: &NewLine) {
        let bh = self.begin.as_ref().map(|b| b.height()).unwrap_or(-1);
        let eh = self.end.as_ref().map(|e| e.height()).unwrap_or(-1);
        if (bh - eh).abs() <= 1 {
            return;
        }
        if eh > bh {
            if let Some(end_node) = self.end.take() {
                if let TextNode::Chunk(mut end_chunk) = *end_node {
                    // Rotate left: end's begin becomes our end, we become
                    // the new begin of `end_chunk`.
                    let promoted_begin = end_chunk.begin.take();
                    let old_self_begin = self.begin.take();
                    let old_self_content = std::mem::take(&mut self.content);
                    let mut new_left = TextChunk::join(old_self_begin, old_self_content, promoted_begin, newline);
                    new_left.rebalance(newline);
                    self.begin = Some(Box::new(TextNode::Chunk(new_left)));
                    self.content = std::mem::take(&mut end_chunk.content);
                    self.end = end_chunk.end.take();
                } else {
                    self.end = Some(end_node);
                }
            }
        } else if let Some(begin_node) = self.begin.take() {
            if let TextNode::Chunk(mut begin_chunk) = *begin_node {
                let promoted_end = begin_chunk.end.take();
                let old_self_end = self.end.take();
                let old_self_content = std::mem::take(&mut self.content);
                let mut new_right = TextChunk::join(promoted_end, old_self_content, old_self_end, newline);
                new_right.rebalance(newline);
                self.end = Some(Box::new(TextNode::Chunk(new_right)));
                self.content = std::mem::take(&mut begin_chunk.content);
                self.begin = begin_chunk.begin.take();
            } else {
                self.begin = Some(begin_node);
            }
        }
        self.rebuild(newline);
    }

    pub fn squash(&self, newline: &NewLine, out: &mut String) {
        if let Some(b) = &self.begin {
            if let TextNode::Chunk(c) = b.as_ref() {
                c.squash(newline, out);
            } else {
                // Region/Handle squashing is driven from TextRegion/TextNode;
                // fall back to line-by-line concatenation.
                for i in 0..=b.last_line() {
                    if i > 0 {
                        out.push_str(newline.symbol());
                    }
                    if let Ok(line) = b.get_line(i) {
                        out.push_str(&line);
                    }
                }
            }
            out.push_str(newline.symbol());
        }
        out.push_str(&self.content);
        if let Some(e) = &self.end {
            out.push_str(newline.symbol());
            if let TextNode::Chunk(c) = e.as_ref() {
                c.squash(newline, out);
            } else {
                for i in 0..=e.last_line() {
                    if i > 0 {
                        out.push_str(newline.symbol());
                    }
                    if let Ok(line) = e.get_line(i) {
                        out.push_str(&line);
                    }
                }
            }
        }
    }
}

impl TextBlock for TextChunk {
    fn last_line(&self) -> u64 {
        self.last_line
    }

    fn total_length(&self) -> u64 {
        self.total_length
    }

    fn get_line(&self, line: u64) -> Result<LineView<'_>, SlokedError> {
        let end_start = self.last_line + 1 - self.end_lines();
        match self.local_index(line)?.0 {
            LineSpan::AtBegin => self.begin.as_ref().unwrap().get_line(line),
            LineSpan::AtEnd => self.end.as_ref().unwrap().get_line(line - end_start),
            LineSpan::InContent { offset, len } => {
                Ok(LineView::Borrowed(&self.content[*offset..*offset + *len]))
            }
        }
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

    fn set_line(&mut self, line: u64, content: String, newline: &NewLine) -> Result<(), SlokedError> {
        let end_start = self.last_line + 1 - self.end_lines();
        let span = self.local_index(line)?.0.clone();
        match span {
            LineSpan::AtBegin => {
                self.begin.as_mut().unwrap().set_line(line, content, newline)?;
            }
            LineSpan::AtEnd => {
                self.end.as_mut().unwrap().set_line(line - end_start, content, newline)?;
            }
            LineSpan::InContent { offset, len } => {
                self.content.replace_range(offset..offset + len, &content);
            }
        }
        self.rebuild(newline);
        Ok(())
    }

    fn erase_line(&mut self, line: u64, newline: &NewLine) -> Result<(), SlokedError> {
        let end_start = self.last_line + 1 - self.end_lines();
        let begin_lines = self.begin_lines();
        let span = self.local_index(line)?.0.clone();
        match span {
            LineSpan::AtBegin => {
                self.begin.as_mut().unwrap().erase_line(line, newline)?;
            }
            LineSpan::AtEnd => {
                self.end.as_mut().unwrap().erase_line(line - end_start, newline)?;
            }
            LineSpan::InContent { .. } => {
                let local = (line - begin_lines) as usize;
                let mut lines: Vec<String> = newline.split(&self.content).into_iter().map(String::from).collect();
                if local < lines.len() {
                    lines.remove(local);
                }
                if lines.is_empty() {
                    lines.push(String::new());
                }
                self.content = newline.join(&lines);
            }
        }
        self.rebuild(newline);
        self.compact(newline);
        Ok(())
    }

    fn insert_line(&mut self, line: u64, content: String, newline: &NewLine) -> Result<(), SlokedError> {
        let end_start = self.last_line + 1 - self.end_lines();
        let begin_lines = self.begin_lines();
        if line > self.last_line + 1 {
            return Err(SlokedError::InvalidPosition);
        }
        if line == self.last_line + 1 {
            // Append after the last line, which always lives in `content`
            // or `end`.
            if self.end.is_some() {
                self.end.as_mut().unwrap().insert_line(line - end_start, content, newline)?;
            } else {
                let mut lines: Vec<String> = newline.split(&self.content).into_iter().map(String::from).collect();
                lines.push(content);
                self.content = newline.join(&lines);
            }
        } else {
            let span = self.local_index(line)?.0.clone();
            match span {
                LineSpan::AtBegin => {
                    self.begin.as_mut().unwrap().insert_line(line, content, newline)?;
                }
                LineSpan::AtEnd => {
                    self.end.as_mut().unwrap().insert_line(line - end_start, content, newline)?;
                }
                LineSpan::InContent { .. } => {
                    let local = (line - begin_lines) as usize;
                    let mut lines: Vec<String> = newline.split(&self.content).into_iter().map(String::from).collect();
                    lines.insert(local, content);
                    self.content = newline.join(&lines);
                }
            }
        }
        self.rebuild(newline);
        self.rebalance(newline);
        Ok(())
    }

    fn optimize(&mut self, newline: &NewLine) {
        if let Some(b) = self.begin.as_mut() {
            b.optimize(newline);
        }
        if let Some(e) = self.end.as_mut() {
            e.optimize(newline);
        }
        self.compact(newline);
        self.rebalance(newline);
    }

    fn height(&self) -> i64 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_content_chunk_lines() {
        let nl = NewLine::Lf;
        let chunk = TextChunk::new("alpha\nbeta\ngamma".to_string(), &nl);
        assert_eq!(chunk.last_line(), 2);
        assert_eq!(chunk.get_line(0).unwrap().as_ref(), "alpha");
        assert_eq!(chunk.get_line(1).unwrap().as_ref(), "beta");
        assert_eq!(chunk.get_line(2).unwrap().as_ref(), "gamma");
    }

    #[test]
    fn set_line_replaces_in_place() {
        let nl = NewLine::Lf;
        let mut chunk = TextChunk::new("alpha\nbeta\ngamma".to_string(), &nl);
        chunk.set_line(1, "BETA".to_string(), &nl).unwrap();
        assert_eq!(chunk.get_line(1).unwrap().as_ref(), "BETA");
        assert_eq!(chunk.get_line(0).unwrap().as_ref(), "alpha");
    }

    #[test]
    fn insert_and_erase_line_round_trip() {
        let nl = NewLine::Lf;
        let mut chunk = TextChunk::new("alpha\ngamma".to_string(), &nl);
        chunk.insert_line(1, "beta".to_string(), &nl).unwrap();
        assert_eq!(chunk.last_line(), 2);
        assert_eq!(chunk.get_line(1).unwrap().as_ref(), "beta");
        chunk.erase_line(1, &nl).unwrap();
        assert_eq!(chunk.last_line(), 1);
        assert_eq!(chunk.get_line(1).unwrap().as_ref(), "gamma");
    }

    #[test]
    fn set_line_preserves_crlf_on_other_lines() {
        let nl = NewLine::CrLf;
        let mut chunk = TextChunk::new("a\r\nb\r\nc".to_string(), &nl);
        chunk.set_line(0, "X".to_string(), &nl).unwrap();
        assert_eq!(chunk.get_line(0).unwrap().as_ref(), "X");
        assert_eq!(chunk.get_line(1).unwrap().as_ref(), "b");
        assert_eq!(chunk.get_line(2).unwrap().as_ref(), "c");
    }

    #[test]
    fn out_of_range_line_is_invalid_position() {
        let nl = NewLine::Lf;
        let chunk = TextChunk::new("only".to_string(), &nl);
        assert_eq!(chunk.get_line(5), Err(SlokedError::InvalidPosition));
    }
}
