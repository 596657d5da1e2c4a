//! `SlokedCursorTransaction` — the reversible edit sum type (§3, §4.2).

use crate::error::SlokedError;
use crate::newline::codepoint_width;
use crate::position::{TextPosition, TextPositionDelta};
use crate::text::document::TextDocument;
use crate::transaction::patch::SlokedTransactionPatch;

#[derive(Debug, Clone)]
pub enum SlokedCursorTransaction {
    Insert { pos: TextPosition, content: String },
    Newline { pos: TextPosition, content: String },
    DeleteForward { pos: TextPosition, deleted: String, width: u64 },
    DeleteBackward { pos: TextPosition, deleted: String, width: u64 },
    Clear { from: TextPosition, to: TextPosition, replaced_lines: Vec<String> },
    Batch { children: Vec<SlokedCursorTransaction> },
}

fn char_byte_offset(line: &str, column: u64) -> usize {
    line.char_indices().nth(column as usize).map(|(i, _)| i).unwrap_or(line.len())
}

fn validate(doc: &TextDocument, pos: &TextPosition) -> Result<(), SlokedError> {
    if pos.line > doc.last_line() {
        return Err(SlokedError::InvalidPosition);
    }
    let line = doc.get_line(pos.line)?;
    if pos.column as usize > line.chars().count() {
        return Err(SlokedError::InvalidPosition);
    }
    Ok(())
}

impl SlokedCursorTransaction {
    /// Validate every position this transaction touches against `doc`'s
    /// current dimensions without mutating it. Commits never partially
    /// apply (§4.3): callers must run this before `commit`.
    pub fn validate(&self, doc: &TextDocument) -> Result<(), SlokedError> {
        match self {
            SlokedCursorTransaction::Insert { pos, .. }
            | SlokedCursorTransaction::Newline { pos, .. }
            | SlokedCursorTransaction::DeleteForward { pos, .. }
            | SlokedCursorTransaction::DeleteBackward { pos, .. } => validate(doc, pos),
            SlokedCursorTransaction::Clear { from, to, .. } => {
                validate(doc, from)?;
                validate(doc, to)?;
                if from > to {
                    return Err(SlokedError::InvalidPosition);
                }
                Ok(())
            }
            SlokedCursorTransaction::Batch { children } => {
                for child in children {
                    child.validate(doc)?;
                }
                Ok(())
            }
        }
    }

    pub fn commit(&self, doc: &mut TextDocument) -> Result<TextPosition, SlokedError> {
        self.validate(doc)?;
        match self {
            SlokedCursorTransaction::Insert { pos, content } => {
                let newline = doc.newline().clone();
                let line = doc.get_line(pos.line)?.into_owned();
                let offset = char_byte_offset(&line, pos.column);
                let mut new_line = String::with_capacity(line.len() + content.len());
                new_line.push_str(&line[..offset]);
                new_line.push_str(content);
                new_line.push_str(&line[offset..]);
                doc.root_mut().set_line(pos.line, new_line, &newline)?;
                Ok(TextPosition::new(pos.line, pos.column + codepoint_width(content)))
            }
            SlokedCursorTransaction::Newline { pos, content } => {
                let newline = doc.newline().clone();
                let line = doc.get_line(pos.line)?.into_owned();
                let offset = char_byte_offset(&line, pos.column);
                let head = line[..offset].to_string();
                let tail = format!("{}{}", content, &line[offset..]);
                doc.root_mut().set_line(pos.line, head, &newline)?;
                doc.root_mut().insert_line(pos.line + 1, tail, &newline)?;
                Ok(TextPosition::new(pos.line + 1, codepoint_width(content)))
            }
            SlokedCursorTransaction::DeleteForward { pos, width, .. } => {
                let newline = doc.newline().clone();
                let line = doc.get_line(pos.line)?.into_owned();
                let start = char_byte_offset(&line, pos.column);
                let end = char_byte_offset(&line, pos.column + width);
                let mut new_line = String::with_capacity(line.len());
                new_line.push_str(&line[..start]);
                new_line.push_str(&line[end..]);
                doc.root_mut().set_line(pos.line, new_line, &newline)?;
                Ok(*pos)
            }
            SlokedCursorTransaction::DeleteBackward { pos, width, .. } => {
                let newline = doc.newline().clone();
                let line = doc.get_line(pos.line)?.into_owned();
                let end = char_byte_offset(&line, pos.column);
                let start_col = pos.column.saturating_sub(*width);
                let start = char_byte_offset(&line, start_col);
                let mut new_line = String::with_capacity(line.len());
                new_line.push_str(&line[..start]);
                new_line.push_str(&line[end..]);
                doc.root_mut().set_line(pos.line, new_line, &newline)?;
                Ok(TextPosition::new(pos.line, start_col))
            }
            SlokedCursorTransaction::Clear { from, to, .. } => self.commit_clear(doc, from, to),
            SlokedCursorTransaction::Batch { children } => {
                let mut cursor = TextPosition::MIN;
                for child in children {
                    cursor = child.commit(doc)?;
                }
                Ok(cursor)
            }
        }
    }

    fn commit_clear(&self, doc: &mut TextDocument, from: &TextPosition, to: &TextPosition) -> Result<TextPosition, SlokedError> {
        let newline = doc.newline().clone();
        if from.line == to.line {
            let line = doc.get_line(from.line)?.into_owned();
            let start = char_byte_offset(&line, from.column);
            let end = char_byte_offset(&line, to.column);
            let mut new_line = String::with_capacity(line.len());
            new_line.push_str(&line[..start]);
            new_line.push_str(&line[end..]);
            doc.root_mut().set_line(from.line, new_line, &newline)?;
        } else {
            let from_line = doc.get_line(from.line)?.into_owned();
            let to_line = doc.get_line(to.line)?.into_owned();
            let head = from_line[..char_byte_offset(&from_line, from.column)].to_string();
            let tail = to_line[char_byte_offset(&to_line, to.column)..].to_string();
            for _ in from.line + 1..=to.line {
                doc.root_mut().erase_line(from.line + 1, &newline)?;
            }
            doc.root_mut().set_line(from.line, format!("{head}{tail}"), &newline)?;
        }
        Ok(*from)
    }

    pub fn rollback(&self, doc: &mut TextDocument) -> Result<TextPosition, SlokedError> {
        match self {
            SlokedCursorTransaction::Insert { pos, content } => {
                let newline = doc.newline().clone();
                let line = doc.get_line(pos.line)?.into_owned();
                let start = char_byte_offset(&line, pos.column);
                let end = char_byte_offset(&line, pos.column + codepoint_width(content));
                let mut new_line = String::with_capacity(line.len());
                new_line.push_str(&line[..start]);
                new_line.push_str(&line[end..]);
                doc.root_mut().set_line(pos.line, new_line, &newline)?;
                Ok(*pos)
            }
            SlokedCursorTransaction::Newline { pos, content } => {
                let newline = doc.newline().clone();
                let head = doc.get_line(pos.line)?.into_owned();
                let next = doc.get_line(pos.line + 1)?.into_owned();
                let content_bytes = char_byte_offset(&next, codepoint_width(content));
                let tail = next[content_bytes..].to_string();
                doc.root_mut().set_line(pos.line, format!("{head}{tail}"), &newline)?;
                doc.root_mut().erase_line(pos.line + 1, &newline)?;
                Ok(*pos)
            }
            SlokedCursorTransaction::DeleteForward { pos, deleted, .. } => {
                let newline = doc.newline().clone();
                let line = doc.get_line(pos.line)?.into_owned();
                let offset = char_byte_offset(&line, pos.column);
                let mut new_line = String::with_capacity(line.len() + deleted.len());
                new_line.push_str(&line[..offset]);
                new_line.push_str(deleted);
                new_line.push_str(&line[offset..]);
                doc.root_mut().set_line(pos.line, new_line, &newline)?;
                Ok(*pos)
            }
            SlokedCursorTransaction::DeleteBackward { pos, deleted, width } => {
                let newline = doc.newline().clone();
                let line = doc.get_line(pos.line)?.into_owned();
                let start_col = pos.column.saturating_sub(*width);
                let offset = char_byte_offset(&line, start_col);
                let mut new_line = String::with_capacity(line.len() + deleted.len());
                new_line.push_str(&line[..offset]);
                new_line.push_str(deleted);
                new_line.push_str(&line[offset..]);
                doc.root_mut().set_line(pos.line, new_line, &newline)?;
                Ok(*pos)
            }
            SlokedCursorTransaction::Clear { from, to, replaced_lines } => {
                self.rollback_clear(doc, from, to, replaced_lines)
            }
            SlokedCursorTransaction::Batch { children } => {
                let mut cursor = TextPosition::MIN;
                for child in children.iter().rev() {
                    cursor = child.rollback(doc)?;
                }
                Ok(cursor)
            }
        }
    }

    fn rollback_clear(
        &self,
        doc: &mut TextDocument,
        from: &TextPosition,
        to: &TextPosition,
        replaced_lines: &[String],
    ) -> Result<TextPosition, SlokedError> {
        let newline = doc.newline().clone();
        if from.line == to.line {
            let line = doc.get_line(from.line)?.into_owned();
            let offset = char_byte_offset(&line, from.column);
            let middle = replaced_lines.first().cloned().unwrap_or_default();
            let mut new_line = String::with_capacity(line.len() + middle.len());
            new_line.push_str(&line[..offset]);
            new_line.push_str(&middle);
            new_line.push_str(&line[offset..]);
            doc.root_mut().set_line(from.line, new_line, &newline)?;
            return Ok(*from);
        }

        let merged = doc.get_line(from.line)?.into_owned();
        let split = char_byte_offset(&merged, from.column);
        let head = merged[..split].to_string();
        let tail = merged[split..].to_string();

        if replaced_lines.is_empty() {
            doc.root_mut().set_line(from.line, head, &newline)?;
            return Ok(*from);
        }

        doc.root_mut().set_line(from.line, format!("{head}{}", replaced_lines[0]), &newline)?;
        let last = replaced_lines.len() - 1;
        for (i, middle) in replaced_lines.iter().enumerate().take(last).skip(1) {
            doc.root_mut().insert_line(from.line + i as u64, middle.clone(), &newline)?;
        }
        if last > 0 {
            let reconstructed_to = format!("{}{tail}", replaced_lines[last]);
            doc.root_mut().insert_line(from.line + last as u64, reconstructed_to, &newline)?;
        }
        Ok(*from)
    }

    /// Earliest position this transaction touches — the `FragmentUpdater`
    /// (§4.4) rewinds its upstream tagger to this point on every commit or
    /// rollback, since nothing before it could have changed.
    pub fn affected_start(&self) -> TextPosition {
        match self {
            SlokedCursorTransaction::Insert { pos, .. }
            | SlokedCursorTransaction::Newline { pos, .. }
            | SlokedCursorTransaction::DeleteForward { pos, .. }
            | SlokedCursorTransaction::DeleteBackward { pos, .. } => *pos,
            SlokedCursorTransaction::Clear { from, .. } => *from,
            SlokedCursorTransaction::Batch { children } => {
                children.iter().map(|c| c.affected_start()).min().unwrap_or(TextPosition::MIN)
            }
        }
    }

    pub fn commit_patch(&self) -> SlokedTransactionPatch {
        let mut patch = SlokedTransactionPatch::new();
        self.write_patch(&mut patch);
        patch
    }

    fn write_patch(&self, patch: &mut SlokedTransactionPatch) {
        match self {
            SlokedCursorTransaction::Insert { pos, content } => {
                let width = codepoint_width(content) as i64;
                patch.current_mut().insert(
                    *pos,
                    TextPosition::new(pos.line + 1, 0),
                    TextPositionDelta::new(0, width),
                );
            }
            SlokedCursorTransaction::Newline { pos, content } => {
                let carried = codepoint_width(content) as i64;
                patch.current_mut().insert(
                    *pos,
                    TextPosition::new(pos.line + 1, 0),
                    TextPositionDelta::new(1, carried - pos.column as i64),
                );
                patch.current_mut().insert(
                    TextPosition::new(pos.line + 1, 0),
                    TextPosition::new(u64::MAX, u64::MAX),
                    TextPositionDelta::new(1, 0),
                );
            }
            SlokedCursorTransaction::DeleteForward { pos, width, .. } => {
                patch.current_mut().insert(
                    *pos,
                    TextPosition::new(pos.line + 1, 0),
                    TextPositionDelta::new(0, -(*width as i64)),
                );
            }
            SlokedCursorTransaction::DeleteBackward { pos, width, .. } => {
                let anchor = TextPosition::new(pos.line, pos.column.saturating_sub(*width));
                patch.current_mut().insert(
                    anchor,
                    TextPosition::new(pos.line + 1, 0),
                    TextPositionDelta::new(0, -(*width as i64)),
                );
            }
            SlokedCursorTransaction::Clear { from, to, .. } => {
                let line_delta = from.line as i64 - to.line as i64;
                let column_delta = from.column as i64 - to.column as i64;
                patch.current_mut().insert(
                    *to,
                    TextPosition::new(to.line + 1, 0),
                    TextPositionDelta::new(line_delta, column_delta),
                );
                patch.current_mut().insert(
                    TextPosition::new(to.line + 1, 0),
                    TextPosition::new(u64::MAX, u64::MAX),
                    TextPositionDelta::new(line_delta, 0),
                );
            }
            SlokedCursorTransaction::Batch { children } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        patch.next_transaction();
                    }
                    child.write_patch(patch);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newline::NewLine;

    #[test]
    fn insert_then_rollback_restores_document() {
        let mut doc = TextDocument::new("alpha\nbeta\ngamma", NewLine::Lf);
        let t = SlokedCursorTransaction::Insert { pos: TextPosition::new(1, 0), content: "X".to_string() };
        t.commit(&mut doc).unwrap();
        assert_eq!(doc.get_line(1).unwrap().as_ref(), "Xbeta");
        t.rollback(&mut doc).unwrap();
        assert_eq!(doc.get_line(1).unwrap().as_ref(), "beta");
    }

    #[test]
    fn newline_splits_and_rolls_back() {
        let mut doc = TextDocument::new("hello world", NewLine::Lf);
        let t = SlokedCursorTransaction::Newline { pos: TextPosition::new(0, 5), content: String::new() };
        t.commit(&mut doc).unwrap();
        assert_eq!(doc.last_line(), 1);
        assert_eq!(doc.get_line(0).unwrap().as_ref(), "hello");
        assert_eq!(doc.get_line(1).unwrap().as_ref(), " world");
        t.rollback(&mut doc).unwrap();
        assert_eq!(doc.last_line(), 0);
        assert_eq!(doc.get_line(0).unwrap().as_ref(), "hello world");
    }

    #[test]
    fn clear_same_line_round_trips() {
        let mut doc = TextDocument::new("hello world", NewLine::Lf);
        let t = SlokedCursorTransaction::Clear {
            from: TextPosition::new(0, 5),
            to: TextPosition::new(0, 11),
            replaced_lines: vec![" world".to_string()],
        };
        t.commit(&mut doc).unwrap();
        assert_eq!(doc.get_line(0).unwrap().as_ref(), "hello");
        t.rollback(&mut doc).unwrap();
        assert_eq!(doc.get_line(0).unwrap().as_ref(), "hello world");
    }

    #[test]
    fn clear_multi_line_round_trips() {
        let mut doc = TextDocument::new("alpha\nbeta\ngamma", NewLine::Lf);
        let t = SlokedCursorTransaction::Clear {
            from: TextPosition::new(0, 3),
            to: TextPosition::new(2, 2),
            replaced_lines: vec!["ha".to_string(), "beta".to_string(), "ga".to_string()],
        };
        t.commit(&mut doc).unwrap();
        assert_eq!(doc.last_line(), 0);
        assert_eq!(doc.get_line(0).unwrap().as_ref(), "alpmma");
        t.rollback(&mut doc).unwrap();
        assert_eq!(doc.last_line(), 2);
        assert_eq!(doc.get_line(0).unwrap().as_ref(), "alpha");
        assert_eq!(doc.get_line(1).unwrap().as_ref(), "beta");
        assert_eq!(doc.get_line(2).unwrap().as_ref(), "gamma");
    }

    #[test]
    fn newline_patch_rebases_positions_on_lines_below() {
        let t = SlokedCursorTransaction::Newline { pos: TextPosition::new(0, 5), content: String::new() };
        let patch = t.commit_patch();
        assert_eq!(patch.apply(TextPosition::new(0, 8)), TextPosition::new(1, 3));
        assert_eq!(patch.apply(TextPosition::new(2, 4)), TextPosition::new(3, 4));
    }

    #[test]
    fn clear_multi_line_patch_rebases_positions_on_lines_below() {
        let t = SlokedCursorTransaction::Clear {
            from: TextPosition::new(0, 3),
            to: TextPosition::new(2, 2),
            replaced_lines: vec!["ha".to_string(), "beta".to_string(), "ga".to_string()],
        };
        let patch = t.commit_patch();
        assert_eq!(patch.apply(TextPosition::new(2, 4)), TextPosition::new(0, 5));
        assert_eq!(patch.apply(TextPosition::new(5, 1)), TextPosition::new(3, 1));
    }

    #[test]
    fn insert_on_crlf_document_preserves_other_lines() {
        let mut doc = TextDocument::new("alpha\r\nbeta\r\ngamma", NewLine::CrLf);
        let t = SlokedCursorTransaction::Insert { pos: TextPosition::new(1, 0), content: "X".to_string() };
        t.commit(&mut doc).unwrap();
        assert_eq!(doc.get_line(1).unwrap().as_ref(), "Xbeta");
        assert_eq!(doc.get_line(0).unwrap().as_ref(), "alpha");
        assert_eq!(doc.get_line(2).unwrap().as_ref(), "gamma");
    }

    #[test]
    fn invalid_position_rejected_without_mutation() {
        let mut doc = TextDocument::new("alpha", NewLine::Lf);
        let t = SlokedCursorTransaction::Insert { pos: TextPosition::new(5, 0), content: "x".to_string() };
        assert_eq!(t.commit(&mut doc), Err(SlokedError::InvalidPosition));
        assert_eq!(doc.get_line(0).unwrap().as_ref(), "alpha");
    }
}
