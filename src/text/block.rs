//! `TextBlock` — the abstract contract every rope node satisfies (§3).

use crate::error::SlokedError;
use crate::newline::NewLine;

/// A view of one line's bytes, returned by `get_line`. Borrowed where
/// possible (materialised chunks), owned where a line crosses an internal
/// join (region straddling begin/content/end).
pub type LineView<'a> = std::borrow::Cow<'a, str>;

pub trait TextBlock: std::fmt::Debug {
    /// Index of the last line, 0 if the block holds exactly one (possibly
    /// empty) line.
    fn last_line(&self) -> u64;

    /// Total content length in bytes, excluding synthesised separators.
    fn total_length(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.total_length() == 0
    }

    fn get_line(&self, line: u64) -> Result<LineView<'_>, SlokedError>;

    /// Invoke `visitor(line_index, content)` for every line in
    /// `[start, start + count)`.
    fn visit(
        &self,
        start: u64,
        count: u64,
        visitor: &mut dyn FnMut(u64, &str),
    ) -> Result<(), SlokedError>;

    fn set_line(&mut self, line: u64, content: String, newline: &NewLine) -> Result<(), SlokedError>;

    fn erase_line(&mut self, line: u64, newline: &NewLine) -> Result<(), SlokedError>;

    fn insert_line(&mut self, line: u64, content: String, newline: &NewLine) -> Result<(), SlokedError>;

    /// `compact()` then `balance()` — drops empty children and restores the
    /// AVL invariant without changing content.
    fn optimize(&mut self, newline: &NewLine);

    /// AVL height of this node; leaves (no children) are height 0.
    fn height(&self) -> i64;
}
