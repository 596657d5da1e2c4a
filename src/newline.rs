//! `NewLine` — the line-separator policy injected into every rope mutation.
//!
//! Supplemented from `examples/original_source/headers/sloked/core/NewLine.h`:
//! the distilled spec only says "the configured `NewLine` strategy" in
//! passing, but the original makes the separator a first-class, explicitly
//! injected policy (`NewLine::LF`, `NewLine::CRLF`, `NewLine::Create`) with a
//! `width()` and an `iterate()` callback invoked at every separator
//! occurrence. We keep that shape instead of hardcoding `'\n'` anywhere in
//! the text store.

/// The active line-separator strategy. `Custom` exists because the original
/// constructs a `NewLine` from an arbitrary symbol string
/// (`NewLine::Create(sep, encoding)`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NewLine {
    Lf,
    CrLf,
    Custom(String),
}

impl NewLine {
    pub fn symbol(&self) -> &str {
        match self {
            NewLine::Lf => "\n",
            NewLine::CrLf => "\r\n",
            NewLine::Custom(s) => s,
        }
    }

    /// Byte width of the separator.
    pub fn width(&self) -> usize {
        self.symbol().len()
    }

    /// Invoke `visitor(offset, width)` for every separator occurrence in
    /// `content`, in order. `offset` is the byte offset of the separator's
    /// first byte; `width` is `self.width()`.
    pub fn iterate(&self, content: &str, mut visitor: impl FnMut(usize, usize)) {
        let sep = self.symbol();
        let width = sep.len();
        if width == 0 {
            return;
        }
        let mut start = 0;
        while let Some(found) = content[start..].find(sep) {
            let offset = start + found;
            visitor(offset, width);
            start = offset + width;
        }
    }

    /// Number of separator occurrences in `content` — one less than the
    /// resulting line count.
    pub fn count(&self, content: &str) -> usize {
        let mut n = 0;
        self.iterate(content, |_, _| n += 1);
        n
    }

    /// Split `content` into lines, dropping the separators themselves.
    pub fn split<'a>(&self, content: &'a str) -> Vec<&'a str> {
        let mut lines = Vec::new();
        let mut start = 0;
        self.iterate(content, |offset, width| {
            lines.push(&content[start..offset]);
            start = offset + width;
        });
        lines.push(&content[start..]);
        lines
    }

    pub fn join(&self, lines: &[impl AsRef<str>]) -> String {
        let mut out = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.push_str(self.symbol());
            }
            out.push_str(line.as_ref());
        }
        out
    }
}

impl Default for NewLine {
    fn default() -> Self {
        NewLine::Lf
    }
}

/// Narrow stand-in for the external codepoint-iteration collaborator (§1:
/// OUT OF SCOPE, referenced only by contract): the column component of a
/// `TextPosition` counts codepoints, so inserted text is measured in
/// codepoints rather than bytes wherever a patch computes `col += width(s)`.
pub fn codepoint_width(s: &str) -> u64 {
    s.chars().count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lf_splits_three_lines() {
        let nl = NewLine::Lf;
        assert_eq!(nl.split("alpha\nbeta\ngamma"), vec!["alpha", "beta", "gamma"]);
        assert_eq!(nl.count("alpha\nbeta\ngamma"), 2);
    }

    #[test]
    fn crlf_width_is_two() {
        let nl = NewLine::CrLf;
        assert_eq!(nl.width(), 2);
        assert_eq!(nl.split("a\r\nb"), vec!["a", "b"]);
    }

    #[test]
    fn join_is_inverse_of_split() {
        let nl = NewLine::Lf;
        let lines = nl.split("one\ntwo\nthree");
        assert_eq!(nl.join(&lines), "one\ntwo\nthree");
    }
}
