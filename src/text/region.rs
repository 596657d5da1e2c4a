//! `TextRegion` — a purely structural AVL node concatenating three
//! sub-trees (`begin`, `content`, `end`); no middle string of its own.
//! Ported from `TextRegion.h`/`TextRegion.cpp`. `TextView::open` builds a
//! left-leaning spine of these over the chunks it emits.

use crate::error::SlokedError;
use crate::newline::NewLine;
use crate::text::block::{LineView, TextBlock};
use crate::text::node::TextNode;

#[derive(Debug)]
pub struct TextRegion {
    begin: Option<Box<TextNode>>,
    content: Box<TextNode>,
    end: Option<Box<TextNode>>,
    height: i64,
    last_line: u64,
    total_length: u64,
}

impl TextRegion {
    pub fn new(begin: Option<Box<TextNode>>, content: Box<TextNode>, end: Option<Box<TextNode>>, newline: &NewLine) -> TextRegion {
        let mut region = TextRegion {
            begin,
            content,
            end,
            height: 0,
            last_line: 0,
            total_length: 0,
        };
        region.rebuild(newline);
        region
    }

    fn begin_lines(&self) -> u64 {
        self.begin.as_ref().map(|b| b.last_line() + 1).unwrap_or(0)
    }

    fn content_lines(&self) -> u64 {
        self.content.last_line() + 1
    }

    fn end_lines(&self) -> u64 {
        self.end.as_ref().map(|e| e.last_line() + 1).unwrap_or(0)
    }

    fn rebuild(&mut self, newline: &NewLine) {
        self.last_line = self.begin_lines() + self.content_lines() + self.end_lines() - 1;

        let mut total = 0u64;
        if let Some(b) = &self.begin {
            total += b.total_length();
            total += newline.width() as u64;
        }
        total += self.content.total_length();
        if let Some(e) = &self.end {
            total += newline.width() as u64;
            total += e.total_length();
        }
        self.total_length = total;

        let bh = self.begin.as_ref().map(|b| b.height()).unwrap_or(-1);
        let eh = self.end.as_ref().map(|e| e.height()).unwrap_or(-1);
        self.height = 1 + bh.max(self.content.height()).max(eh);
    }

    /// Route `line` to whichever of the three sub-trees owns it, returning
    /// `(child, line_within_child)`.
    fn route(&self, line: u64) -> Result<Route, SlokedError> {
        let begin_lines = self.begin_lines();
        let content_lines = self.content_lines();
        if line < begin_lines {
            return Ok(Route::Begin(line));
        }
        if line < begin_lines + content_lines {
            return Ok(Route::Content(line - begin_lines));
        }
        if line <= self.last_line {
            return Ok(Route::End(line - begin_lines - content_lines));
        }
        Err(SlokedError::InvalidPosition)
    }

    fn route_mut(&mut self, line: u64) -> Result<RouteMut, SlokedError> {
        // Delegates to `route`: the routing decision never depends on `&mut`.
        match self.route(line)? {
            Route::Begin(l) => Ok(RouteMut::Begin(l)),
            Route::Content(l) => Ok(RouteMut::Content(l)),
            Route::End(l) => Ok(RouteMut::End(l)),
        }
    }

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
}

enum Route {
    Begin(u64),
    Content(u64),
    End(u64),
}

enum RouteMut {
    Begin(u64),
    Content(u64),
    End(u64),
}

impl TextBlock for TextRegion {
    fn last_line(&self) -> u64 {
        self.last_line
    }

    fn total_length(&self) -> u64 {
        self.total_length
    }

    fn get_line(&self, line: u64) -> Result<LineView<'_>, SlokedError> {
        match self.route(line)? {
            Route::Begin(l) => self.begin.as_ref().unwrap().get_line(l),
            Route::Content(l) => self.content.get_line(l),
            Route::End(l) => self.end.as_ref().unwrap().get_line(l),
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
        match self.route_mut(line)? {
            RouteMut::Begin(l) => self.begin.as_mut().unwrap().set_line(l, content, newline)?,
            RouteMut::Content(l) => self.content.set_line(l, content, newline)?,
            RouteMut::End(l) => self.end.as_mut().unwrap().set_line(l, content, newline)?,
        }
        self.rebuild(newline);
        Ok(())
    }

    fn erase_line(&mut self, line: u64, newline: &NewLine) -> Result<(), SlokedError> {
        match self.route_mut(line)? {
            RouteMut::Begin(l) => self.begin.as_mut().unwrap().erase_line(l, newline)?,
            RouteMut::Content(l) => self.content.erase_line(l, newline)?,
            RouteMut::End(l) => self.end.as_mut().unwrap().erase_line(l, newline)?,
        }
        self.rebuild(newline);
        self.compact(newline);
        Ok(())
    }

    fn insert_line(&mut self, line: u64, content: String, newline: &NewLine) -> Result<(), SlokedError> {
        if line > self.last_line + 1 {
            return Err(SlokedError::InvalidPosition);
        }
        if line == self.last_line + 1 {
            if let Some(end) = self.end.as_mut() {
                end.insert_line(line - self.begin_lines() - self.content_lines(), content, newline)?;
            } else {
                self.content.insert_line(self.content.last_line() + 1, content, newline)?;
            }
        } else {
            match self.route_mut(line)? {
                RouteMut::Begin(l) => self.begin.as_mut().unwrap().insert_line(l, content, newline)?,
                RouteMut::Content(l) => self.content.insert_line(l, content, newline)?,
                RouteMut::End(l) => self.end.as_mut().unwrap().insert_line(l, content, newline)?,
            }
        }
        self.rebuild(newline);
        Ok(())
    }

    fn optimize(&mut self, newline: &NewLine) {
        if let Some(b) = self.begin.as_mut() {
            b.optimize(newline);
        }
        self.content.optimize(newline);
        if let Some(e) = self.end.as_mut() {
            e.optimize(newline);
        }
        self.compact(newline);
    }

    fn height(&self) -> i64 {
        self.height
    }
}
