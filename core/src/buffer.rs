//! Line-oriented text buffer capability and an in-memory implementation.
//!
//! Columns are UTF-16 code units, matching the offsets produced by the
//! checker service.

use std::collections::BTreeMap;

use crate::{Position, Range};

/// Editing surface the overlay reads from and writes to.
pub trait TextBuffer {
    fn line_count(&self) -> usize;

    fn line(&self, index: usize) -> Option<&str>;

    /// Replace `[from, to)` with `text`.
    fn replace_range(&mut self, from: Position, to: Position, text: &str);

    fn add_highlight(&mut self, range: Range, tag: &str);

    fn remove_highlight(&mut self, tag: &str);

    /// Toggle the "selected" look of an existing highlight.
    fn set_highlight_focus(&mut self, _tag: &str, _focused: bool) {}

    /// Line length in UTF-16 code units.
    fn line_len(&self, index: usize) -> usize {
        self.line(index).map(utf16_len).unwrap_or(0)
    }

    /// Whole document joined with single `\n` separators.
    fn text(&self) -> String {
        let mut out = String::new();
        for idx in 0..self.line_count() {
            if idx > 0 {
                out.push('\n');
            }
            out.push_str(self.line(idx).unwrap_or(""));
        }
        out
    }
}

pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Byte index of a UTF-16 column, clamped to the end of `line`. Columns
/// landing inside a surrogate pair snap forward to the next char boundary.
pub fn utf16_to_byte(line: &str, column: usize) -> usize {
    let mut units = 0;
    for (idx, ch) in line.char_indices() {
        if units >= column {
            return idx;
        }
        units += ch.len_utf16();
    }
    line.len()
}

/// A highlight currently shown in a [`LineBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub range: Range,
    pub focused: bool,
}

/// `Vec<String>`-backed buffer with tagged highlight marks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    marks: BTreeMap<String, Mark>,
}

impl LineBuffer {
    /// Split `text` on `\n`. An empty string yields a single empty line.
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            marks: BTreeMap::new(),
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            marks: BTreeMap::new(),
        }
    }

    /// Replace the whole content. Existing marks are dropped.
    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
        self.marks.clear();
    }

    pub fn highlights(&self) -> impl Iterator<Item = (&str, &Mark)> {
        self.marks.iter().map(|(tag, mark)| (tag.as_str(), mark))
    }

    pub fn highlight(&self, tag: &str) -> Option<&Mark> {
        self.marks.get(tag)
    }

    fn clamp(&self, pos: Position) -> (usize, usize) {
        let line = pos.line.min(self.lines.len().saturating_sub(1));
        let text = &self.lines[line];
        (line, utf16_to_byte(text, pos.column))
    }
}

impl TextBuffer for LineBuffer {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    fn replace_range(&mut self, from: Position, to: Position, text: &str) {
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        let (from_line, from_byte) = self.clamp(from);
        let (to_line, to_byte) = self.clamp(to);
        let from_byte = if from_line == to_line {
            from_byte.min(to_byte)
        } else {
            from_byte
        };

        let from_col = utf16_len(&self.lines[from_line][..from_byte]);
        let to_col = utf16_len(&self.lines[to_line][..to_byte]);
        let from = Position::new(from_line, from_col);
        let to = Position::new(to_line, to_col);

        let mut joined = String::with_capacity(from_byte + text.len());
        joined.push_str(&self.lines[from_line][..from_byte]);
        joined.push_str(text);
        joined.push_str(&self.lines[to_line][to_byte..]);
        let replacement: Vec<String> = joined.split('\n').map(str::to_string).collect();
        self.lines.splice(from_line..=to_line, replacement);

        let inserted_end = match text.rsplit_once('\n') {
            Some((head, tail)) => Position::new(
                from.line + head.matches('\n').count() + 1,
                utf16_len(tail),
            ),
            None => Position::new(from.line, from.column + utf16_len(text)),
        };
        for mark in self.marks.values_mut() {
            mark.range.from = shift(mark.range.from, from, to, inserted_end, false);
            mark.range.to = shift(mark.range.to, from, to, inserted_end, true);
        }
    }

    fn add_highlight(&mut self, range: Range, tag: &str) {
        self.marks.insert(
            tag.to_string(),
            Mark {
                range,
                focused: false,
            },
        );
    }

    fn remove_highlight(&mut self, tag: &str) {
        self.marks.remove(tag);
    }

    fn set_highlight_focus(&mut self, tag: &str, focused: bool) {
        if let Some(mark) = self.marks.get_mut(tag) {
            mark.focused = focused;
        }
    }
}

/// Move `pos` across an edit that replaced `[from, to)` with text ending at
/// `inserted_end`.
fn shift(
    pos: Position,
    from: Position,
    to: Position,
    inserted_end: Position,
    is_end: bool,
) -> Position {
    let untouched = if is_end {
        pos <= from
    } else {
        pos < from || (pos == from && from < to)
    };
    if untouched {
        return pos;
    }
    if pos < to {
        return if is_end { inserted_end } else { from };
    }
    if pos.line == to.line {
        Position::new(inserted_end.line, inserted_end.column + (pos.column - to.column))
    } else {
        Position::new(pos.line - to.line + inserted_end.line, pos.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(l1: usize, c1: usize, l2: usize, c2: usize) -> Range {
        Range::new(Position::new(l1, c1), Position::new(l2, c2))
    }

    #[test]
    fn joins_lines_with_newlines() {
        let buffer = LineBuffer::new("ab\ncd\n");
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.text(), "ab\ncd\n");
    }

    #[test]
    fn replaces_within_a_line() {
        let mut buffer = LineBuffer::new("I has a cat");
        buffer.replace_range(Position::new(0, 2), Position::new(0, 5), "have");
        assert_eq!(buffer.text(), "I have a cat");
    }

    #[test]
    fn clamps_columns_past_line_end() {
        let mut buffer = LineBuffer::new("short\nnext");
        buffer.replace_range(Position::new(0, 3), Position::new(0, 40), "!");
        assert_eq!(buffer.text(), "sho!\nnext");
    }

    #[test]
    fn splits_lines_on_multiline_replacement() {
        let mut buffer = LineBuffer::new("one two");
        buffer.replace_range(Position::new(0, 3), Position::new(0, 4), "\n");
        assert_eq!(buffer.line_count(), 2);
        assert_eq!(buffer.line(1), Some("two"));
    }

    #[test]
    fn columns_are_utf16_units() {
        let mut buffer = LineBuffer::new("😀 teh");
        assert_eq!(buffer.line_len(0), 6);
        buffer.replace_range(Position::new(0, 3), Position::new(0, 6), "the");
        assert_eq!(buffer.text(), "😀 the");
    }

    #[test]
    fn marks_after_an_edit_follow_their_text() {
        let mut buffer = LineBuffer::new("a bb ccc\nddd");
        buffer.add_highlight(range(0, 5, 0, 8), "ccc");
        buffer.add_highlight(range(1, 0, 1, 3), "ddd");
        buffer.add_highlight(range(0, 0, 0, 1), "a");
        buffer.replace_range(Position::new(0, 2), Position::new(0, 4), "b");

        assert_eq!(buffer.highlight("ccc").unwrap().range, range(0, 4, 0, 7));
        assert_eq!(buffer.highlight("ddd").unwrap().range, range(1, 0, 1, 3));
        assert_eq!(buffer.highlight("a").unwrap().range, range(0, 0, 0, 1));
    }

    #[test]
    fn marks_on_later_lines_move_with_inserted_lines() {
        let mut buffer = LineBuffer::new("x\ny");
        buffer.add_highlight(range(1, 0, 1, 1), "y");
        buffer.replace_range(Position::new(0, 1), Position::new(0, 1), "\n\n");
        assert_eq!(buffer.highlight("y").unwrap().range, range(3, 0, 3, 1));
    }

    #[test]
    fn focus_toggles_existing_mark_only() {
        let mut buffer = LineBuffer::new("text");
        buffer.add_highlight(range(0, 0, 0, 4), "t");
        buffer.set_highlight_focus("t", true);
        buffer.set_highlight_focus("missing", true);
        assert!(buffer.highlight("t").unwrap().focused);
        assert_eq!(buffer.highlights().count(), 1);
    }
}
