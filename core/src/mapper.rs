//! Flat offset <-> line/column conversion against the live buffer.
//!
//! A flat offset counts every line's UTF-16 units plus one position for
//! each `\n` separator. The separator belongs to neither line: on
//! `"ab\ncd"` offset 2 is the end of line 0 and offset 3 the start of
//! line 1.

use crate::buffer::TextBuffer;
use crate::{OriginalWord, Position, Range};

/// Map `begin` to a position in `buffer`, or `None` when the offset no
/// longer fits. Lines are scanned first to last and the first line whose
/// bounds contain the offset wins.
pub fn resolve<B: TextBuffer + ?Sized>(buffer: &B, begin: i64) -> Option<Position> {
    let begin = usize::try_from(begin).ok()?;
    let mut consumed = 0usize;
    for line in 0..buffer.line_count() {
        let line_start = if line == 0 { consumed } else { consumed + 1 };
        consumed = line_start + buffer.line_len(line);
        if begin >= line_start && begin <= consumed {
            return Some(Position::new(line, begin - line_start));
        }
    }
    None
}

/// Inverse of [`resolve`]: the flat offset of `pos`, or `None` when `pos`
/// is outside the buffer.
pub fn flatten<B: TextBuffer + ?Sized>(buffer: &B, pos: Position) -> Option<usize> {
    if pos.line >= buffer.line_count() || pos.column > buffer.line_len(pos.line) {
        return None;
    }
    let prior: usize = (0..pos.line).map(|line| buffer.line_len(line)).sum();
    Some(prior + pos.line + pos.column)
}

/// Single-line range covered by `word`, starting where `word.begin`
/// resolves.
pub fn span<B: TextBuffer + ?Sized>(buffer: &B, word: &OriginalWord) -> Option<Range> {
    let from = resolve(buffer, word.begin)?;
    let to = Position::new(from.line, from.column + word.len);
    Some(Range::new(from, to))
}
