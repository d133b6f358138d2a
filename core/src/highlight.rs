use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::buffer::TextBuffer;
use crate::{mapper, Issue, OriginalWord};

pub const HIGHLIGHT_CLASS: &str = "orthography-highlight";

/// Identity of one painted highlight. `cycle` is never reused, so ids from
/// an older cycle can not collide with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HighlightId {
    pub cycle: u64,
    pub slot: usize,
    pub begin: i64,
}

impl HighlightId {
    /// Tag handed to the buffer.
    pub fn tag(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{HIGHLIGHT_CLASS} begin-{} c{}-{}",
            self.begin, self.cycle, self.slot
        )
    }
}

/// Paints and clears the buffer marks for one check cycle at a time.
#[derive(Debug, Default)]
pub struct HighlightController {
    cycle: u64,
    painted: BTreeSet<HighlightId>,
    focused: Option<HighlightId>,
}

impl HighlightController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything and start tagging with `cycle`.
    pub fn start_cycle<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B, cycle: u64) {
        self.clear_all(buffer);
        self.cycle = cycle;
    }

    /// Mark `issue` in the buffer. Returns `None` when its offset no longer
    /// maps; the issue simply has no highlight then.
    pub fn paint<B: TextBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
        slot: usize,
        issue: &Issue,
    ) -> Option<HighlightId> {
        let word = OriginalWord::of(issue);
        let Some(range) = mapper::span(buffer, &word) else {
            debug!(begin = issue.begin, slot, "offset does not map; skipping highlight");
            return None;
        };
        let id = HighlightId {
            cycle: self.cycle,
            slot,
            begin: issue.begin,
        };
        buffer.add_highlight(range, &id.tag());
        self.painted.insert(id);
        Some(id)
    }

    pub fn remove<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B, id: HighlightId) -> bool {
        if !self.painted.remove(&id) {
            return false;
        }
        if self.focused == Some(id) {
            self.focused = None;
        }
        buffer.remove_highlight(&id.tag());
        true
    }

    /// Remove every highlight this controller painted. Safe to repeat.
    pub fn clear_all<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) {
        for id in std::mem::take(&mut self.painted) {
            buffer.remove_highlight(&id.tag());
        }
        self.focused = None;
    }

    /// Give `id` the selected look, dropping it from any other highlight.
    pub fn focus<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B, id: HighlightId) -> bool {
        if !self.painted.contains(&id) {
            return false;
        }
        if let Some(previous) = self.focused.replace(id) {
            if previous != id {
                buffer.set_highlight_focus(&previous.tag(), false);
            }
        }
        buffer.set_highlight_focus(&id.tag(), true);
        true
    }

    pub fn unfocus<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B, id: HighlightId) {
        if self.focused == Some(id) {
            self.focused = None;
            buffer.set_highlight_focus(&id.tag(), false);
        }
    }

    pub fn focused(&self) -> Option<HighlightId> {
        self.focused
    }

    pub fn contains(&self, id: HighlightId) -> bool {
        self.painted.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.painted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.painted.is_empty()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}
