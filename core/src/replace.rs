use tracing::debug;

use crate::buffer::{utf16_len, TextBuffer};
use crate::highlight::HighlightController;
use crate::issues::IssueSet;
use crate::{mapper, OriginalWord, Position};

/// Result of applying one replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The buffer was written; `remaining` issues are still pending.
    Applied { remaining: usize },
    /// The buffer was written and no issue is left.
    Exhausted,
    /// The anchor no longer maps onto the buffer. Nothing changed.
    Missed,
    /// No pending issue has that slot.
    Unknown,
}

/// Writes a chosen replacement over an issue's anchor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplacementEngine {
    shift_pending_offsets: bool,
}

impl ReplacementEngine {
    /// With `shift_pending_offsets` set, issues after the replaced span have
    /// their `begin` moved by the length difference. Without it every
    /// issue keeps the offset the service reported.
    pub fn new(shift_pending_offsets: bool) -> Self {
        Self {
            shift_pending_offsets,
        }
    }

    /// Resolve the anchor of the issue at `slot` against the current
    /// buffer, write `replacement` over it and drop the issue together with
    /// its highlight.
    pub fn apply<B: TextBuffer + ?Sized>(
        &self,
        buffer: &mut B,
        issues: &mut IssueSet,
        highlights: &mut HighlightController,
        slot: usize,
        replacement: &str,
    ) -> ReplaceOutcome {
        let Some(pending) = issues.get(slot) else {
            return ReplaceOutcome::Unknown;
        };
        let word = OriginalWord::anchor(&pending.issue);
        let Some(from) = mapper::resolve(buffer, word.begin) else {
            debug!(begin = word.begin, slot, "anchor does not map; replacement skipped");
            return ReplaceOutcome::Missed;
        };
        let to = Position::new(from.line, from.column + word.len);
        buffer.replace_range(from, to, replacement);

        if let Some(pending) = issues.remove(slot) {
            if let Some(id) = pending.highlight {
                highlights.remove(buffer, id);
            }
        }

        if self.shift_pending_offsets {
            let delta = utf16_len(replacement) as i64 - word.len as i64;
            for other in issues.iter_mut() {
                if other.issue.begin >= word.end {
                    other.issue.begin = other.issue.begin.saturating_add(delta);
                    if let Some(end) = other.issue.end.as_mut() {
                        *end = end.saturating_add(delta);
                    }
                }
            }
        }

        if issues.is_empty() {
            ReplaceOutcome::Exhausted
        } else {
            ReplaceOutcome::Applied {
                remaining: issues.len(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LineBuffer;
    use crate::Issue;

    fn issue(begin: i64, text: &str, explanation: &str) -> Issue {
        Issue {
            begin,
            text: text.into(),
            explanation: explanation.into(),
            ..Issue::default()
        }
    }

    fn setup(text: &str, raw: Vec<Issue>) -> (LineBuffer, IssueSet, HighlightController) {
        let mut buffer = LineBuffer::new(text);
        let mut issues = IssueSet::new();
        let mut highlights = HighlightController::new();
        issues.load(IssueSet::normalize(raw));
        for pending in issues.iter_mut() {
            pending.highlight = highlights.paint(&mut buffer, pending.slot, &pending.issue);
        }
        (buffer, issues, highlights)
    }

    #[test]
    fn writes_replacement_over_anchor() {
        let (mut buffer, mut issues, mut highlights) =
            setup("I has a cat", vec![issue(2, "has", "verb")]);
        let engine = ReplacementEngine::default();
        let outcome = engine.apply(&mut buffer, &mut issues, &mut highlights, 0, "have");
        assert_eq!(outcome, ReplaceOutcome::Exhausted);
        assert_eq!(buffer.text(), "I have a cat");
        assert!(highlights.is_empty());
        assert_eq!(buffer.highlights().count(), 0);
    }

    #[test]
    fn unmappable_anchor_leaves_everything_alone() {
        let (mut buffer, mut issues, mut highlights) =
            setup("I has a cat", vec![issue(2, "has", "verb")]);
        buffer.set_text("I");
        let engine = ReplacementEngine::default();
        let outcome = engine.apply(&mut buffer, &mut issues, &mut highlights, 0, "have");
        assert_eq!(outcome, ReplaceOutcome::Missed);
        assert_eq!(buffer.text(), "I");
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn unknown_slot_is_reported() {
        let (mut buffer, mut issues, mut highlights) =
            setup("I has a cat", vec![issue(2, "has", "verb")]);
        let engine = ReplacementEngine::default();
        let outcome = engine.apply(&mut buffer, &mut issues, &mut highlights, 5, "x");
        assert_eq!(outcome, ReplaceOutcome::Unknown);
    }

    #[test]
    fn empty_replacement_removes_text() {
        let (mut buffer, mut issues, mut highlights) =
            setup("It is very big", vec![issue(6, "very ", "wordy")]);
        let engine = ReplacementEngine::default();
        engine.apply(&mut buffer, &mut issues, &mut highlights, 0, "");
        assert_eq!(buffer.text(), "It is big");
    }

    #[test]
    fn later_offsets_stay_put_by_default() {
        let (mut buffer, mut issues, mut highlights) = setup(
            "I has a cat",
            vec![issue(2, "has", "verb"), issue(8, "cat", "noun")],
        );
        let engine = ReplacementEngine::default();
        engine.apply(&mut buffer, &mut issues, &mut highlights, 0, "have");
        assert_eq!(issues.get(1).unwrap().issue.begin, 8);
    }

    #[test]
    fn later_offsets_shift_when_enabled() {
        let (mut buffer, mut issues, mut highlights) = setup(
            "I has a cat",
            vec![issue(2, "has", "verb"), issue(8, "cat", "noun")],
        );
        let engine = ReplacementEngine::new(true);
        let outcome = engine.apply(&mut buffer, &mut issues, &mut highlights, 0, "have");
        assert_eq!(outcome, ReplaceOutcome::Applied { remaining: 1 });
        assert_eq!(issues.get(1).unwrap().issue.begin, 9);
        engine.apply(&mut buffer, &mut issues, &mut highlights, 1, "dog");
        assert_eq!(buffer.text(), "I have a dog");
    }
}
