//! Orthography overlay core.
//! Maps the flat offsets returned by a remote grammar checker onto
//! line/column positions in a live text buffer, paints highlights at those
//! positions and applies chosen replacements while keeping the pending
//! issue list consistent.

pub mod buffer;
pub mod checker;
pub mod config;
pub mod cycle;
pub mod debounce;
pub mod error;
pub mod highlight;
pub mod issues;
pub mod mapper;
pub mod replace;

use serde::{Deserialize, Deserializer, Serialize};

pub use buffer::{utf16_len, LineBuffer, Mark, TextBuffer};
pub use checker::{CheckResponse, Checker, HttpChecker, DEFAULT_ENDPOINT};
pub use config::{Settings, DEFAULT_CONFIG_FILE};
pub use cycle::{CheckCycle, CheckOutcome, CycleSignal, CycleState, PendingCheck};
pub use debounce::Debouncer;
pub use error::{CheckError, ConfigError};
pub use highlight::{HighlightController, HighlightId};
pub use issues::{IssueSet, Pending};
pub use replace::{ReplaceOutcome, ReplacementEngine};

/// Issue category as reported by the checker service.
///
/// Unknown names collapse into [`Category::Other`].
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd,
)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Determiners,
    Formatting,
    BasicPunct,
    Wordiness,
    Conjunctions,
    Prepositions,
    #[default]
    Other,
}

/// How the presentation layer lets the user resolve an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// One suggestion per replacement string.
    Choose,
    /// A single click removes or rewrites the flagged text.
    Remove,
}

impl Category {
    pub fn interaction(self) -> Interaction {
        match self {
            Category::Formatting
            | Category::BasicPunct
            | Category::Wordiness
            | Category::Conjunctions => Interaction::Remove,
            Category::Determiners | Category::Prepositions | Category::Other => {
                Interaction::Choose
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Determiners => "Determiners",
            Category::Formatting => "Formatting",
            Category::BasicPunct => "BasicPunct",
            Category::Wordiness => "Wordiness",
            Category::Conjunctions => "Conjunctions",
            Category::Prepositions => "Prepositions",
            Category::Other => "Other",
        }
    }

    /// Case-insensitive lookup used by CLI and LSP filters.
    pub fn parse(name: &str) -> Option<Self> {
        let n = name.trim().to_lowercase();
        match n.as_str() {
            "determiners" => Some(Category::Determiners),
            "formatting" => Some(Category::Formatting),
            "basicpunct" | "basic-punct" | "punctuation" => Some(Category::BasicPunct),
            "wordiness" => Some(Category::Wordiness),
            "conjunctions" => Some(Category::Conjunctions),
            "prepositions" => Some(Category::Prepositions),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Determiners" => Category::Determiners,
            "Formatting" => Category::Formatting,
            "BasicPunct" => Category::BasicPunct,
            "Wordiness" => Category::Wordiness,
            "Conjunctions" => Category::Conjunctions,
            "Prepositions" => Category::Prepositions,
            _ => Category::Other,
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation grouping attached to an issue card.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CardLayout {
    #[serde(deserialize_with = "nullable")]
    pub group: String,
}

/// A single flagged span returned by the checker.
///
/// `begin` is a flat UTF-16 offset into the checked text, counting one
/// position per `\n` separator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Issue {
    #[serde(deserialize_with = "nullable")]
    pub begin: i64,
    pub end: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub text: String,
    #[serde(deserialize_with = "nullable")]
    pub highlight_text: String,
    #[serde(deserialize_with = "nullable")]
    pub replacements: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub category: Category,
    #[serde(deserialize_with = "nullable")]
    pub impact: String,
    #[serde(deserialize_with = "nullable")]
    pub explanation: String,
    #[serde(deserialize_with = "nullable")]
    pub minicard_title: String,
    #[serde(deserialize_with = "nullable")]
    pub card_layout: CardLayout,
    #[serde(deserialize_with = "nullable")]
    pub hidden: bool,
}

impl Issue {
    /// Length of the flagged text, preferring `text` over `highlightText`.
    pub fn len(&self) -> usize {
        if self.text.is_empty() {
            utf16_len(&self.highlight_text)
        } else {
            utf16_len(&self.text)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn end(&self) -> i64 {
        self.end
            .unwrap_or_else(|| self.begin.saturating_add(self.len() as i64))
    }

    /// Length overwritten by a replacement. Prepositions anchor on the
    /// display text, every other category on the raw text.
    pub fn anchor_len(&self) -> usize {
        match self.category {
            Category::Prepositions if !self.highlight_text.is_empty() => {
                utf16_len(&self.highlight_text)
            }
            _ => self.len(),
        }
    }

    /// Replacement choices in display order.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        let anchor_len = self.anchor_len();
        match self.category.interaction() {
            Interaction::Remove => vec![Suggestion {
                replacement: self.replacements.first().cloned().unwrap_or_default(),
                anchor_len,
            }],
            Interaction::Choose => self
                .replacements
                .iter()
                .map(|replacement| Suggestion {
                    replacement: replacement.clone(),
                    anchor_len,
                })
                .collect(),
        }
    }
}

/// One way to resolve an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub replacement: String,
    pub anchor_len: usize,
}

/// Resolved anchor used for highlighting and replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalWord {
    pub begin: i64,
    pub end: i64,
    pub len: usize,
}

impl OriginalWord {
    /// Anchor painted for an issue.
    pub fn of(issue: &Issue) -> Self {
        let len = issue.len();
        Self {
            begin: issue.begin,
            end: issue.begin.saturating_add(len as i64),
            len,
        }
    }

    /// Anchor overwritten when a replacement for `issue` is applied.
    pub fn anchor(issue: &Issue) -> Self {
        let len = issue.anchor_len();
        Self {
            begin: issue.begin,
            end: issue.begin.saturating_add(len as i64),
            len,
        }
    }
}

/// Zero-based line and UTF-16 column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    pub from: Position,
    pub to: Position,
}

impl Range {
    pub fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }
}

/// `null` reads as the field's default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_alert() {
        let raw = r#"{
            "begin": 12,
            "text": "teh",
            "highlightText": "teh",
            "replacements": ["the"],
            "category": "Misspelled",
            "impact": "critical",
            "explanation": "Spelling mistake",
            "minicardTitle": null,
            "cardLayout": {"group": "Correctness"},
            "hidden": false
        }"#;
        let issue: Issue = serde_json::from_str(raw).unwrap();
        assert_eq!(issue.begin, 12);
        assert_eq!(issue.category, Category::Other);
        assert_eq!(issue.minicard_title, "");
        assert_eq!(issue.card_layout.group, "Correctness");
        assert_eq!(issue.end(), 15);
    }

    #[test]
    fn null_fields_read_as_defaults() {
        let raw = r#"{
            "begin": null,
            "text": "teh",
            "replacements": null,
            "category": null,
            "cardLayout": null,
            "hidden": null
        }"#;
        let issue: Issue = serde_json::from_str(raw).unwrap();
        assert_eq!(issue.begin, 0);
        assert!(issue.replacements.is_empty());
        assert_eq!(issue.category, Category::Other);
        assert!(!issue.hidden);
    }

    #[test]
    fn huge_begin_saturates_instead_of_overflowing() {
        let issue = Issue {
            begin: i64::MAX,
            text: "x".into(),
            ..Issue::default()
        };
        assert_eq!(issue.end(), i64::MAX);
        assert_eq!(OriginalWord::of(&issue).end, i64::MAX);
        assert_eq!(OriginalWord::anchor(&issue).end, i64::MAX);
    }

    #[test]
    fn length_falls_back_to_highlight_text() {
        let issue = Issue {
            highlight_text: "word".into(),
            ..Issue::default()
        };
        assert_eq!(issue.len(), 4);
        assert_eq!(OriginalWord::of(&issue).len, 4);
    }

    #[test]
    fn length_counts_utf16_units() {
        let issue = Issue {
            text: "naïve 😀".into(),
            ..Issue::default()
        };
        assert_eq!(issue.len(), 8);
    }

    #[test]
    fn removal_categories_offer_single_suggestion() {
        let issue = Issue {
            text: "very".into(),
            category: Category::Wordiness,
            ..Issue::default()
        };
        let suggestions = issue.suggestions();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].replacement, "");
        assert_eq!(suggestions[0].anchor_len, 4);
    }

    #[test]
    fn prepositions_anchor_on_highlight_text() {
        let issue = Issue {
            text: "in".into(),
            highlight_text: "in the".into(),
            replacements: vec!["on".into(), "at".into()],
            category: Category::Prepositions,
            ..Issue::default()
        };
        let suggestions = issue.suggestions();
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions.iter().all(|s| s.anchor_len == 6));
    }

    #[test]
    fn category_round_trips_through_wire_name() {
        let json = serde_json::to_string(&Category::BasicPunct).unwrap();
        assert_eq!(json, "\"BasicPunct\"");
        assert_eq!(Category::parse("basic-punct"), Some(Category::BasicPunct));
    }
}
