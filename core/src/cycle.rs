//! One check at a time: snapshot, remote call, normalise, paint.
//!
//! The network call is split from the state it updates. [`CheckCycle::begin`]
//! hands out a [`PendingCheck`] that owns everything the request needs, the
//! caller awaits it without holding the cycle, and [`CheckCycle::complete`]
//! applies the outcome only if that check is still the latest one.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buffer::TextBuffer;
use crate::checker::Checker;
use crate::config::Settings;
use crate::error::CheckError;
use crate::highlight::{HighlightController, HighlightId};
use crate::issues::{IssueSet, Pending};
use crate::replace::{ReplaceOutcome, ReplacementEngine};
use crate::{Category, Issue};

pub const NO_ISSUES_NOTICE: &str = "Spelling errors not found!";
pub const SERVER_ERROR_NOTICE: &str =
    "The server is not responding. Please check your Internet connection.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Checking { generation: u64 },
    Presenting,
    Failed,
}

/// What the presentation layer should show after a check settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleSignal {
    /// Sorted issues, each with its highlight when the offset mapped.
    Presented(Vec<Pending>),
    /// The service answered with nothing to report.
    NoIssues,
    /// The service could not be reached or answered garbage.
    ServiceUnreachable,
    /// A newer check replaced this one. Not shown to the user.
    Superseded,
}

impl CycleSignal {
    /// User-facing notice, if the signal warrants one.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            CycleSignal::NoIssues => Some(NO_ISSUES_NOTICE),
            CycleSignal::ServiceUnreachable => Some(SERVER_ERROR_NOTICE),
            CycleSignal::Presented(_) | CycleSignal::Superseded => None,
        }
    }
}

/// A check request detached from the cycle that issued it.
#[derive(Debug)]
pub struct PendingCheck<C> {
    generation: u64,
    token: CancellationToken,
    text: String,
    checker: Arc<C>,
}

impl<C: Checker> PendingCheck<C> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Call the checker, giving up as soon as the check is cancelled.
    pub async fn run(self) -> CheckOutcome {
        let PendingCheck {
            generation,
            token,
            text,
            checker,
        } = self;
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(CheckError::Cancelled),
            result = checker.check(text) => result,
        };
        CheckOutcome {
            generation,
            token,
            result,
        }
    }

    /// Settle the check with an already known result.
    pub fn settle(self, result: Result<Vec<Issue>, CheckError>) -> CheckOutcome {
        CheckOutcome {
            generation: self.generation,
            token: self.token,
            result,
        }
    }
}

/// A finished remote call waiting to be applied.
#[derive(Debug)]
pub struct CheckOutcome {
    generation: u64,
    token: CancellationToken,
    result: Result<Vec<Issue>, CheckError>,
}

impl CheckOutcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Orchestrates check cycles for the active document.
#[derive(Debug)]
pub struct CheckCycle<C> {
    checker: Arc<C>,
    state: CycleState,
    generation: u64,
    in_flight: Option<CancellationToken>,
    issues: IssueSet,
    highlights: HighlightController,
    replacer: ReplacementEngine,
    disabled: HashSet<Category>,
}

impl<C: Checker> CheckCycle<C> {
    pub fn new(checker: Arc<C>, settings: &Settings) -> Self {
        Self {
            checker,
            state: CycleState::Idle,
            generation: 0,
            in_flight: None,
            issues: IssueSet::new(),
            highlights: HighlightController::new(),
            replacer: ReplacementEngine::new(settings.shift_pending_offsets),
            disabled: settings.disabled_categories(),
        }
    }

    /// Pick up changed settings. Takes effect from the next check.
    pub fn configure(&mut self, settings: &Settings) {
        self.replacer = ReplacementEngine::new(settings.shift_pending_offsets);
        self.disabled = settings.disabled_categories();
    }

    pub fn set_checker(&mut self, checker: Arc<C>) {
        self.checker = checker;
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn issues(&self) -> &IssueSet {
        &self.issues
    }

    pub fn highlights(&self) -> &HighlightController {
        &self.highlights
    }

    /// Issues currently shown, in slot order.
    pub fn presented(&self) -> Vec<Pending> {
        self.issues.to_vec()
    }

    /// Start a new check, cancelling any check still in flight.
    pub fn begin<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) -> PendingCheck<C> {
        self.cancel_in_flight();
        self.clear(buffer);
        self.generation += 1;
        self.highlights.start_cycle(buffer, self.generation);

        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());
        self.state = CycleState::Checking {
            generation: self.generation,
        };
        info!(generation = self.generation, "check started");

        PendingCheck {
            generation: self.generation,
            token,
            text: buffer.text(),
            checker: Arc::clone(&self.checker),
        }
    }

    /// Apply a finished check. Outcomes from superseded or cancelled checks
    /// leave every piece of state untouched.
    pub fn complete<B: TextBuffer + ?Sized>(
        &mut self,
        outcome: CheckOutcome,
        buffer: &mut B,
    ) -> CycleSignal {
        if outcome.generation != self.generation || outcome.token.is_cancelled() {
            debug!(
                generation = outcome.generation,
                current = self.generation,
                "discarding superseded check"
            );
            return CycleSignal::Superseded;
        }
        self.in_flight = None;

        let raw = match outcome.result {
            Ok(raw) => raw,
            Err(CheckError::Cancelled) => {
                self.state = CycleState::Idle;
                return CycleSignal::Superseded;
            }
            Err(err) => {
                warn!(generation = outcome.generation, error = %err, "check failed");
                self.state = CycleState::Failed;
                return CycleSignal::ServiceUnreachable;
            }
        };

        let raw: Vec<Issue> = raw
            .into_iter()
            .filter(|issue| !self.disabled.contains(&issue.category))
            .collect();
        let ordered = IssueSet::normalize(raw);
        if ordered.is_empty() {
            info!(generation = outcome.generation, "no issues found");
            self.state = CycleState::Idle;
            return CycleSignal::NoIssues;
        }

        self.issues.load(ordered);
        for pending in self.issues.iter_mut() {
            pending.highlight = self.highlights.paint(buffer, pending.slot, &pending.issue);
        }
        self.state = CycleState::Presenting;
        info!(
            generation = outcome.generation,
            issues = self.issues.len(),
            highlights = self.highlights.len(),
            "presenting issues"
        );
        CycleSignal::Presented(self.presented())
    }

    /// Run a whole check in place.
    pub async fn check_now<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) -> CycleSignal {
        let pending = self.begin(buffer);
        let outcome = pending.run().await;
        self.complete(outcome, buffer)
    }

    /// The document changed under the presented issues: drop them and any
    /// check still computed against the old text.
    pub fn invalidate<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) {
        self.cancel_in_flight();
        self.clear(buffer);
        self.state = CycleState::Idle;
    }

    /// The overlay was closed or the check aborted.
    pub fn close<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) {
        self.invalidate(buffer);
    }

    /// Write `replacement` over the issue at `slot`.
    pub fn replace<B: TextBuffer + ?Sized>(
        &mut self,
        slot: usize,
        replacement: &str,
        buffer: &mut B,
    ) -> ReplaceOutcome {
        if self.state != CycleState::Presenting {
            return ReplaceOutcome::Unknown;
        }
        let outcome = self.replacer.apply(
            buffer,
            &mut self.issues,
            &mut self.highlights,
            slot,
            replacement,
        );
        if outcome == ReplaceOutcome::Exhausted {
            self.state = CycleState::Idle;
        }
        outcome
    }

    /// Select the highlight belonging to `slot`.
    pub fn focus<B: TextBuffer + ?Sized>(&mut self, slot: usize, buffer: &mut B) -> bool {
        match self.highlight_of(slot) {
            Some(id) => self.highlights.focus(buffer, id),
            None => false,
        }
    }

    pub fn unfocus<B: TextBuffer + ?Sized>(&mut self, slot: usize, buffer: &mut B) {
        if let Some(id) = self.highlight_of(slot) {
            self.highlights.unfocus(buffer, id);
        }
    }

    fn highlight_of(&self, slot: usize) -> Option<HighlightId> {
        self.issues.get(slot).and_then(|pending| pending.highlight)
    }

    fn cancel_in_flight(&mut self) {
        if let Some(token) = self.in_flight.take() {
            debug!(generation = self.generation, "cancelling in-flight check");
            token.cancel();
        }
    }

    fn clear<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) {
        self.highlights.clear_all(buffer);
        self.issues.clear();
    }
}
