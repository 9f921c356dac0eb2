//! Step history: the undo stack.
//!
//! One snapshot is pushed per user turn, before any mutation. Entries
//! are deep copies — mutating the live context after a push (or after an
//! undo returns an entry) never touches what was captured.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::context::{Message, TreatmentContext};

/// One undo snapshot: the context and transcript exactly as they were
/// before a turn ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepHistoryEntry {
    pub context: TreatmentContext,
    pub message_log: Vec<Message>,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot stack for one session. A `max_entries` of zero means
/// unbounded; otherwise the oldest entry is dropped on overflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepHistory {
    entries: VecDeque<StepHistoryEntry>,
    #[serde(default)]
    max_entries: usize,
}

impl StepHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    /// Deep-copy the context and transcript onto the stack.
    pub fn snapshot(&mut self, context: &TreatmentContext, log: &[Message]) {
        if self.max_entries > 0 && self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(StepHistoryEntry {
            context: context.clone(),
            message_log: log.to_vec(),
            timestamp: Utc::now(),
        });
    }

    /// Pop the most recent snapshot, or `None` when there is nothing to
    /// undo.
    pub fn undo(&mut self) -> Option<StepHistoryEntry> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Modality};

    fn context() -> TreatmentContext {
        let catalog = Catalog::standard();
        let position = catalog
            .initial_position(Modality::ProblemShifting)
            .unwrap();
        TreatmentContext::seed(
            "sess-1",
            "user-1",
            Modality::ProblemShifting,
            &position,
            catalog.fingerprint(),
        )
    }

    #[test]
    fn test_undo_on_empty_returns_none() {
        let mut history = StepHistory::new();
        assert!(history.is_empty());
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_undo_pops_most_recent_first() {
        let mut history = StepHistory::new();
        let mut ctx = context();
        history.snapshot(&ctx, &[]);
        ctx.record_response("problem_capture", "I freeze up in meetings");
        history.snapshot(&ctx, &[Message::user("I freeze up in meetings")]);

        assert_eq!(history.len(), 2);
        let top = history.undo().unwrap();
        assert_eq!(top.context.user_responses.len(), 1);
        assert_eq!(top.message_log.len(), 1);
        let bottom = history.undo().unwrap();
        assert!(bottom.context.user_responses.is_empty());
        assert!(bottom.message_log.is_empty());
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_snapshots_do_not_alias_the_live_context() {
        let mut history = StepHistory::new();
        let mut ctx = context();
        let mut log = vec![Message::guide("Tell me what the problem is in a few words.")];
        history.snapshot(&ctx, &log);

        ctx.record_response("problem_capture", "I freeze up in meetings");
        ctx.metadata.cycle_count = 7;
        log.push(Message::user("I freeze up in meetings"));

        let entry = history.undo().unwrap();
        assert!(entry.context.user_responses.is_empty());
        assert_eq!(entry.context.metadata.cycle_count, 0);
        assert_eq!(entry.message_log.len(), 1);
    }

    #[test]
    fn test_returned_entry_survives_further_mutation() {
        let mut history = StepHistory::new();
        let mut ctx = context();
        history.snapshot(&ctx, &[]);
        let entry = history.undo().unwrap();

        ctx.record_response("body_sense", "a tight knot");
        assert!(entry.context.user_responses.is_empty());
    }

    #[test]
    fn test_bounded_history_drops_the_oldest_entry() {
        let mut history = StepHistory::bounded(2);
        let mut ctx = context();
        history.snapshot(&ctx, &[]);
        ctx.record_response("problem_capture", "first");
        history.snapshot(&ctx, &[]);
        ctx.record_response("body_sense", "second");
        history.snapshot(&ctx, &[]);

        assert_eq!(history.len(), 2);
        let top = history.undo().unwrap();
        assert_eq!(top.context.user_responses.len(), 2);
        let bottom = history.undo().unwrap();
        assert_eq!(bottom.context.user_responses.len(), 1);
    }

    #[test]
    fn test_zero_bound_means_unbounded() {
        let mut history = StepHistory::bounded(0);
        let ctx = context();
        for _ in 0..50 {
            history.snapshot(&ctx, &[]);
        }
        assert_eq!(history.len(), 50);
    }
}
