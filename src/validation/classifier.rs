//! Semantic statement classification.
//!
//! A [`SemanticClassifier`] inspects a free-text statement against the
//! step's semantic contract and either accepts it (`None`) or names the
//! [`EscalationCategory`] the escalation gate should resolve. The standard
//! [`HeuristicClassifier`] is pure rule matching: same input, same verdict,
//! no I/O. Anything smarter lives behind the escalation gate, not here.

use std::sync::LazyLock;

use regex::Regex;

use super::EscalationCategory;
use crate::catalog::SemanticContract;

/// Classifies a statement against a semantic contract. Returning `None`
/// accepts the statement; returning a category escalates it.
pub trait SemanticClassifier: Send + Sync {
    fn classify(&self, statement: &str, contract: SemanticContract) -> Option<EscalationCategory>;
}

const QUESTION_OPENERS: &[&str] = &[
    "why", "how", "what", "when", "where", "who", "whom", "which", "can", "could", "should",
    "would", "will", "shall", "am", "is", "are", "do", "does", "did", "may", "might",
];

static GOAL_PHRASING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(i\s+want\b|i\s+wish\b|i\s+hope\b|i\s+would\s+like\b|i'?d\s+like\b|my\s+goal\b|to\s+(be|have|get|become)\b)",
    )
    .unwrap()
});

static PROBLEM_PHRASING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(can'?t|cannot|don'?t|never|struggle|struggling|stuck|afraid|scared|anxious|worried|hate|problem)\b",
    )
    .unwrap()
});

static RECURRENCE_PHRASING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(always|every time|whenever|all my life|for years|repeatedly|constantly|keeps? happening|growing up|as a child|used to)\b",
    )
    .unwrap()
});

/// The standard deterministic classifier: surface-form rules only.
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    fn looks_like_question(statement: &str) -> bool {
        if statement.trim_end().ends_with('?') {
            return true;
        }
        statement
            .split_whitespace()
            .next()
            .map(|first| {
                let first = first.to_lowercase();
                QUESTION_OPENERS.contains(&first.as_str())
            })
            .unwrap_or(false)
    }

    fn looks_like_goal(statement: &str) -> bool {
        GOAL_PHRASING.is_match(statement)
    }

    fn looks_like_problem(statement: &str) -> bool {
        PROBLEM_PHRASING.is_match(statement)
    }

    fn spans_multiple_events(statement: &str) -> bool {
        RECURRENCE_PHRASING.is_match(statement)
    }
}

impl SemanticClassifier for HeuristicClassifier {
    fn classify(&self, statement: &str, contract: SemanticContract) -> Option<EscalationCategory> {
        match contract {
            SemanticContract::ProblemStatement => {
                if Self::looks_like_question(statement) {
                    Some(EscalationCategory::ProblemVsQuestion)
                } else if Self::looks_like_goal(statement) {
                    Some(EscalationCategory::ProblemVsGoal)
                } else {
                    None
                }
            }
            SemanticContract::GoalStatement => {
                if Self::looks_like_question(statement) {
                    Some(EscalationCategory::GoalVsQuestion)
                } else if Self::looks_like_problem(statement) {
                    Some(EscalationCategory::GoalVsProblem)
                } else {
                    None
                }
            }
            SemanticContract::SingleNegativeExperience => {
                if Self::spans_multiple_events(statement) {
                    Some(EscalationCategory::SingleNegativeExperience)
                } else {
                    None
                }
            }
        }
    }
}
