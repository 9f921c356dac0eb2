//! Deterministic input validation.
//!
//! Every user turn is classified against the current step's expected
//! input before any transition is computed. The outcome is one of:
//! - [`ValidationOutcome::Valid`] — normalized input, ready to advance
//! - [`ValidationOutcome::Invalid`] — deterministic re-ask wording
//! - [`ValidationOutcome::Escalate`] — the rule layer cannot decide;
//!   hand the named category to the escalation gate
//!
//! Escalation travels on the wire as a magic token in the error field
//! (`AI_VALIDATION_NEEDED:<category>`) so callers that only understand
//! `{is_valid, error}` still round-trip it losslessly.

pub mod classifier;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{ExpectedInput, Step, WorkType, YesNoAnswer};
use classifier::{HeuristicClassifier, SemanticClassifier};

/// Error-field prefix that marks an escalation rather than a plain re-ask.
pub const ESCALATION_PREFIX: &str = "AI_VALIDATION_NEEDED:";

/// Re-ask wording for an unparseable yes/no answer.
pub const YES_NO_REASK: &str = "Please answer yes or no.";

/// Re-ask wording for empty free-text input.
pub const EMPTY_REASK: &str = "Take your time, and tell me in a few words when you are ready.";

/// Why the deterministic rules could not classify a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCategory {
    /// A question was given where a problem statement is needed.
    ProblemVsQuestion,
    /// A goal was given where a problem statement is needed.
    ProblemVsGoal,
    /// A problem was given where a goal statement is needed.
    GoalVsProblem,
    /// A question was given where a goal statement is needed.
    GoalVsQuestion,
    /// The account spans more than one event where a single negative
    /// experience is needed.
    SingleNegativeExperience,
}

impl EscalationCategory {
    pub fn all() -> [EscalationCategory; 5] {
        [
            EscalationCategory::ProblemVsQuestion,
            EscalationCategory::ProblemVsGoal,
            EscalationCategory::GoalVsProblem,
            EscalationCategory::GoalVsQuestion,
            EscalationCategory::SingleNegativeExperience,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationCategory::ProblemVsQuestion => "problem_vs_question",
            EscalationCategory::ProblemVsGoal => "problem_vs_goal",
            EscalationCategory::GoalVsProblem => "goal_vs_problem",
            EscalationCategory::GoalVsQuestion => "goal_vs_question",
            EscalationCategory::SingleNegativeExperience => "single_negative_experience",
        }
    }

    /// Wire token carried in `ValidationResult::error`.
    pub fn token(&self) -> String {
        format!("{}{}", ESCALATION_PREFIX, self.as_str())
    }

    /// Recover a category from a wire error field, if it carries one.
    pub fn parse_token(error: &str) -> Option<EscalationCategory> {
        let name = error.strip_prefix(ESCALATION_PREFIX)?;
        EscalationCategory::all()
            .into_iter()
            .find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for EscalationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized form of an accepted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidInput {
    /// Trimmed free text.
    Text(String),
    Answer(YesNoAnswer),
    /// Zero-based index into the step's options.
    Choice(usize),
}

/// Internal classification of one user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(ValidInput),
    Invalid(String),
    Escalate(EscalationCategory),
}

/// Wire shape of a validation verdict: `{is_valid, error}`. Escalation
/// rides in `error` as `AI_VALIDATION_NEEDED:<category>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn from_outcome(outcome: &ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Valid(_) => Self {
                is_valid: true,
                error: None,
            },
            ValidationOutcome::Invalid(message) => Self {
                is_valid: false,
                error: Some(message.clone()),
            },
            ValidationOutcome::Escalate(category) => Self {
                is_valid: false,
                error: Some(category.token()),
            },
        }
    }

    /// Whether the error field carries an escalation token, and which one.
    pub fn escalation(&self) -> Option<EscalationCategory> {
        self.error
            .as_deref()
            .and_then(EscalationCategory::parse_token)
    }
}

/// Parse a yes/no answer from the usual token sets. Trailing punctuation
/// is ignored; anything else is unparseable.
pub fn parse_yes_no(raw: &str) -> Option<YesNoAnswer> {
    let normalized = raw
        .trim()
        .trim_end_matches(['.', '!', ','])
        .to_lowercase();
    match normalized.as_str() {
        "yes" | "y" | "yeah" | "yep" | "yup" => Some(YesNoAnswer::Yes),
        "no" | "n" | "nope" | "nah" => Some(YesNoAnswer::No),
        _ => None,
    }
}

/// Step-level validator. Deterministic rules run first; free-text steps
/// with a semantic contract consult the injected classifier, which either
/// accepts or names an escalation category. The validator itself never
/// calls out of process.
pub struct Validator {
    classifier: Arc<dyn SemanticClassifier>,
}

impl Validator {
    pub fn new(classifier: Arc<dyn SemanticClassifier>) -> Self {
        Self { classifier }
    }

    /// Validator backed by the standard rule-based classifier.
    pub fn standard() -> Self {
        Self::new(Arc::new(HeuristicClassifier))
    }

    pub fn validate(
        &self,
        raw: &str,
        step: &Step,
        work_type: Option<WorkType>,
    ) -> ValidationOutcome {
        match &step.expected {
            ExpectedInput::YesNo => match parse_yes_no(raw) {
                Some(answer) => ValidationOutcome::Valid(ValidInput::Answer(answer)),
                None => ValidationOutcome::Invalid(YES_NO_REASK.to_string()),
            },
            ExpectedInput::Choice {
                options,
                must_match_work_type,
            } => self.validate_choice(raw, options, *must_match_work_type, work_type),
            ExpectedInput::FreeText { contract } => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return ValidationOutcome::Invalid(EMPTY_REASK.to_string());
                }
                if let Some(contract) = contract {
                    if let Some(category) = self.classifier.classify(trimmed, *contract) {
                        return ValidationOutcome::Escalate(category);
                    }
                }
                ValidationOutcome::Valid(ValidInput::Text(trimmed.to_string()))
            }
        }
    }

    fn validate_choice(
        &self,
        raw: &str,
        options: &[String],
        must_match_work_type: bool,
        work_type: Option<WorkType>,
    ) -> ValidationOutcome {
        let Some(index) = parse_choice(raw, options) else {
            return ValidationOutcome::Invalid(format!(
                "Please choose a number from 1 to {}.",
                options.len()
            ));
        };
        if must_match_work_type {
            if let Some(work_type) = work_type {
                if index != work_type.menu_index() {
                    return ValidationOutcome::Invalid(format!(
                        "This session is set up to work on a {}. Please choose {}. {}.",
                        work_type.noun(),
                        work_type.menu_index() + 1,
                        work_type.menu_label(),
                    ));
                }
            }
        }
        ValidationOutcome::Valid(ValidInput::Choice(index))
    }
}

/// Accepts a 1-based option number or a case-insensitive option label.
fn parse_choice(raw: &str, options: &[String]) -> Option<usize> {
    let trimmed = raw.trim().trim_end_matches('.');
    if let Ok(number) = trimmed.parse::<usize>() {
        if (1..=options.len()).contains(&number) {
            return Some(number - 1);
        }
        return None;
    }
    options
        .iter()
        .position(|option| option.eq_ignore_ascii_case(trimmed))
}
