//! Authored modality scripts, one module per modality.
//!
//! Every script opens with the same introduction phase (explanation,
//! statement capture, confirmation) and closes with the same integration
//! phase. The problem-type modalities and Trauma Shifting also share the
//! digging-deeper phase. Those common phases are built here; each modality
//! module contributes its own work phase and wiring.

pub mod belief_shifting;
pub mod blockage_shifting;
pub mod identity_shifting;
pub mod problem_shifting;
pub mod reality_shifting;
pub mod trauma_shifting;

use super::{
    AssistTrigger, ExpectedInput, Phase, SemanticContract, Step, StepEffect, Transition,
    WorkType, YesNoAnswer,
};

const EXPLANATION_PROMPT: &str = "Welcome to Mind Shifting. Mind Shifting is not like counselling, \
therapy or life coaching; it is a set of verbal processes we apply directly to whatever is in \
the way. We can work on: 1. PROBLEM 2. GOAL 3. NEGATIVE EXPERIENCE. Choose the number that \
matches what you would like to work on today.";

/// Introduction phase: explanation menu, statement capture, confirmation.
/// `work_entry` is the first step of the modality's work phase, entered
/// once the captured statement is confirmed.
pub(crate) fn introduction_phase(work_type: WorkType, work_entry: &str) -> Phase {
    let (capture_id, confirm_id, capture_prompt, confirm_prompt, contract) = match work_type {
        WorkType::Problem => (
            "problem_capture",
            "problem_confirm",
            "Tell me what the problem is in a few words.",
            "So the problem you want to work on is '{statement}'. Is that right?",
            SemanticContract::ProblemStatement,
        ),
        WorkType::Goal => (
            "goal_capture",
            "goal_confirm",
            "Tell me what the goal is in a few words.",
            "So the goal you want to work on is '{statement}'. Is that right?",
            SemanticContract::GoalStatement,
        ),
        WorkType::NegativeExperience => (
            "experience_capture",
            "experience_confirm",
            "Tell me what the negative experience was in a few words.",
            "So the negative experience we are working on is '{statement}'. Is that right?",
            SemanticContract::SingleNegativeExperience,
        ),
    };
    Phase::new(
        "introduction",
        "Introduction",
        vec![
            Step::new(
                "mind_shifting_explanation",
                EXPLANATION_PROMPT,
                ExpectedInput::work_type_menu(),
                Transition::to(capture_id),
            ),
            Step::new(
                capture_id,
                capture_prompt,
                ExpectedInput::free_text_with(contract),
                Transition::to(confirm_id),
            )
            .with_effect(StepEffect::SetStatement)
            .with_assist_trigger(AssistTrigger::LongStatement { max_words: 20 }),
            Step::new(
                confirm_id,
                confirm_prompt,
                ExpectedInput::YesNo,
                Transition::yes_no(work_entry, capture_id),
            ),
        ],
    )
}

/// Digging-deeper phase: hunt for what is left of the problem and loop
/// the work phase on it. `reentry` is the step the restated problem
/// re-enters the work phase at.
pub(crate) fn digging_deeper_phase(reentry: &str) -> Phase {
    Phase::new(
        "digging_deeper",
        "Digging Deeper",
        vec![
            Step::new(
                "future_check",
                "Do you think this problem will come back in the future?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting("problem_restate", "anything_else", YesNoAnswer::Yes),
            ),
            Step::new(
                "anything_else",
                "Is there anything else about this that is still a problem for you?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting(
                    "problem_restate",
                    "integration_start",
                    YesNoAnswer::Yes,
                ),
            ),
            Step::new(
                "problem_restate",
                "Tell me what the problem is now, in a few words.",
                ExpectedInput::free_text_with(SemanticContract::ProblemStatement),
                Transition::to(reentry),
            )
            .with_effect(StepEffect::SetStatement),
        ],
    )
}

/// Integration phase: anchor the shift and close the session.
pub(crate) fn integration_phase() -> Phase {
    Phase::new(
        "integration",
        "Integration",
        vec![
            Step::new(
                "integration_start",
                "Take a moment and check inside. What are you more aware of now than before \
                 we started?",
                ExpectedInput::free_text(),
                Transition::to("integration_action"),
            ),
            Step::new(
                "integration_action",
                "What is the best way for you to use this new awareness in your life going \
                 forward?",
                ExpectedInput::free_text(),
                Transition::to("session_complete"),
            ),
            Step::new(
                "session_complete",
                "That completes the process. Thank yourself for the work you did today, and \
                 notice how you feel as you go back to your day.",
                ExpectedInput::free_text(),
                Transition::End,
            ),
        ],
    )
}
