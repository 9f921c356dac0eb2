//! Reality Shifting: the goal-oriented method. Step into having the goal,
//! clear whatever doubts come up, and anchor the certainty.

use super::{integration_phase, introduction_phase};
use crate::catalog::{
    ExpectedInput, Modality, ModalityScript, Phase, Step, Transition, YesNoAnswer,
};

pub fn script() -> ModalityScript {
    let modality = Modality::RealityShifting;
    ModalityScript {
        modality,
        cycle_cap: 10,
        fallback_step: "integration_start".to_string(),
        phases: vec![
            introduction_phase(modality.work_type(), "goal_vision"),
            work_phase(),
            integration_phase(),
        ],
    }
}

fn work_phase() -> Phase {
    Phase::new(
        "reality_shifting",
        "Reality Shifting",
        vec![
            Step::new(
                "goal_vision",
                "Close your eyes. Imagine you have already achieved '{statement}'. What can \
                 you see and feel as you enjoy having it?",
                ExpectedInput::free_text(),
                Transition::to("goal_feeling"),
            ),
            Step::new(
                "goal_feeling",
                "Feel what it is like to have '{statement}'. Where do you feel it in your \
                 body?",
                ExpectedInput::free_text(),
                Transition::to("goal_obstacle_check"),
            ),
            Step::new(
                "goal_obstacle_check",
                "Is there anything in you that doubts, or gets in the way of, having \
                 '{statement}'?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting("goal_obstacle", "goal_confidence", YesNoAnswer::Yes),
            ),
            Step::new(
                "goal_obstacle",
                "What is the doubt or obstacle? Say it in a few words.",
                ExpectedInput::free_text(),
                Transition::to("goal_obstacle_shift"),
            ),
            Step::new(
                "goal_obstacle_shift",
                "Feel '{last}'. What happens to it when you feel '{prior:goal_feeling}' again?",
                ExpectedInput::free_text(),
                Transition::to("goal_obstacle_check"),
            ),
            Step::new(
                "goal_confidence",
                "On a scale of 1 to 10, how certain are you now that you will achieve \
                 '{statement}'?",
                ExpectedInput::free_text(),
                Transition::to("integration_start"),
            ),
        ],
    )
}
