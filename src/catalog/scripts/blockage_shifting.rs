//! Blockage Shifting: feel the problem as it is now, shift it, and keep
//! restating whatever problem remains until nothing is left.

use super::{digging_deeper_phase, integration_phase, introduction_phase};
use crate::catalog::{
    ExpectedInput, Modality, ModalityScript, Phase, SemanticContract, Step, StepEffect,
    Transition, YesNoAnswer,
};

pub fn script() -> ModalityScript {
    let modality = Modality::BlockageShifting;
    ModalityScript {
        modality,
        cycle_cap: 12,
        fallback_step: "integration_start".to_string(),
        phases: vec![
            introduction_phase(modality.work_type(), "blockage_sense"),
            work_phase(),
            digging_deeper_phase("blockage_sense"),
            integration_phase(),
        ],
    }
}

fn work_phase() -> Phase {
    Phase::new(
        "blockage_shifting",
        "Blockage Shifting",
        vec![
            Step::new(
                "blockage_sense",
                "Feel the problem '{statement}'. What does it feel like?",
                ExpectedInput::free_text(),
                Transition::to("blockage_shift"),
            ),
            Step::new(
                "blockage_shift",
                "Feel '{last}'. What would it feel like if this was not a problem at all?",
                ExpectedInput::free_text(),
                Transition::to("blockage_check"),
            ),
            Step::new(
                "blockage_check",
                "Check inside. Is '{statement}' still a problem for you?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting("blockage_restate", "future_check", YesNoAnswer::Yes),
            ),
            Step::new(
                "blockage_restate",
                "Tell me what the problem is now, as it feels in this moment, in a few words.",
                ExpectedInput::free_text_with(SemanticContract::ProblemStatement),
                Transition::to("blockage_sense"),
            )
            .with_effect(StepEffect::SetStatement),
        ],
    )
}
