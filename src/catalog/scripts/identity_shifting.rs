//! Identity Shifting: name the identity behind the problem, dissolve it,
//! and re-check the problem once the identity lets go.

use super::{digging_deeper_phase, integration_phase, introduction_phase};
use crate::catalog::{
    ExpectedInput, Modality, ModalityScript, Phase, Step, Transition, YesNoAnswer,
};

pub fn script() -> ModalityScript {
    let modality = Modality::IdentityShifting;
    ModalityScript {
        modality,
        cycle_cap: 12,
        fallback_step: "integration_start".to_string(),
        phases: vec![
            introduction_phase(modality.work_type(), "identity_capture"),
            work_phase(),
            digging_deeper_phase("identity_capture"),
            integration_phase(),
        ],
    }
}

fn work_phase() -> Phase {
    Phase::new(
        "identity_shifting",
        "Identity Shifting",
        vec![
            Step::new(
                "identity_capture",
                "Feel the problem '{statement}'. What kind of person are you being when you \
                 feel it? Name that identity in a word or two.",
                ExpectedInput::free_text(),
                Transition::to("identity_embody"),
            ),
            Step::new(
                "identity_embody",
                "Feel yourself being '{prior:identity_capture}'. Step into it and really feel \
                 it. What does it feel like?",
                ExpectedInput::free_text(),
                Transition::to("identity_dissolve"),
            ),
            Step::new(
                "identity_dissolve",
                "Feel '{last}'. What happens to '{prior:identity_capture}' when you feel \
                 '{last}'?",
                ExpectedInput::free_text(),
                Transition::to("identity_check"),
            ),
            Step::new(
                "identity_check",
                "Can you still feel yourself being '{prior:identity_capture}'?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting(
                    "identity_embody",
                    "identity_problem_check",
                    YesNoAnswer::Yes,
                ),
            ),
            Step::new(
                "identity_problem_check",
                "Feel the problem '{statement}'. Does it still feel like a problem?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting("identity_capture", "future_check", YesNoAnswer::Yes),
            ),
        ],
    )
}
