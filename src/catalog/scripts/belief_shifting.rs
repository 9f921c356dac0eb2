//! Belief Shifting: surface the belief underneath the problem and feel it
//! through until it stops ringing true.

use super::{digging_deeper_phase, integration_phase, introduction_phase};
use crate::catalog::{
    ExpectedInput, Modality, ModalityScript, Phase, Step, Transition, YesNoAnswer,
};

pub fn script() -> ModalityScript {
    let modality = Modality::BeliefShifting;
    ModalityScript {
        modality,
        cycle_cap: 12,
        fallback_step: "integration_start".to_string(),
        phases: vec![
            introduction_phase(modality.work_type(), "belief_capture"),
            work_phase(),
            digging_deeper_phase("belief_capture"),
            integration_phase(),
        ],
    }
}

fn work_phase() -> Phase {
    Phase::new(
        "belief_shifting",
        "Belief Shifting",
        vec![
            Step::new(
                "belief_capture",
                "Feel the problem '{statement}'. What do you believe about yourself or the \
                 world that makes this a problem?",
                ExpectedInput::free_text(),
                Transition::to("belief_sense"),
            ),
            Step::new(
                "belief_sense",
                "Feel the belief '{prior:belief_capture}'. What does it feel like?",
                ExpectedInput::free_text(),
                Transition::to("belief_shift"),
            ),
            Step::new(
                "belief_shift",
                "Feel '{last}'. What happens in yourself when you feel '{last}'?",
                ExpectedInput::free_text(),
                Transition::to("belief_truth_check"),
            ),
            Step::new(
                "belief_truth_check",
                "Feel the belief '{prior:belief_capture}'. Does it still feel true?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting(
                    "belief_sense",
                    "belief_problem_check",
                    YesNoAnswer::Yes,
                ),
            ),
            Step::new(
                "belief_problem_check",
                "Feel the problem '{statement}'. Does it still feel like a problem?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting("belief_capture", "future_check", YesNoAnswer::Yes),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_check_reenters_at_belief_sense() {
        let script = script();
        let step = script
            .phases
            .iter()
            .flat_map(|p| p.steps.iter())
            .find(|s| s.id == "belief_truth_check")
            .unwrap();
        match &step.transition {
            Transition::YesNo { yes, .. } => assert_eq!(yes, "belief_sense"),
            other => panic!("Expected YesNo transition, got {other:?}"),
        }
    }
}
