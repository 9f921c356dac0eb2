//! Problem Shifting: feel the problem, shift toward the preferred feeling,
//! and re-check until it no longer feels like a problem.

use super::{digging_deeper_phase, integration_phase, introduction_phase};
use crate::catalog::{
    ExpectedInput, Modality, ModalityScript, Phase, Step, Transition, YesNoAnswer,
};

pub fn script() -> ModalityScript {
    let modality = Modality::ProblemShifting;
    ModalityScript {
        modality,
        cycle_cap: 15,
        fallback_step: "integration_start".to_string(),
        phases: vec![
            introduction_phase(modality.work_type(), "body_sense"),
            work_phase(),
            digging_deeper_phase("body_sense"),
            integration_phase(),
        ],
    }
}

fn work_phase() -> Phase {
    Phase::new(
        "problem_shifting",
        "Problem Shifting",
        vec![
            Step::new(
                "body_sense",
                "Close your eyes if they are not already closed. Feel the problem \
                 '{statement}'. What does it feel like?",
                ExpectedInput::free_text(),
                Transition::to("feeling_shift"),
            ),
            Step::new(
                "feeling_shift",
                "Feel '{last}'. What happens in yourself when you feel '{last}'?",
                ExpectedInput::free_text(),
                Transition::to("desired_feeling"),
            ),
            Step::new(
                "desired_feeling",
                "What would you rather feel?",
                ExpectedInput::free_text(),
                Transition::to("desired_feeling_sense"),
            ),
            Step::new(
                "desired_feeling_sense",
                "What would '{prior:desired_feeling}' feel like?",
                ExpectedInput::free_text(),
                Transition::to("feeling_check"),
            ),
            Step::new(
                "feeling_check",
                "Feel the problem '{statement}'. Does it still feel like a problem?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting("body_sense", "future_check", YesNoAnswer::Yes),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_phase_order() {
        let script = script();
        let phases: Vec<&str> = script.phases.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            phases,
            vec![
                "introduction",
                "problem_shifting",
                "digging_deeper",
                "integration"
            ]
        );
    }

    #[test]
    fn test_feeling_check_loops_back_on_yes() {
        let script = script();
        let step = script
            .phases
            .iter()
            .flat_map(|p| p.steps.iter())
            .find(|s| s.id == "feeling_check")
            .unwrap();
        match &step.transition {
            Transition::YesNo {
                yes,
                no,
                counts_cycle,
            } => {
                assert_eq!(yes, "body_sense");
                assert_eq!(no, "future_check");
                assert_eq!(*counts_cycle, Some(YesNoAnswer::Yes));
            }
            other => panic!("Expected YesNo transition, got {other:?}"),
        }
    }
}
