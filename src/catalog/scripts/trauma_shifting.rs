//! Trauma Shifting: work a single negative experience from a safe
//! distance, dissolving the identity frozen into its worst moment.

use super::{digging_deeper_phase, integration_phase, introduction_phase};
use crate::catalog::{
    ExpectedInput, Modality, ModalityScript, Phase, Step, Transition, YesNoAnswer,
};

pub fn script() -> ModalityScript {
    let modality = Modality::TraumaShifting;
    ModalityScript {
        modality,
        cycle_cap: 8,
        fallback_step: "integration_start".to_string(),
        phases: vec![
            introduction_phase(modality.work_type(), "trauma_comfort_check"),
            work_phase(),
            digging_deeper_phase("trauma_identity"),
            integration_phase(),
        ],
    }
}

fn work_phase() -> Phase {
    Phase::new(
        "trauma_shifting",
        "Trauma Shifting",
        vec![
            Step::new(
                "trauma_comfort_check",
                "We will work with the worst moment of that experience, briefly and from a \
                 distance. Are you comfortable recalling it?",
                ExpectedInput::YesNo,
                Transition::yes_no("trauma_identity", "trauma_reassure"),
            ),
            Step::new(
                "trauma_reassure",
                "That is okay. You do not need to relive anything; we can hold it at a \
                 distance the whole way through. Shall we continue that way?",
                ExpectedInput::YesNo,
                Transition::yes_no("trauma_identity", "integration_start"),
            ),
            Step::new(
                "trauma_identity",
                "Think about '{statement}' and feel what it brings up. What kind of person \
                 are you being in that moment? Name it in a word or two.",
                ExpectedInput::free_text(),
                Transition::to("trauma_embody"),
            ),
            Step::new(
                "trauma_embody",
                "Feel yourself being '{prior:trauma_identity}'. What does it feel like?",
                ExpectedInput::free_text(),
                Transition::to("trauma_dissolve"),
            ),
            Step::new(
                "trauma_dissolve",
                "Feel '{last}'. What happens to '{prior:trauma_identity}' when you feel \
                 '{last}'?",
                ExpectedInput::free_text(),
                Transition::to("trauma_identity_check"),
            ),
            Step::new(
                "trauma_identity_check",
                "Can you still feel yourself being '{prior:trauma_identity}'?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting(
                    "trauma_embody",
                    "trauma_experience_check",
                    YesNoAnswer::Yes,
                ),
            ),
            Step::new(
                "trauma_experience_check",
                "Think about '{statement}' as it feels now. Does it still feel like a problem \
                 for you?",
                ExpectedInput::YesNo,
                Transition::yes_no_counting("trauma_identity", "future_check", YesNoAnswer::Yes),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declining_comfort_offers_distance() {
        let script = script();
        let step = script
            .phases
            .iter()
            .flat_map(|p| p.steps.iter())
            .find(|s| s.id == "trauma_comfort_check")
            .unwrap();
        match &step.transition {
            Transition::YesNo {
                yes,
                no,
                counts_cycle,
            } => {
                assert_eq!(yes, "trauma_identity");
                assert_eq!(no, "trauma_reassure");
                assert!(counts_cycle.is_none());
            }
            other => panic!("Expected YesNo transition, got {other:?}"),
        }
    }

    #[test]
    fn test_declining_reassurance_exits_to_integration() {
        let script = script();
        let step = script
            .phases
            .iter()
            .flat_map(|p| p.steps.iter())
            .find(|s| s.id == "trauma_reassure")
            .unwrap();
        match &step.transition {
            Transition::YesNo { no, .. } => assert_eq!(no, "integration_start"),
            other => panic!("Expected YesNo transition, got {other:?}"),
        }
    }

    #[test]
    fn test_trauma_uses_the_smallest_cycle_cap() {
        assert_eq!(script().cycle_cap, 8);
    }
}
