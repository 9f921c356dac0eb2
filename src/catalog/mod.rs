//! Script catalog: the authored treatment scripts for all six modalities.
//!
//! The catalog is the single source of truth for prompt wording and flow.
//! Key types:
//! - [`Modality`] — which treatment method a session runs
//! - [`Step`] — one scripted prompt with its expected input and transition
//! - [`Phase`] — an ordered group of steps (introduction, work, digging, integration)
//! - [`Catalog`] — lookup, lint, and fingerprint over every modality script
//!
//! Scripts are built in code (see [`scripts`]), never loaded from user files,
//! so `lint` failures are authoring defects rather than runtime conditions.

pub mod scripts;
pub mod template;

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::CatalogError;

/// The six treatment modalities. Fixed per session at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    ProblemShifting,
    IdentityShifting,
    BeliefShifting,
    BlockageShifting,
    RealityShifting,
    TraumaShifting,
}

impl Modality {
    /// All modalities in catalog order.
    pub fn all() -> [Modality; 6] {
        [
            Modality::ProblemShifting,
            Modality::IdentityShifting,
            Modality::BeliefShifting,
            Modality::BlockageShifting,
            Modality::RealityShifting,
            Modality::TraumaShifting,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::ProblemShifting => "problem_shifting",
            Modality::IdentityShifting => "identity_shifting",
            Modality::BeliefShifting => "belief_shifting",
            Modality::BlockageShifting => "blockage_shifting",
            Modality::RealityShifting => "reality_shifting",
            Modality::TraumaShifting => "trauma_shifting",
        }
    }

    /// Human-facing method name, as spoken in session.
    pub fn title(&self) -> &'static str {
        match self {
            Modality::ProblemShifting => "Problem Shifting",
            Modality::IdentityShifting => "Identity Shifting",
            Modality::BeliefShifting => "Belief Shifting",
            Modality::BlockageShifting => "Blockage Shifting",
            Modality::RealityShifting => "Reality Shifting",
            Modality::TraumaShifting => "Trauma Shifting",
        }
    }

    /// What kind of statement the introduction phase captures.
    pub fn work_type(&self) -> WorkType {
        match self {
            Modality::RealityShifting => WorkType::Goal,
            Modality::TraumaShifting => WorkType::NegativeExperience,
            _ => WorkType::Problem,
        }
    }

    /// Whether the script runs a digging-deeper phase before integration.
    pub fn has_digging(&self) -> bool {
        !matches!(self, Modality::RealityShifting)
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Modality {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "problem_shifting" => Ok(Modality::ProblemShifting),
            "identity_shifting" => Ok(Modality::IdentityShifting),
            "belief_shifting" => Ok(Modality::BeliefShifting),
            "blockage_shifting" => Ok(Modality::BlockageShifting),
            "reality_shifting" => Ok(Modality::RealityShifting),
            "trauma_shifting" => Ok(Modality::TraumaShifting),
            other => anyhow::bail!(
                "Unknown modality '{}' (expected one of: problem_shifting, identity_shifting, \
                 belief_shifting, blockage_shifting, reality_shifting, trauma_shifting)",
                other
            ),
        }
    }
}

/// The kind of statement a session works on. Derived from the modality
/// at session creation and immutable afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Problem,
    Goal,
    NegativeExperience,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::Problem => "problem",
            WorkType::Goal => "goal",
            WorkType::NegativeExperience => "negative_experience",
        }
    }

    /// Noun used in corrective sentences ("a problem", "a goal", ...).
    pub fn noun(&self) -> &'static str {
        match self {
            WorkType::Problem => "problem",
            WorkType::Goal => "goal",
            WorkType::NegativeExperience => "negative experience",
        }
    }

    /// Option label shown in the work-type menu.
    pub fn menu_label(&self) -> &'static str {
        match self {
            WorkType::Problem => "PROBLEM",
            WorkType::Goal => "GOAL",
            WorkType::NegativeExperience => "NEGATIVE EXPERIENCE",
        }
    }

    /// Zero-based position in the work-type menu.
    pub fn menu_index(&self) -> usize {
        match self {
            WorkType::Problem => 0,
            WorkType::Goal => 1,
            WorkType::NegativeExperience => 2,
        }
    }
}

impl std::fmt::Display for WorkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated yes/no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YesNoAnswer {
    Yes,
    No,
}

impl YesNoAnswer {
    pub fn as_str(&self) -> &'static str {
        match self {
            YesNoAnswer::Yes => "yes",
            YesNoAnswer::No => "no",
        }
    }
}

/// Semantic contract a free-text answer must satisfy. Checked by the
/// deterministic classifier; a miss escalates instead of failing outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticContract {
    ProblemStatement,
    GoalStatement,
    SingleNegativeExperience,
}

/// What kind of input a step expects from the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExpectedInput {
    FreeText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        contract: Option<SemanticContract>,
    },
    YesNo,
    Choice {
        options: Vec<String>,
        /// When set, the chosen option must agree with the session's work type.
        #[serde(default)]
        must_match_work_type: bool,
    },
}

impl ExpectedInput {
    pub fn free_text() -> Self {
        ExpectedInput::FreeText { contract: None }
    }

    pub fn free_text_with(contract: SemanticContract) -> Self {
        ExpectedInput::FreeText {
            contract: Some(contract),
        }
    }

    pub fn work_type_menu() -> Self {
        ExpectedInput::Choice {
            options: vec![
                WorkType::Problem.menu_label().to_string(),
                WorkType::Goal.menu_label().to_string(),
                WorkType::NegativeExperience.menu_label().to_string(),
            ],
            must_match_work_type: true,
        }
    }
}

/// Where a step sends the session after a valid answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Transition {
    /// Unconditional move to another step.
    To { step: String },
    /// Branch on the yes/no answer. When `counts_cycle` names an arm,
    /// taking that arm increments the session's cycle count and is
    /// subject to the modality's cycle cap.
    YesNo {
        yes: String,
        no: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        counts_cycle: Option<YesNoAnswer>,
    },
    /// Terminal marker: arriving here completes the session.
    End,
}

impl Transition {
    pub fn to(step: &str) -> Self {
        Transition::To {
            step: step.to_string(),
        }
    }

    pub fn yes_no(yes: &str, no: &str) -> Self {
        Transition::YesNo {
            yes: yes.to_string(),
            no: no.to_string(),
            counts_cycle: None,
        }
    }

    pub fn yes_no_counting(yes: &str, no: &str, counts: YesNoAnswer) -> Self {
        Transition::YesNo {
            yes: yes.to_string(),
            no: no.to_string(),
            counts_cycle: Some(counts),
        }
    }
}

/// Context mutation applied when a step's answer is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepEffect {
    /// Store the accepted answer as the session's working statement.
    SetStatement,
}

/// Condition under which the assist gate may inject composed guidance
/// instead of advancing. Ignored entirely in script-strict mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AssistTrigger {
    /// Fires when the answer runs past `max_words` whitespace-separated words.
    LongStatement { max_words: usize },
}

impl AssistTrigger {
    pub fn fires(&self, input: &str) -> bool {
        match self {
            AssistTrigger::LongStatement { max_words } => {
                input.split_whitespace().count() > *max_words
            }
        }
    }
}

/// One scripted prompt with its expected input and transition rule.
/// Step ids are unique within a modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub prompt: String,
    pub expected: ExpectedInput,
    pub transition: Transition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<StepEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assist_trigger: Option<AssistTrigger>,
}

impl Step {
    pub fn new(id: &str, prompt: &str, expected: ExpectedInput, transition: Transition) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            expected,
            transition,
            effect: None,
            assist_trigger: None,
        }
    }

    pub fn with_effect(mut self, effect: StepEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn with_assist_trigger(mut self, trigger: AssistTrigger) -> Self {
        self.assist_trigger = Some(trigger);
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.transition, Transition::End)
    }
}

/// An ordered group of steps. Phases form a fixed directed sequence;
/// loops only ever target steps, never phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub title: String,
    pub steps: Vec<Step>,
}

impl Phase {
    pub fn new(id: &str, title: &str, steps: Vec<Step>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            steps,
        }
    }
}

/// The complete authored script for one modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityScript {
    pub modality: Modality,
    pub phases: Vec<Phase>,
    /// Maximum counted loop iterations before the script bails out to
    /// `fallback_step`.
    pub cycle_cap: u32,
    /// Step the session is routed to once the cycle cap is reached.
    /// Must sit outside every counted loop.
    pub fallback_step: String,
}

impl ModalityScript {
    fn steps(&self) -> impl Iterator<Item = &Step> {
        self.phases.iter().flat_map(|p| p.steps.iter())
    }

    fn step(&self, id: &str) -> Option<&Step> {
        self.steps().find(|s| s.id == id)
    }
}

/// A phase/step coordinate inside one modality's script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptPosition {
    pub phase: String,
    pub step: String,
}

/// Lookup, lint, and identity over every modality script.
#[derive(Debug, Clone)]
pub struct Catalog {
    scripts: HashMap<Modality, ModalityScript>,
}

impl Catalog {
    /// The standard authored catalog covering all six modalities.
    pub fn standard() -> Self {
        Self::from_scripts(vec![
            scripts::problem_shifting::script(),
            scripts::identity_shifting::script(),
            scripts::belief_shifting::script(),
            scripts::blockage_shifting::script(),
            scripts::reality_shifting::script(),
            scripts::trauma_shifting::script(),
        ])
    }

    pub fn from_scripts(scripts: Vec<ModalityScript>) -> Self {
        Self {
            scripts: scripts.into_iter().map(|s| (s.modality, s)).collect(),
        }
    }

    /// Override one modality's cycle cap. Changes the catalog fingerprint.
    pub fn with_cycle_cap(mut self, modality: Modality, cap: u32) -> Self {
        self.set_cycle_cap(modality, cap);
        self
    }

    pub fn set_cycle_cap(&mut self, modality: Modality, cap: u32) {
        if let Some(script) = self.scripts.get_mut(&modality) {
            script.cycle_cap = cap;
        }
    }

    pub fn script(&self, modality: Modality) -> Result<&ModalityScript, CatalogError> {
        self.scripts
            .get(&modality)
            .ok_or_else(|| CatalogError::UnknownModality {
                modality: modality.to_string(),
            })
    }

    pub fn step(&self, modality: Modality, step_id: &str) -> Result<&Step, CatalogError> {
        self.script(modality)?
            .step(step_id)
            .ok_or_else(|| CatalogError::UnknownStep {
                modality: modality.to_string(),
                step: step_id.to_string(),
            })
    }

    /// The phase a step belongs to.
    pub fn phase_of(&self, modality: Modality, step_id: &str) -> Result<&Phase, CatalogError> {
        self.script(modality)?
            .phases
            .iter()
            .find(|p| p.steps.iter().any(|s| s.id == step_id))
            .ok_or_else(|| CatalogError::UnknownStep {
                modality: modality.to_string(),
                step: step_id.to_string(),
            })
    }

    /// Where a fresh session starts: first step of the first phase.
    pub fn initial_position(&self, modality: Modality) -> Result<ScriptPosition, CatalogError> {
        let script = self.script(modality)?;
        let phase = script
            .phases
            .first()
            .ok_or_else(|| CatalogError::EmptyScript {
                modality: modality.to_string(),
            })?;
        let step = phase.steps.first().ok_or_else(|| CatalogError::EmptyScript {
            modality: modality.to_string(),
        })?;
        Ok(ScriptPosition {
            phase: phase.id.clone(),
            step: step.id.clone(),
        })
    }

    pub fn modalities(&self) -> Vec<Modality> {
        Modality::all()
            .into_iter()
            .filter(|m| self.scripts.contains_key(m))
            .collect()
    }

    /// Static analysis over every script. Returns every defect found;
    /// an empty list means the catalog is clean.
    pub fn lint(&self) -> Vec<CatalogError> {
        let mut defects = Vec::new();
        for modality in self.modalities() {
            let script = match self.script(modality) {
                Ok(s) => s,
                Err(e) => {
                    defects.push(e);
                    continue;
                }
            };
            self.lint_script(script, &mut defects);
        }
        defects
    }

    fn lint_script(&self, script: &ModalityScript, defects: &mut Vec<CatalogError>) {
        let modality = script.modality.to_string();

        let mut ids = HashSet::new();
        for step in script.steps() {
            if !ids.insert(step.id.as_str()) {
                defects.push(CatalogError::DuplicateStep {
                    modality: modality.clone(),
                    step: step.id.clone(),
                });
            }
        }

        if script.cycle_cap == 0 {
            defects.push(CatalogError::ZeroCycleCap {
                modality: modality.clone(),
            });
        }
        if script.step(&script.fallback_step).is_none() {
            defects.push(CatalogError::UnknownFallback {
                modality: modality.clone(),
                step: script.fallback_step.clone(),
            });
        }

        for step in script.steps() {
            for target in transition_targets(&step.transition) {
                if script.step(target).is_none() {
                    defects.push(CatalogError::UnknownTransitionTarget {
                        modality: modality.clone(),
                        step: step.id.clone(),
                        target: target.to_string(),
                    });
                }
            }
            for placeholder in template::placeholders(&step.prompt) {
                let known = match placeholder.as_str() {
                    "statement" | "last" => true,
                    p => match p.strip_prefix("prior:") {
                        Some(prior) => script.step(prior).is_some(),
                        None => false,
                    },
                };
                if !known {
                    defects.push(CatalogError::UnknownPlaceholder {
                        step: step.id.clone(),
                        placeholder,
                    });
                }
            }
        }

        let terminals: Vec<&Step> = script.steps().filter(|s| s.is_terminal()).collect();
        match terminals.as_slice() {
            [] => {
                defects.push(CatalogError::MissingTerminal {
                    modality: modality.clone(),
                });
                return;
            }
            [_single] => {}
            extra => {
                // More than one End step: every one past the first is a defect.
                for step in &extra[1..] {
                    defects.push(CatalogError::DuplicateStep {
                        modality: modality.clone(),
                        step: step.id.clone(),
                    });
                }
            }
        }

        let reachable = reachable_steps(script);
        for terminal in terminals {
            if !reachable.contains(terminal.id.as_str()) {
                defects.push(CatalogError::UnreachableTerminal {
                    modality: modality.clone(),
                    step: terminal.id.clone(),
                });
            }
        }
    }

    /// Content hash over every script, stable across process runs.
    /// Sessions record it at creation; a mismatch at load means the
    /// catalog semantics changed underneath the saved session.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for modality in Modality::all() {
            let Some(script) = self.scripts.get(&modality) else {
                continue;
            };
            hasher.update(modality.as_str());
            hasher.update(script.cycle_cap.to_le_bytes());
            hasher.update(&script.fallback_step);
            for phase in &script.phases {
                hasher.update(&phase.id);
                for step in &phase.steps {
                    hasher.update(&step.id);
                    hasher.update(&step.prompt);
                    hasher.update(expected_tag(&step.expected));
                    hasher.update(transition_tag(&step.transition));
                    hasher.update(match step.effect {
                        Some(StepEffect::SetStatement) => "effect:set_statement",
                        None => "effect:none",
                    });
                    hasher.update(match &step.assist_trigger {
                        Some(AssistTrigger::LongStatement { max_words }) => {
                            format!("trigger:long_statement:{max_words}")
                        }
                        None => "trigger:none".to_string(),
                    });
                }
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

fn transition_targets(transition: &Transition) -> Vec<&str> {
    match transition {
        Transition::To { step } => vec![step.as_str()],
        Transition::YesNo { yes, no, .. } => vec![yes.as_str(), no.as_str()],
        Transition::End => vec![],
    }
}

fn expected_tag(expected: &ExpectedInput) -> String {
    match expected {
        ExpectedInput::FreeText { contract } => match contract {
            Some(SemanticContract::ProblemStatement) => "free_text:problem".to_string(),
            Some(SemanticContract::GoalStatement) => "free_text:goal".to_string(),
            Some(SemanticContract::SingleNegativeExperience) => "free_text:experience".to_string(),
            None => "free_text".to_string(),
        },
        ExpectedInput::YesNo => "yes_no".to_string(),
        ExpectedInput::Choice {
            options,
            must_match_work_type,
        } => format!("choice:{}:{}", options.join("|"), must_match_work_type),
    }
}

fn transition_tag(transition: &Transition) -> String {
    match transition {
        Transition::To { step } => format!("to:{step}"),
        Transition::YesNo {
            yes,
            no,
            counts_cycle,
        } => {
            let counts = match counts_cycle {
                Some(YesNoAnswer::Yes) => "yes",
                Some(YesNoAnswer::No) => "no",
                None => "-",
            };
            format!("yes_no:{yes}:{no}:{counts}")
        }
        Transition::End => "end".to_string(),
    }
}

/// Step ids reachable from the initial step, following transition edges
/// plus the cap-overflow edge into the fallback step.
fn reachable_steps(script: &ModalityScript) -> HashSet<&str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    if let Some(first) = script.phases.first().and_then(|p| p.steps.first()) {
        queue.push_back(first.id.as_str());
        seen.insert(first.id.as_str());
    }
    while let Some(id) = queue.pop_front() {
        let Some(step) = script.step(id) else { continue };
        let mut targets = transition_targets(&step.transition);
        if matches!(
            step.transition,
            Transition::YesNo {
                counts_cycle: Some(_),
                ..
            }
        ) {
            targets.push(script.fallback_step.as_str());
        }
        for target in targets {
            if let Some(next) = script.step(target) {
                if seen.insert(next.id.as_str()) {
                    queue.push_back(next.id.as_str());
                }
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================
    // Modality and WorkType
    // =========================================

    #[test]
    fn test_modality_round_trips_through_str() {
        for modality in Modality::all() {
            let parsed: Modality = modality.as_str().parse().unwrap();
            assert_eq!(parsed, modality);
        }
    }

    #[test]
    fn test_modality_rejects_unknown_name() {
        let result: Result<Modality, _> = "mood_shifting".parse();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("mood_shifting"));
    }

    #[test]
    fn test_modality_work_type_mapping() {
        assert_eq!(Modality::ProblemShifting.work_type(), WorkType::Problem);
        assert_eq!(Modality::IdentityShifting.work_type(), WorkType::Problem);
        assert_eq!(Modality::BeliefShifting.work_type(), WorkType::Problem);
        assert_eq!(Modality::BlockageShifting.work_type(), WorkType::Problem);
        assert_eq!(Modality::RealityShifting.work_type(), WorkType::Goal);
        assert_eq!(
            Modality::TraumaShifting.work_type(),
            WorkType::NegativeExperience
        );
    }

    #[test]
    fn test_only_reality_shifting_skips_digging() {
        for modality in Modality::all() {
            let expected = !matches!(modality, Modality::RealityShifting);
            assert_eq!(modality.has_digging(), expected, "{modality}");
        }
    }

    #[test]
    fn test_modality_serde_uses_snake_case() {
        let json = serde_json::to_string(&Modality::TraumaShifting).unwrap();
        assert_eq!(json, "\"trauma_shifting\"");
        let back: Modality = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Modality::TraumaShifting);
    }

    // =========================================
    // Standard catalog shape
    // =========================================

    #[test]
    fn test_standard_catalog_covers_all_modalities() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.modalities(), Modality::all().to_vec());
    }

    #[test]
    fn test_standard_catalog_is_lint_clean() {
        let defects = Catalog::standard().lint();
        assert!(defects.is_empty(), "lint defects: {defects:?}");
    }

    #[test]
    fn test_every_modality_starts_at_the_explanation_step() {
        let catalog = Catalog::standard();
        for modality in Modality::all() {
            let position = catalog.initial_position(modality).unwrap();
            assert_eq!(position.phase, "introduction", "{modality}");
            assert_eq!(position.step, "mind_shifting_explanation", "{modality}");
        }
    }

    #[test]
    fn test_every_modality_has_one_terminal_step() {
        let catalog = Catalog::standard();
        for modality in Modality::all() {
            let script = catalog.script(modality).unwrap();
            let terminals: Vec<&Step> = script.steps().filter(|s| s.is_terminal()).collect();
            assert_eq!(terminals.len(), 1, "{modality}");
            assert_eq!(terminals[0].id, "session_complete", "{modality}");
        }
    }

    #[test]
    fn test_default_cycle_caps() {
        let catalog = Catalog::standard();
        let caps = [
            (Modality::ProblemShifting, 15),
            (Modality::IdentityShifting, 12),
            (Modality::BeliefShifting, 12),
            (Modality::BlockageShifting, 12),
            (Modality::RealityShifting, 10),
            (Modality::TraumaShifting, 8),
        ];
        for (modality, cap) in caps {
            assert_eq!(catalog.script(modality).unwrap().cycle_cap, cap, "{modality}");
        }
    }

    #[test]
    fn test_fallback_steps_sit_in_integration() {
        let catalog = Catalog::standard();
        for modality in Modality::all() {
            let script = catalog.script(modality).unwrap();
            let phase = catalog
                .phase_of(modality, &script.fallback_step)
                .unwrap();
            assert_eq!(phase.id, "integration", "{modality}");
        }
    }

    #[test]
    fn test_step_lookup_by_id() {
        let catalog = Catalog::standard();
        let step = catalog
            .step(Modality::ProblemShifting, "body_sense")
            .unwrap();
        assert_eq!(step.id, "body_sense");
        assert!(step.prompt.contains("{statement}"));
    }

    #[test]
    fn test_unknown_step_lookup_fails() {
        let catalog = Catalog::standard();
        let err = catalog
            .step(Modality::ProblemShifting, "no_such_step")
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownStep { .. }));
    }

    #[test]
    fn test_phase_of_finds_owning_phase() {
        let catalog = Catalog::standard();
        let phase = catalog
            .phase_of(Modality::RealityShifting, "goal_vision")
            .unwrap();
        assert_eq!(phase.id, "reality_shifting");
    }

    #[test]
    fn test_capture_steps_declare_long_statement_trigger() {
        let catalog = Catalog::standard();
        for (modality, capture) in [
            (Modality::ProblemShifting, "problem_capture"),
            (Modality::RealityShifting, "goal_capture"),
            (Modality::TraumaShifting, "experience_capture"),
        ] {
            let step = catalog.step(modality, capture).unwrap();
            assert!(
                matches!(
                    step.assist_trigger,
                    Some(AssistTrigger::LongStatement { max_words: 20 })
                ),
                "{modality}/{capture}"
            );
        }
    }

    // =========================================
    // Lint defect detection
    // =========================================

    fn broken_script(mutate: impl FnOnce(&mut ModalityScript)) -> Catalog {
        let mut script = scripts::problem_shifting::script();
        mutate(&mut script);
        Catalog::from_scripts(vec![script])
    }

    #[test]
    fn test_lint_catches_unknown_transition_target() {
        let catalog = broken_script(|script| {
            script.phases[1].steps[0].transition = Transition::to("nowhere");
        });
        let defects = catalog.lint();
        assert!(defects
            .iter()
            .any(|d| matches!(d, CatalogError::UnknownTransitionTarget { target, .. } if target == "nowhere")));
    }

    #[test]
    fn test_lint_catches_unknown_placeholder() {
        let catalog = broken_script(|script| {
            script.phases[1].steps[0].prompt = "Feel '{prior:no_such_step}'.".to_string();
        });
        let defects = catalog.lint();
        assert!(defects
            .iter()
            .any(|d| matches!(d, CatalogError::UnknownPlaceholder { .. })));
    }

    #[test]
    fn test_lint_catches_missing_terminal() {
        let catalog = broken_script(|script| {
            for phase in &mut script.phases {
                for step in &mut phase.steps {
                    if step.is_terminal() {
                        step.transition = Transition::to("integration_start");
                    }
                }
            }
        });
        let defects = catalog.lint();
        assert!(defects
            .iter()
            .any(|d| matches!(d, CatalogError::MissingTerminal { .. })));
    }

    #[test]
    fn test_lint_catches_zero_cycle_cap() {
        let catalog = broken_script(|script| script.cycle_cap = 0);
        let defects = catalog.lint();
        assert!(defects
            .iter()
            .any(|d| matches!(d, CatalogError::ZeroCycleCap { .. })));
    }

    #[test]
    fn test_lint_catches_duplicate_step_ids() {
        let catalog = broken_script(|script| {
            let clone = script.phases[1].steps[0].clone();
            script.phases[1].steps.push(clone);
        });
        let defects = catalog.lint();
        assert!(defects
            .iter()
            .any(|d| matches!(d, CatalogError::DuplicateStep { .. })));
    }

    #[test]
    fn test_lint_catches_unknown_fallback() {
        let catalog = broken_script(|script| script.fallback_step = "gone".to_string());
        let defects = catalog.lint();
        assert!(defects
            .iter()
            .any(|d| matches!(d, CatalogError::UnknownFallback { .. })));
    }

    // =========================================
    // Fingerprint
    // =========================================

    #[test]
    fn test_fingerprint_is_stable() {
        let a = Catalog::standard().fingerprint();
        let b = Catalog::standard().fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_cycle_cap() {
        let base = Catalog::standard().fingerprint();
        let tweaked = Catalog::standard()
            .with_cycle_cap(Modality::ProblemShifting, 3)
            .fingerprint();
        assert_ne!(base, tweaked);
    }

    #[test]
    fn test_fingerprint_changes_with_prompt_wording() {
        let base = Catalog::standard().fingerprint();
        let mut script = scripts::problem_shifting::script();
        script.phases[1].steps[0].prompt.push_str(" Slowly.");
        let mut all = vec![script];
        all.extend([
            scripts::identity_shifting::script(),
            scripts::belief_shifting::script(),
            scripts::blockage_shifting::script(),
            scripts::reality_shifting::script(),
            scripts::trauma_shifting::script(),
        ]);
        let tweaked = Catalog::from_scripts(all).fingerprint();
        assert_ne!(base, tweaked);
    }

    // =========================================
    // Assist trigger
    // =========================================

    #[test]
    fn test_long_statement_trigger_counts_words() {
        let trigger = AssistTrigger::LongStatement { max_words: 5 };
        assert!(!trigger.fires("five words is just fine"));
        assert!(trigger.fires("six words is one word over"));
    }
}
