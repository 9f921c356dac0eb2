//! AI escalation gate.
//!
//! When validation escalates, an [`EscalationPolicy`] decides what the
//! guide says next. [`ScriptStrict`] answers from the fixed corrective
//! table and never calls out of process, which keeps script-strict
//! sessions byte-deterministic. [`Assisted`] asks an [`AssistClient`]
//! to compose the corrective and falls back to the scripted table on
//! any failure, so a dead endpoint can never stall a session.
//!
//! The gate also owns the trigger check that may inject composed
//! guidance on an otherwise valid answer; in script-strict mode that
//! check always reports no trigger.

pub mod client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::catalog::{Step, WorkType};
use crate::validation::EscalationCategory;
use client::{AssistClient, AssistPurpose, AssistRequest};

/// Scripted line a user-facing turn degrades to when an internal failure
/// must not leak into the conversation.
pub const CONTINUATION_LINE: &str = "Take a breath. Let's continue.";

/// Fixed corrective wording per escalation category. Total by
/// construction: every category has exactly one line.
pub fn strict_corrective(category: EscalationCategory) -> &'static str {
    match category {
        EscalationCategory::ProblemVsQuestion => {
            "How would you state that as a problem instead of a question?"
        }
        EscalationCategory::ProblemVsGoal => {
            "How would you state that as a problem instead of a goal?"
        }
        EscalationCategory::GoalVsProblem => {
            "How would you state that as a goal instead of a problem?"
        }
        EscalationCategory::GoalVsQuestion => {
            "How would you state that as a goal instead of a question?"
        }
        EscalationCategory::SingleNegativeExperience => {
            "It sounds like that covers more than one moment. What single negative \
             experience would you like to work on?"
        }
    }
}

/// One resolved gate decision: the line to speak and whether generative
/// output produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub text: String,
    pub used_ai: bool,
}

impl Resolution {
    pub fn scripted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            used_ai: false,
        }
    }

    pub fn composed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            used_ai: true,
        }
    }
}

/// Decides what the guide says when validation escalates, and whether
/// composed guidance may interrupt an otherwise valid turn.
#[async_trait]
pub trait EscalationPolicy: Send + Sync {
    /// Corrective line for an escalated answer. Must always produce a
    /// line; policies with fallible backends fall back to the scripted
    /// table rather than erroring.
    async fn resolve(
        &self,
        category: EscalationCategory,
        input: &str,
        step: &Step,
        work_type: WorkType,
        statement: Option<&str>,
    ) -> Resolution;

    /// Composed guidance for a valid answer, when the step declares a
    /// trigger and this policy allows it. `None` lets the turn advance.
    async fn guidance(
        &self,
        input: &str,
        step: &Step,
        work_type: WorkType,
        statement: Option<&str>,
    ) -> Option<Resolution>;
}

/// Script-strict policy: corrective table only, no triggers, no I/O.
pub struct ScriptStrict;

#[async_trait]
impl EscalationPolicy for ScriptStrict {
    async fn resolve(
        &self,
        category: EscalationCategory,
        _input: &str,
        _step: &Step,
        _work_type: WorkType,
        _statement: Option<&str>,
    ) -> Resolution {
        Resolution::scripted(strict_corrective(category))
    }

    async fn guidance(
        &self,
        _input: &str,
        _step: &Step,
        _work_type: WorkType,
        _statement: Option<&str>,
    ) -> Option<Resolution> {
        None
    }
}

/// Assisted policy: compose correctives and guidance through a client,
/// bounded by a timeout, degrading to scripted behavior on any failure.
pub struct Assisted {
    client: Arc<dyn AssistClient>,
    timeout: Duration,
}

impl Assisted {
    pub fn new(client: Arc<dyn AssistClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn complete(&self, request: &AssistRequest) -> anyhow::Result<String> {
        match tokio::time::timeout(self.timeout, self.client.complete(request)).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("assist call timed out after {:?}", self.timeout),
        }
    }
}

#[async_trait]
impl EscalationPolicy for Assisted {
    async fn resolve(
        &self,
        category: EscalationCategory,
        input: &str,
        step: &Step,
        work_type: WorkType,
        statement: Option<&str>,
    ) -> Resolution {
        let request = AssistRequest {
            purpose: AssistPurpose::Clarify(category),
            work_type,
            step_prompt: step.prompt.clone(),
            user_input: input.to_string(),
            statement: statement.map(str::to_string),
        };
        match self.complete(&request).await {
            Ok(text) => Resolution::composed(text),
            Err(err) => {
                warn!(
                    category = %category,
                    error = %err,
                    "assist resolve failed, falling back to scripted corrective"
                );
                Resolution::scripted(strict_corrective(category))
            }
        }
    }

    async fn guidance(
        &self,
        input: &str,
        step: &Step,
        work_type: WorkType,
        statement: Option<&str>,
    ) -> Option<Resolution> {
        let trigger = step.assist_trigger.as_ref()?;
        if !trigger.fires(input) {
            return None;
        }
        let request = AssistRequest {
            purpose: AssistPurpose::Rephrase,
            work_type,
            step_prompt: step.prompt.clone(),
            user_input: input.to_string(),
            statement: statement.map(str::to_string),
        };
        match self.complete(&request).await {
            Ok(text) => Some(Resolution::composed(text)),
            Err(err) => {
                warn!(error = %err, "assist guidance failed, continuing with the script");
                None
            }
        }
    }
}
