//! Session and working-memory model.
//!
//! A [`Session`] is the externally visible record of one treatment run;
//! a [`TreatmentContext`] is its full working memory — everything the
//! script needs to render prompts and decide transitions. Exactly one
//! context is live per active session. The context is the unit that is
//! snapshotted for undo and the unit handed to the persistence adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::template::PromptContext;
use crate::catalog::{Modality, ScriptPosition, WorkType};

/// Who said a line in the session transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Guide,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of the session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn guide(content: impl Into<String>) -> Self {
        Self {
            role: Role::Guide,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle state of a session. Terminal once it leaves `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Paused,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Paused => "paused",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the script may still advance.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Externally visible record of one treatment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub modality: Modality,
    pub status: SessionStatus,
    pub current_phase: String,
    pub current_step: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        modality: Modality,
        position: &ScriptPosition,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            tenant_id: None,
            modality,
            status: SessionStatus::Active,
            current_phase: position.phase.clone(),
            current_step: position.step.clone(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn position(&self) -> ScriptPosition {
        ScriptPosition {
            phase: self.current_phase.clone(),
            step: self.current_step.clone(),
        }
    }

    pub fn set_position(&mut self, position: &ScriptPosition) {
        self.current_phase = position.phase.clone();
        self.current_step = position.step.clone();
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        let now = Utc::now();
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn cancel(&mut self) {
        let now = Utc::now();
        self.status = SessionStatus::Cancelled;
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}

/// One accepted (or corrected) user answer. The log is append-only;
/// undo truncates it back to a snapshot's length, nothing else rewrites
/// an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub step_id: String,
    pub response: String,
}

/// Accumulated script-visible facts about the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    #[serde(default)]
    pub cycle_count: u32,
    /// The confirmed working statement (problem, goal or negative
    /// experience alike; the field name follows the session data model).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response: Option<String>,
    /// Set exactly once, at or before the first phase transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<WorkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_method: Option<Modality>,
    #[serde(default)]
    pub catalog_fingerprint: String,
}

impl Default for ContextMetadata {
    fn default() -> Self {
        Self {
            cycle_count: 0,
            problem_statement: None,
            last_response: None,
            work_type: None,
            selected_method: None,
            catalog_fingerprint: String::new(),
        }
    }
}

/// Full working memory for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentContext {
    pub session_id: String,
    pub user_id: String,
    pub current_phase: String,
    pub current_step: String,
    #[serde(default)]
    pub user_responses: Vec<ResponseEntry>,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub metadata: ContextMetadata,
}

impl TreatmentContext {
    /// Seed a fresh context at a script's initial position.
    pub fn seed(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        modality: Modality,
        position: &ScriptPosition,
        catalog_fingerprint: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            current_phase: position.phase.clone(),
            current_step: position.step.clone(),
            user_responses: Vec::new(),
            start_time: now,
            last_activity: now,
            metadata: ContextMetadata {
                work_type: Some(modality.work_type()),
                selected_method: Some(modality),
                catalog_fingerprint: catalog_fingerprint.into(),
                ..ContextMetadata::default()
            },
        }
    }

    pub fn position(&self) -> ScriptPosition {
        ScriptPosition {
            phase: self.current_phase.clone(),
            step: self.current_step.clone(),
        }
    }

    pub fn set_position(&mut self, position: &ScriptPosition) {
        self.current_phase = position.phase.clone();
        self.current_step = position.step.clone();
    }

    /// Append an accepted answer and remember it as the latest response.
    pub fn record_response(&mut self, step_id: impl Into<String>, response: impl Into<String>) {
        let response = response.into();
        self.user_responses.push(ResponseEntry {
            step_id: step_id.into(),
            response: response.clone(),
        });
        self.metadata.last_response = Some(response);
    }

    /// Latest recorded answer for a step, if any (last write wins across
    /// loop iterations).
    pub fn response_for(&self, step_id: &str) -> Option<&str> {
        self.user_responses
            .iter()
            .rev()
            .find(|entry| entry.step_id == step_id)
            .map(|entry| entry.response.as_str())
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Merge a partial patch onto this context. Nested metadata fields
    /// merge field-wise; `work_type` and `selected_method` are set-once
    /// and a patch never replaces an existing value.
    pub fn apply_overrides(&mut self, overrides: &ContextOverrides) {
        let Some(patch) = &overrides.metadata else {
            return;
        };
        if let Some(cycle_count) = patch.cycle_count {
            self.metadata.cycle_count = cycle_count;
        }
        if let Some(statement) = &patch.problem_statement {
            self.metadata.problem_statement = Some(statement.clone());
        }
        if let Some(last) = &patch.last_response {
            self.metadata.last_response = Some(last.clone());
        }
        if self.metadata.work_type.is_none() {
            self.metadata.work_type = patch.work_type;
        }
        if self.metadata.selected_method.is_none() {
            self.metadata.selected_method = patch.selected_method;
        }
    }
}

impl PromptContext for TreatmentContext {
    fn statement(&self) -> Option<&str> {
        self.metadata.problem_statement.as_deref()
    }

    fn last_response(&self) -> Option<&str> {
        self.metadata.last_response.as_deref()
    }

    fn prior(&self, step_id: &str) -> Option<&str> {
        self.response_for(step_id)
    }
}

/// Field-wise patch of [`ContextMetadata`]. Absent fields keep their
/// current values; the catalog fingerprint is never patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<WorkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_method: Option<Modality>,
}

/// Partial context patch accepted on `process` calls. Only metadata is
/// patchable; script position stays under engine control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataPatch>,
}

impl ContextOverrides {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_none()
    }
}
