//! State transition engine.
//!
//! [`TreatmentEngine`] owns the catalog, the live-session registry, the
//! persistence adapter and the escalation policies, and exposes the four
//! session operations: `initialize`, `process`, `undo`, `cancel`. Every
//! turn follows the same shape: snapshot for undo, validate, either
//! correct (position unchanged) or advance (record, transition, render
//! the next prompt), then persist best-effort.
//!
//! A turn never panics across the boundary: user input defects come back
//! as ordinary [`ProcessingResult`]s, protocol violations as typed
//! [`EngineError`]s, and persistence failures as a degraded-but-successful
//! turn.

pub mod context;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assist::client::AssistClient;
use crate::assist::{Assisted, EscalationPolicy, ScriptStrict};
use crate::catalog::{Catalog, Modality, StepEffect, Transition, YesNoAnswer, template};
use crate::errors::{CatalogError, EngineError, StoreError};
use crate::registry::{SessionRegistry, SessionState, SharedSession};
use crate::store::{SessionRecord, SessionStore};
use crate::validation::{ValidInput, ValidationOutcome, Validator};
use context::{
    ContextOverrides, Message, Role, Session, SessionStatus, TreatmentContext,
};

/// Sentinel first input: speaks the opening prompt without validating.
pub const SEED_INPUT: &str = "start";

const DEFAULT_USER_ID: &str = "anonymous";

/// Engine tuning knobs, normally filled in from configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Undo snapshots kept per session; zero means unbounded.
    pub max_history: usize,
    /// Upper bound on one persistence call before the turn is returned
    /// with a degraded advisory.
    pub save_timeout: Duration,
    /// Evict sessions idle for longer than this, checked opportunistically
    /// on initialize. `None` disables eviction.
    pub idle_after: Option<chrono::Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_history: 0,
            save_timeout: Duration::from_secs(5),
            idle_after: None,
        }
    }
}

impl EngineOptions {
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_save_timeout(mut self, save_timeout: Duration) -> Self {
        self.save_timeout = save_timeout;
        self
    }

    pub fn with_idle_after(mut self, idle_after: chrono::Duration) -> Self {
        self.idle_after = Some(idle_after);
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outcome of one user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// False once the session has reached its terminal step.
    pub can_continue: bool,
    pub scripted_response: String,
    pub current_phase: String,
    pub current_step: String,
    /// True only when generative output was actually spoken this turn.
    pub used_ai: bool,
    pub response_time_ms: u64,
    /// Advisory: the in-memory transition stands but saving it failed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub persistence_degraded: bool,
}

/// What initialize/process/undo hand back: the turn outcome plus the
/// full working memory it left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTurn {
    pub processing_result: ProcessingResult,
    pub context: TreatmentContext,
}

/// One row of the session listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub modality: Modality,
    pub status: SessionStatus,
    pub current_phase: String,
    pub current_step: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Parameters for starting a session.
#[derive(Debug, Clone)]
pub struct InitializeRequest {
    pub session_id: Option<String>,
    pub modality: Modality,
    pub initial_input: Option<String>,
    pub script_mode: bool,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
}

impl InitializeRequest {
    pub fn new(modality: Modality) -> Self {
        Self {
            session_id: None,
            modality,
            initial_input: None,
            script_mode: false,
            user_id: None,
            tenant_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_initial_input(mut self, initial_input: impl Into<String>) -> Self {
        self.initial_input = Some(initial_input.into());
        self
    }

    pub fn with_script_mode(mut self, script_mode: bool) -> Self {
        self.script_mode = script_mode;
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Parameters for one user turn on an existing session.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub user_input: String,
    pub context_overrides: Option<ContextOverrides>,
    pub script_mode: bool,
}

impl ProcessRequest {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            context_overrides: None,
            script_mode: false,
        }
    }

    pub fn with_overrides(mut self, overrides: ContextOverrides) -> Self {
        self.context_overrides = Some(overrides);
        self
    }

    pub fn with_script_mode(mut self, script_mode: bool) -> Self {
        self.script_mode = script_mode;
        self
    }
}

struct TurnOutcome {
    response: String,
    used_ai: bool,
}

/// The scripted treatment engine.
pub struct TreatmentEngine {
    catalog: Catalog,
    registry: SessionRegistry,
    store: Arc<dyn SessionStore>,
    validator: Validator,
    strict: Arc<dyn EscalationPolicy>,
    assisted: Arc<dyn EscalationPolicy>,
    options: EngineOptions,
}

impl std::fmt::Debug for TreatmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreatmentEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TreatmentEngine {
    /// Build an engine over a linted catalog. Both escalation policies
    /// start script-strict; attach a client with [`with_assist_client`]
    /// to enable composed correctives in assisted mode.
    ///
    /// [`with_assist_client`]: TreatmentEngine::with_assist_client
    pub fn new(
        catalog: Catalog,
        store: Arc<dyn SessionStore>,
        options: EngineOptions,
    ) -> Result<Self, CatalogError> {
        let defects = catalog.lint();
        if !defects.is_empty() {
            for defect in &defects {
                error!(%defect, "catalog lint defect");
            }
            if let Some(first) = defects.into_iter().next() {
                return Err(first);
            }
        }
        Ok(Self {
            catalog,
            registry: SessionRegistry::new(),
            store,
            validator: Validator::standard(),
            strict: Arc::new(ScriptStrict),
            assisted: Arc::new(ScriptStrict),
            options,
        })
    }

    pub fn with_assist_client(mut self, client: Arc<dyn AssistClient>, timeout: Duration) -> Self {
        self.assisted = Arc::new(Assisted::new(client, timeout));
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Start a session and run its first turn. The default first input is
    /// the `"start"` sentinel, which speaks the opening prompt without
    /// validating; any other input is processed as a real first answer.
    pub async fn initialize(&self, request: InitializeRequest) -> Result<SessionTurn, EngineError> {
        let started = Instant::now();
        if let Some(idle_after) = self.options.idle_after {
            let evicted = self.registry.evict_idle(idle_after).await;
            if evicted > 0 {
                debug!(evicted, "evicted idle sessions");
            }
        }

        let session_id = request
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.registry.contains(&session_id).await {
            return Err(EngineError::SessionExists { session_id });
        }

        let modality = request.modality;
        let position = self.catalog.initial_position(modality)?;
        let user_id = request.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string());

        let mut session = Session::new(&session_id, &user_id, modality, &position);
        if let Some(tenant_id) = request.tenant_id {
            session = session.with_tenant(tenant_id);
        }
        let context = TreatmentContext::seed(
            &session_id,
            &user_id,
            modality,
            &position,
            self.catalog.fingerprint(),
        );
        let mut state = SessionState::new(session, context, self.options.max_history);

        let input = request.initial_input.unwrap_or_else(|| SEED_INPUT.to_string());
        let outcome = if input.trim().eq_ignore_ascii_case(SEED_INPUT) {
            self.seed_turn(&mut state, &input)?
        } else {
            self.run_turn(&mut state, &input, None, request.script_mode)
                .await?
        };

        info!(
            session_id = %session_id,
            modality = %modality,
            script_mode = request.script_mode,
            "session initialized"
        );

        let shared = self.registry.create(state).await?;
        let state = shared.lock().await;
        let degraded = self.persist(&state).await;
        Ok(self.turn(&state, outcome, started, degraded))
    }

    /// Run one user turn. At most one turn is in flight per session id;
    /// the per-session mutex is held for the full read-modify-write.
    pub async fn process(
        &self,
        session_id: &str,
        request: ProcessRequest,
    ) -> Result<SessionTurn, EngineError> {
        let started = Instant::now();
        let shared = self.require_session(session_id).await?;
        let mut state = shared.lock().await;
        self.require_active(&state)?;

        let outcome = self
            .run_turn(
                &mut state,
                &request.user_input,
                request.context_overrides.as_ref(),
                request.script_mode,
            )
            .await?;
        let degraded = self.persist(&state).await;
        Ok(self.turn(&state, outcome, started, degraded))
    }

    /// Restore the context and transcript captured before the latest turn.
    pub async fn undo(&self, session_id: &str) -> Result<SessionTurn, EngineError> {
        let started = Instant::now();
        let shared = self.require_session(session_id).await?;
        let mut state = shared.lock().await;
        self.require_active(&state)?;

        let entry = state
            .history
            .undo()
            .ok_or_else(|| EngineError::NothingToUndo {
                session_id: session_id.to_string(),
            })?;
        state.context = entry.context;
        state.message_log = entry.message_log;
        let position = state.context.position();
        state.session.set_position(&position);

        let response = match state
            .message_log
            .iter()
            .rev()
            .find(|message| message.role == Role::Guide)
        {
            Some(message) => message.content.clone(),
            None => {
                let step = self
                    .catalog
                    .step(state.session.modality, &state.context.current_step)?;
                template::render(&step.id, &step.prompt, &state.context)?
            }
        };

        debug!(session_id = %session_id, step = %state.context.current_step, "turn undone");
        let degraded = self.persist(&state).await;
        let outcome = TurnOutcome {
            response,
            used_ai: false,
        };
        Ok(self.turn(&state, outcome, started, degraded))
    }

    /// Terminate a session without completing it.
    pub async fn cancel(&self, session_id: &str) -> Result<SessionRecord, EngineError> {
        let shared = self.require_session(session_id).await?;
        let mut state = shared.lock().await;
        self.require_active(&state)?;
        state.session.cancel();
        info!(session_id = %session_id, "session cancelled");
        self.persist(&state).await;
        Ok(self.record(&state))
    }

    /// Full record of one session, rehydrating from the store if needed.
    pub async fn session(&self, session_id: &str) -> Result<SessionRecord, EngineError> {
        let shared = self.require_session(session_id).await?;
        let state = shared.lock().await;
        Ok(self.record(&state))
    }

    /// Summaries of every live session, most recently touched first.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        for (_, shared) in self.registry.entries().await {
            let state = shared.lock().await;
            summaries.push(SessionSummary {
                session_id: state.session.session_id.clone(),
                modality: state.session.modality,
                status: state.session.status,
                current_phase: state.session.current_phase.clone(),
                current_step: state.session.current_step.clone(),
                updated_at: state.session.updated_at,
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Drop a session from the registry and the store.
    pub async fn evict(&self, session_id: &str) -> Result<(), EngineError> {
        let was_live = self.registry.remove(session_id).await.is_some();
        let was_stored = match self.store.load(session_id).await {
            Ok(_) => true,
            Err(StoreError::NotFound { .. }) => false,
            Err(err) => return Err(err.into()),
        };
        if !was_live && !was_stored {
            return Err(EngineError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        self.store.delete(session_id).await?;
        info!(session_id = %session_id, "session evicted");
        Ok(())
    }

    // ── Turn internals ───────────────────────────────────────────────

    fn require_active(&self, state: &SessionState) -> Result<(), EngineError> {
        if state.session.status.is_active() {
            return Ok(());
        }
        Err(EngineError::SessionTerminal {
            session_id: state.session.session_id.clone(),
            status: state.session.status.to_string(),
        })
    }

    async fn require_session(&self, session_id: &str) -> Result<SharedSession, EngineError> {
        if let Some(shared) = self.registry.get(session_id).await {
            return Ok(shared);
        }
        match self.store.load(session_id).await {
            Ok(record) => {
                if record.context.metadata.catalog_fingerprint != self.catalog.fingerprint() {
                    return Err(EngineError::CatalogMismatch {
                        session_id: session_id.to_string(),
                    });
                }
                let mut state = SessionState::new(
                    record.session,
                    record.context,
                    self.options.max_history,
                );
                state.message_log = record.message_log;
                info!(session_id = %session_id, "session rehydrated from store");
                Ok(self.registry.adopt(state).await)
            }
            Err(StoreError::NotFound { .. }) => Err(EngineError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// The sentinel turn: log the input and speak the current prompt
    /// without validating or advancing.
    fn seed_turn(&self, state: &mut SessionState, input: &str) -> Result<TurnOutcome, EngineError> {
        state.history.snapshot(&state.context, &state.message_log);
        state.message_log.push(Message::user(input));
        let step = self
            .catalog
            .step(state.session.modality, &state.context.current_step)?;
        let text = template::render(&step.id, &step.prompt, &state.context)?;
        Ok(self.reply(state, text, false))
    }

    async fn run_turn(
        &self,
        state: &mut SessionState,
        raw_input: &str,
        overrides: Option<&ContextOverrides>,
        script_mode: bool,
    ) -> Result<TurnOutcome, EngineError> {
        state.history.snapshot(&state.context, &state.message_log);
        if let Some(overrides) = overrides {
            state.context.apply_overrides(overrides);
        }
        state.message_log.push(Message::user(raw_input));

        let modality = state.session.modality;
        let step = self.catalog.step(modality, &state.context.current_step)?.clone();
        let work_type = state
            .context
            .metadata
            .work_type
            .unwrap_or_else(|| modality.work_type());
        let statement = state.context.metadata.problem_statement.clone();
        let policy = self.policy(script_mode);

        let valid = match self
            .validator
            .validate(raw_input, &step, state.context.metadata.work_type)
        {
            ValidationOutcome::Invalid(reask) => {
                debug!(
                    session_id = %state.session.session_id,
                    step = %step.id,
                    "input rejected, re-asking"
                );
                return Ok(self.reply(state, reask, false));
            }
            ValidationOutcome::Escalate(category) => {
                let resolution = policy
                    .resolve(category, raw_input, &step, work_type, statement.as_deref())
                    .await;
                debug!(
                    session_id = %state.session.session_id,
                    step = %step.id,
                    category = %category,
                    used_ai = resolution.used_ai,
                    "input escalated"
                );
                return Ok(self.reply(state, resolution.text, resolution.used_ai));
            }
            ValidationOutcome::Valid(valid) => valid,
        };

        if let Some(guidance) = policy
            .guidance(raw_input, &step, work_type, statement.as_deref())
            .await
        {
            debug!(
                session_id = %state.session.session_id,
                step = %step.id,
                "composed guidance injected"
            );
            return Ok(self.reply(state, guidance.text, guidance.used_ai));
        }

        let recorded = canonical_answer(&valid, &step);
        state.context.record_response(&step.id, &recorded);
        if step.effect == Some(StepEffect::SetStatement) {
            state.context.metadata.problem_statement = Some(recorded);
        }

        let script = self.catalog.script(modality)?;
        let next_id = match &step.transition {
            Transition::To { step: target } => target.clone(),
            Transition::YesNo {
                yes,
                no,
                counts_cycle,
            } => {
                let ValidInput::Answer(answer) = valid else {
                    return Err(EngineError::BadRequest(format!(
                        "Step '{}' routes on a yes/no answer",
                        step.id
                    )));
                };
                let target = match answer {
                    YesNoAnswer::Yes => yes.clone(),
                    YesNoAnswer::No => no.clone(),
                };
                if *counts_cycle == Some(answer) {
                    state.context.metadata.cycle_count += 1;
                    if state.context.metadata.cycle_count >= script.cycle_cap {
                        debug!(
                            session_id = %state.session.session_id,
                            cycle_count = state.context.metadata.cycle_count,
                            cap = script.cycle_cap,
                            "cycle cap reached, routing to fallback"
                        );
                        script.fallback_step.clone()
                    } else {
                        target
                    }
                } else {
                    target
                }
            }
            Transition::End => {
                state.session.complete();
                let text = template::render(&step.id, &step.prompt, &state.context)?;
                return Ok(self.reply(state, text, false));
            }
        };

        let next_phase = self.catalog.phase_of(modality, &next_id)?.id.clone();
        state.context.current_phase = next_phase;
        state.context.current_step = next_id.clone();
        let position = state.context.position();
        state.session.set_position(&position);

        let next_step = self.catalog.step(modality, &next_id)?;
        if next_step.is_terminal() {
            state.session.complete();
            info!(session_id = %state.session.session_id, "session completed");
        }

        let text = template::render(&next_step.id, &next_step.prompt, &state.context)?;
        Ok(self.reply(state, text, false))
    }

    fn reply(&self, state: &mut SessionState, text: String, used_ai: bool) -> TurnOutcome {
        state.message_log.push(Message::guide(text.clone()));
        state.context.touch();
        TurnOutcome {
            response: text,
            used_ai,
        }
    }

    fn policy(&self, script_mode: bool) -> &dyn EscalationPolicy {
        if script_mode {
            self.strict.as_ref()
        } else {
            self.assisted.as_ref()
        }
    }

    /// Best-effort save, bounded by the configured timeout. Returns true
    /// when the turn should carry the degraded advisory.
    async fn persist(&self, state: &SessionState) -> bool {
        let record = self.record(state);
        match tokio::time::timeout(self.options.save_timeout, self.store.save(&record)).await {
            Ok(Ok(())) => false,
            Ok(Err(err)) => {
                warn!(
                    session_id = %record.session_id(),
                    error = %err,
                    "session save failed, continuing in memory"
                );
                true
            }
            Err(_) => {
                warn!(
                    session_id = %record.session_id(),
                    timeout_ms = self.options.save_timeout.as_millis() as u64,
                    "session save timed out, continuing in memory"
                );
                true
            }
        }
    }

    fn record(&self, state: &SessionState) -> SessionRecord {
        SessionRecord::new(
            state.session.clone(),
            state.context.clone(),
            state.message_log.clone(),
        )
    }

    fn turn(
        &self,
        state: &SessionState,
        outcome: TurnOutcome,
        started: Instant,
        persistence_degraded: bool,
    ) -> SessionTurn {
        SessionTurn {
            processing_result: ProcessingResult {
                can_continue: state.session.status.is_active(),
                scripted_response: outcome.response,
                current_phase: state.context.current_phase.clone(),
                current_step: state.context.current_step.clone(),
                used_ai: outcome.used_ai,
                response_time_ms: started.elapsed().as_millis() as u64,
                persistence_degraded,
            },
            context: state.context.clone(),
        }
    }
}

/// What gets written into the response log for an accepted answer:
/// trimmed text, the normalized yes/no token, or the chosen option label.
fn canonical_answer(valid: &ValidInput, step: &crate::catalog::Step) -> String {
    match valid {
        ValidInput::Text(text) => text.clone(),
        ValidInput::Answer(answer) => answer.as_str().to_string(),
        ValidInput::Choice(index) => match &step.expected {
            crate::catalog::ExpectedInput::Choice { options, .. } => options
                .get(*index)
                .cloned()
                .unwrap_or_else(|| (index + 1).to_string()),
            _ => (index + 1).to_string(),
        },
    }
}
