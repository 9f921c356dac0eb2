//! HTTP boundary.
//!
//! Maps the engine's session operations onto an axum router. Failures
//! cross as tagged JSON (`{"error": {"kind", "message"}}`), never a
//! panic; internal failures on the message path degrade to the generic
//! continuation line so the conversation itself stays intact.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::assist::CONTINUATION_LINE;
use crate::catalog::{Modality, ModalityScript};
use crate::engine::context::ContextOverrides;
use crate::engine::{
    InitializeRequest, ProcessRequest, ProcessingResult, SessionTurn, TreatmentEngine,
};
use crate::errors::EngineError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub engine: TreatmentEngine,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub session_id: Option<String>,
    pub modality: String,
    pub initial_input: Option<String>,
    #[serde(default)]
    pub script_mode: bool,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
}

#[derive(Deserialize)]
pub struct MessageRequest {
    pub user_input: String,
    pub context_overrides: Option<ContextOverrides>,
    #[serde(default)]
    pub script_mode: bool,
}

#[derive(Serialize)]
pub struct CatalogOverview {
    pub fingerprint: String,
    pub modalities: Vec<ModalitySummary>,
}

#[derive(Serialize)]
pub struct ModalitySummary {
    pub modality: Modality,
    pub work_type: String,
    pub phases: usize,
    pub steps: usize,
    pub cycle_cap: u32,
    pub fallback_step: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    SessionNotFound(String),
    InvalidAction(String),
    ValidationFailed(String),
    Internal(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::SessionNotFound(_) => "session_not_found",
            ApiError::InvalidAction(_) => "invalid_action",
            ApiError::ValidationFailed(_) => "validation_failed",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::SessionNotFound { .. } => ApiError::SessionNotFound(err.to_string()),
            EngineError::SessionExists { .. }
            | EngineError::SessionTerminal { .. }
            | EngineError::NothingToUndo { .. }
            | EngineError::CatalogMismatch { .. } => ApiError::InvalidAction(err.to_string()),
            EngineError::BadRequest(_) => ApiError::ValidationFailed(err.to_string()),
            EngineError::Catalog(_) | EngineError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message) = match self {
            ApiError::SessionNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InvalidAction(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ValidationFailed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (
            status,
            Json(serde_json::json!({"error": {"kind": kind, "message": message}})),
        )
            .into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/sessions/{id}/messages", post(process_message))
        .route("/api/sessions/{id}/undo", post(undo_turn))
        .route("/api/sessions/{id}/cancel", post(cancel_session))
        .route("/api/catalog", get(catalog_overview))
        .route("/api/catalog/{modality}", get(catalog_script))
        .route("/health", get(health_check))
}

pub fn build_router(state: SharedState) -> Router {
    api_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until ctrl-c.
pub async fn start_server(engine: TreatmentEngine, bind: &str, port: u16) -> Result<()> {
    let state = Arc::new(AppState { engine });
    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "listening");
    println!("Mindshift API running at http://{local_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    println!("\nShutting down...");
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn create_session(
    State(state): State<SharedState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let modality: Modality = req
        .modality
        .parse()
        .map_err(|err: anyhow::Error| ApiError::ValidationFailed(err.to_string()))?;

    let mut request = InitializeRequest::new(modality).with_script_mode(req.script_mode);
    if let Some(session_id) = req.session_id {
        request = request.with_session_id(session_id);
    }
    if let Some(initial_input) = req.initial_input {
        request = request.with_initial_input(initial_input);
    }
    if let Some(user_id) = req.user_id {
        request = request.with_user_id(user_id);
    }
    if let Some(tenant_id) = req.tenant_id {
        request = request.with_tenant_id(tenant_id);
    }

    let turn = state.engine.initialize(request).await?;
    Ok((StatusCode::CREATED, Json(turn)))
}

async fn process_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<SessionTurn>, ApiError> {
    if req.user_input.trim().is_empty() {
        return Err(ApiError::ValidationFailed(
            "user_input must not be empty".to_string(),
        ));
    }

    let mut request = ProcessRequest::new(req.user_input).with_script_mode(req.script_mode);
    if let Some(overrides) = req.context_overrides {
        request = request.with_overrides(overrides);
    }

    match state.engine.process(&id, request).await {
        Ok(turn) => Ok(Json(turn)),
        Err(err) => {
            let api: ApiError = err.into();
            match api {
                ApiError::Internal(message) => {
                    error!(
                        session_id = %id,
                        error = %message,
                        "turn failed, degrading to the continuation line"
                    );
                    match degraded_turn(&state, &id).await {
                        Some(turn) => Ok(Json(turn)),
                        None => Err(ApiError::Internal(message)),
                    }
                }
                other => Err(other),
            }
        }
    }
}

/// A stand-in turn for when the engine failed mid-conversation: the
/// generic continuation line at the session's last known position.
async fn degraded_turn(state: &SharedState, session_id: &str) -> Option<SessionTurn> {
    let record = state.engine.session(session_id).await.ok()?;
    Some(SessionTurn {
        processing_result: ProcessingResult {
            can_continue: record.session.status.is_active(),
            scripted_response: CONTINUATION_LINE.to_string(),
            current_phase: record.session.current_phase.clone(),
            current_step: record.session.current_step.clone(),
            used_ai: false,
            response_time_ms: 0,
            persistence_degraded: false,
        },
        context: record.context,
    })
}

async fn undo_turn(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionTurn>, ApiError> {
    let turn = state.engine.undo(&id).await?;
    Ok(Json(turn))
}

async fn cancel_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.engine.cancel(&id).await?;
    Ok(Json(record))
}

async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.engine.session(&id).await?;
    Ok(Json(record))
}

async fn list_sessions(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.engine.sessions().await)
}

async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.evict(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn catalog_overview(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let catalog = state.engine.catalog();
    let mut modalities = Vec::new();
    for modality in Modality::all() {
        let script = catalog
            .script(modality)
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        modalities.push(ModalitySummary {
            modality,
            work_type: modality.work_type().noun().to_string(),
            phases: script.phases.len(),
            steps: script.phases.iter().map(|p| p.steps.len()).sum(),
            cycle_cap: script.cycle_cap,
            fallback_step: script.fallback_step.clone(),
        });
    }
    Ok(Json(CatalogOverview {
        fingerprint: catalog.fingerprint(),
        modalities,
    }))
}

async fn catalog_script(
    State(state): State<SharedState>,
    Path(modality): Path<String>,
) -> Result<Json<ModalityScript>, ApiError> {
    let modality: Modality = modality
        .parse()
        .map_err(|err: anyhow::Error| ApiError::ValidationFailed(err.to_string()))?;
    let script = state
        .engine
        .catalog()
        .script(modality)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(script.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::engine::EngineOptions;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let engine = TreatmentEngine::new(
            Catalog::standard(),
            Arc::new(MemoryStore::new()),
            EngineOptions::default(),
        )
        .expect("engine");
        build_router(Arc::new(AppState { engine }))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn create(app: &Router, session_id: &str) -> serde_json::Value {
        let req = post_json(
            "/api/sessions",
            serde_json::json!({
                "session_id": session_id,
                "modality": "problem_shifting",
                "script_mode": true,
            }),
        );
        let resp = app.clone().oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await
    }

    // =========================================
    // Health and session creation
    // =========================================

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request");
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_session_seeds_the_opening_prompt() {
        let app = test_router();
        let body = create(&app, "api-1").await;
        assert_eq!(
            body["processing_result"]["current_step"],
            "mind_shifting_explanation"
        );
        assert_eq!(body["processing_result"]["can_continue"], true);
        assert_eq!(body["context"]["session_id"], "api-1");
    }

    #[tokio::test]
    async fn test_unknown_modality_is_validation_failed() {
        let app = test_router();
        let req = post_json(
            "/api/sessions",
            serde_json::json!({"modality": "mood_shifting"}),
        );
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["kind"], "validation_failed");
    }

    #[tokio::test]
    async fn test_double_initialize_is_a_conflict() {
        let app = test_router();
        create(&app, "api-1").await;
        let req = post_json(
            "/api/sessions",
            serde_json::json!({"session_id": "api-1", "modality": "problem_shifting"}),
        );
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["kind"], "invalid_action");
    }

    // =========================================
    // Messages
    // =========================================

    #[tokio::test]
    async fn test_message_advances_the_session() {
        let app = test_router();
        create(&app, "api-1").await;
        let req = post_json(
            "/api/sessions/api-1/messages",
            serde_json::json!({"user_input": "1", "script_mode": true}),
        );
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["processing_result"]["current_step"], "problem_capture");
        assert_eq!(body["processing_result"]["used_ai"], false);
    }

    #[tokio::test]
    async fn test_empty_input_is_validation_failed() {
        let app = test_router();
        create(&app, "api-1").await;
        let req = post_json(
            "/api/sessions/api-1/messages",
            serde_json::json!({"user_input": "   "}),
        );
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_message_to_unknown_session_is_not_found() {
        let app = test_router();
        let req = post_json(
            "/api/sessions/missing/messages",
            serde_json::json!({"user_input": "1"}),
        );
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["kind"], "session_not_found");
    }

    // =========================================
    // Undo, cancel, delete
    // =========================================

    #[tokio::test]
    async fn test_undo_then_empty_history_conflicts() {
        let app = test_router();
        create(&app, "api-1").await;

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/sessions/api-1/undo",
                serde_json::json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(post_json(
                "/api/sessions/api-1/undo",
                serde_json::json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cancel_then_message_conflicts() {
        let app = test_router();
        create(&app, "api-1").await;

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/sessions/api-1/cancel",
                serde_json::json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["session"]["status"], "cancelled");

        let resp = app
            .oneshot(post_json(
                "/api/sessions/api-1/messages",
                serde_json::json!({"user_input": "1"}),
            ))
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_delete_session_then_get_is_not_found() {
        let app = test_router();
        create(&app, "api-1").await;

        let req = Request::builder()
            .method("DELETE")
            .uri("/api/sessions/api-1")
            .body(Body::empty())
            .expect("request");
        let resp = app.clone().oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = Request::builder()
            .uri("/api/sessions/api-1")
            .body(Body::empty())
            .expect("request");
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // =========================================
    // Catalog inspection
    // =========================================

    #[tokio::test]
    async fn test_catalog_overview_lists_six_modalities() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/catalog")
            .body(Body::empty())
            .expect("request");
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["modalities"].as_array().map(|m| m.len()), Some(6));
        assert!(body["fingerprint"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_catalog_script_endpoint() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/catalog/problem_shifting")
            .body(Body::empty())
            .expect("request");
        let resp = app.clone().oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["modality"], "problem_shifting");

        let req = Request::builder()
            .uri("/api/catalog/mood_shifting")
            .body(Body::empty())
            .expect("request");
        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    // =========================================
    // Error mapping
    // =========================================

    #[test]
    fn test_engine_errors_map_to_kinds() {
        let not_found = ApiError::from(EngineError::SessionNotFound {
            session_id: "s".to_string(),
        });
        assert_eq!(not_found.kind(), "session_not_found");

        let exists = ApiError::from(EngineError::SessionExists {
            session_id: "s".to_string(),
        });
        assert_eq!(exists.kind(), "invalid_action");

        let mismatch = ApiError::from(EngineError::CatalogMismatch {
            session_id: "s".to_string(),
        });
        assert_eq!(mismatch.kind(), "invalid_action");

        let bad = ApiError::from(EngineError::BadRequest("nope".to_string()));
        assert_eq!(bad.kind(), "validation_failed");
    }
}
