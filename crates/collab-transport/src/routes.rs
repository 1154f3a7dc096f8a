//! HTTP routes for the request/response operations.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use collab_assist::DiagramService;
use collab_core::{CollabError, SessionId};
use collab_session::{SessionRegistry, SessionStats};

use crate::{
    ApiError,
    protocol::{
        GenerateDiagramRequest, GenerateDiagramResponse, JoinSessionRequest, JoinSessionResponse,
        LocalUpdateReply, LocalUpdateRequest, SessionResponse,
    },
    websocket,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub diagrams: Arc<DiagramService>,
}

impl AppState {
    #[must_use]
    pub const fn new(registry: Arc<SessionRegistry>, diagrams: Arc<DiagramService>) -> Self {
        Self { registry, diagrams }
    }
}

/// Build the service router.
///
/// # Example
/// ```ignore
/// let app = create_router(state)
///     .layer(CorsLayer::permissive());
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/create-session", post(create_session))
        .route("/join-session", post(join_session))
        .route("/send-local-update", post(send_local_update))
        .route("/subscribe", get(websocket::subscribe_handler))
        .route("/generate-diagram", post(generate_diagram))
        .route("/sessions/{session_id}", get(session_stats))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn create_session(State(state): State<AppState>) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = state.registry.create_session().inspect_err(|e| {
        tracing::error!(error = %e, "Failed to create session");
    })?;
    Ok(Json(SessionResponse { session_id }))
}

async fn join_session(
    State(state): State<AppState>,
    Json(request): Json<JoinSessionRequest>,
) -> Result<Json<JoinSessionResponse>, ApiError> {
    let replica_id = state
        .registry
        .join_session(&request.session_id, request.nickname)
        .inspect_err(|e| tracing::warn!(session_id = %request.session_id, error = %e, "Join rejected"))?;
    Ok(Json(JoinSessionResponse { replica_id }))
}

async fn send_local_update(
    State(state): State<AppState>,
    Json(request): Json<LocalUpdateRequest>,
) -> Json<LocalUpdateReply> {
    tracing::debug!(
        session_id = %request.session_id,
        replica_id = %request.replica_id,
        "Replica sent local update"
    );

    let result = state
        .registry
        .publish(&request.session_id, request.replica_id, request.node);
    if let Err(e) = &result {
        tracing::warn!(session_id = %request.session_id, error = %e, "Local update rejected");
    }

    Json(LocalUpdateReply::from_result(&result))
}

async fn generate_diagram(
    State(state): State<AppState>,
    Json(request): Json<GenerateDiagramRequest>,
) -> Json<GenerateDiagramResponse> {
    let plant_uml_code = state.diagrams.generate_diagram(&request.selected_text).await;
    Json(GenerateDiagramResponse { plant_uml_code })
}

async fn session_stats(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionStats>, ApiError> {
    state
        .registry
        .stats(&session_id)
        .map(Json)
        .ok_or_else(|| CollabError::SessionNotFound(session_id).into())
}
