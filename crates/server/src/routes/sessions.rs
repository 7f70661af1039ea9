use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use debate_core::{Session, SessionConfig, Utterance};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UtterancesQuery {
    /// Only utterances with a sequence greater than this.
    pub after: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = SessionConfig,
    responses(
        (status = 201, description = "Session started", body = Session),
        (status = 400, description = "Invalid configuration")
    ),
    tag = "sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(config): Json<SessionConfig>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let handle = state.registry.start(config).await?;
    Ok((StatusCode::CREATED, Json(handle.snapshot())))
}

#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "List of all sessions", body = Vec<Session>)
    ),
    tag = "sessions"
)]
pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<Session>>, AppError> {
    let sessions = state.registry.list().await?;
    Ok(Json(sessions))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session found", body = Session),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    let session = state.registry.find(id).await?;
    Ok(Json(session))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/utterances",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        UtterancesQuery
    ),
    responses(
        (status = 200, description = "Transcript in sequence order", body = Vec<Utterance>),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn list_utterances(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UtterancesQuery>,
) -> Result<Json<Vec<Utterance>>, AppError> {
    let utterances = state
        .registry
        .history(id, query.after.unwrap_or_default())
        .await?;
    Ok(Json(utterances))
}
