//! Operator and participant commands. Every accepted command answers
//! 202: it takes effect at the session's next safe point.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use debate_core::{PendingIntervention, SpeakerRole};
use orchestrator::Intervention;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

type Accepted = (StatusCode, Json<PendingIntervention>);

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StopRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HumanTurnRequest {
    pub text: String,
    /// Id from the `awaiting_human_input` event being answered
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuestionRequest {
    pub question: String,
    /// `pro`, `con` or `moderator`; defaults to the moderator.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub target: Option<SpeakerRole>,
}

fn dispatch(state: &AppState, id: Uuid, intervention: Intervention) -> Result<Accepted, AppError> {
    let pending = state.interventions().handle(id, intervention)?;
    Ok((StatusCode::ACCEPTED, Json(pending)))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/pause",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 202, description = "Pause queued", body = PendingIntervention),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not live")
    ),
    tag = "control"
)]
pub async fn pause_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Accepted, AppError> {
    dispatch(&state, id, Intervention::Pause)
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/resume",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 202, description = "Resume queued", body = PendingIntervention),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not paused")
    ),
    tag = "control"
)]
pub async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Accepted, AppError> {
    dispatch(&state, id, Intervention::Resume)
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/continue",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 202, description = "Next turn released", body = PendingIntervention),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not awaiting continue")
    ),
    tag = "control"
)]
pub async fn continue_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Accepted, AppError> {
    dispatch(&state, id, Intervention::Continue)
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/stop",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = StopRequest,
    responses(
        (status = 202, description = "Stop requested", body = PendingIntervention),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already finished")
    ),
    tag = "control"
)]
pub async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StopRequest>,
) -> Result<Accepted, AppError> {
    dispatch(&state, id, Intervention::Stop {
        reason: request.reason,
    })
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/human-turn",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = HumanTurnRequest,
    responses(
        (status = 202, description = "Human turn accepted", body = PendingIntervention),
        (status = 400, description = "Empty text"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "No human input pending, or a different request is open")
    ),
    tag = "control"
)]
pub async fn submit_human_turn(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<HumanTurnRequest>,
) -> Result<Accepted, AppError> {
    dispatch(
        &state,
        id,
        Intervention::HumanTurn {
            text: request.text,
            request_id: request.request_id,
        },
    )
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/questions",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = QuestionRequest,
    responses(
        (status = 202, description = "Question queued", body = PendingIntervention),
        (status = 400, description = "Empty question or invalid target"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Interruptions disabled or session finished")
    ),
    tag = "control"
)]
pub async fn ask_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QuestionRequest>,
) -> Result<Accepted, AppError> {
    dispatch(&state, id, Intervention::AdHocQuestion {
        question: request.question,
        target: request.target,
    })
}
