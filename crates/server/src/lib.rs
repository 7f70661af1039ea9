pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Debate Studio API",
        version = "0.1.0",
        description = "API for Debate Studio - structured multi-party debates between AI advocates and humans"
    ),
    paths(
        routes::health_check,
        routes::create_session,
        routes::list_sessions,
        routes::get_session,
        routes::list_utterances,
        routes::pause_session,
        routes::resume_session,
        routes::continue_session,
        routes::stop_session,
        routes::submit_human_turn,
        routes::ask_question,
        routes::sse::events_stream,
        routes::sse::session_events_stream,
        routes::sse::list_subscribers,
        routes::sse::unsubscribe,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::StopRequest,
        routes::HumanTurnRequest,
        routes::QuestionRequest,
        orchestrator::Intervention,
        orchestrator::SubscriberInfo,
        debate_core::Session,
        debate_core::SessionStatus,
        debate_core::SessionConfig,
        debate_core::DebateSettings,
        debate_core::HumanSeat,
        debate_core::QualityPolicy,
        debate_core::TimeoutFallback,
        debate_core::InterruptionPolicy,
        debate_core::Brevity,
        debate_core::SessionOption,
        debate_core::DebatePhase,
        debate_core::PhaseCursor,
        debate_core::Side,
        debate_core::TurnKind,
        debate_core::EvidenceFocus,
        debate_core::Utterance,
        debate_core::UtteranceMetadata,
        debate_core::QualityWarning,
        debate_core::Severity,
        debate_core::EvidenceClass,
        debate_core::PendingIntervention,
        debate_core::InterventionKind,
        debate_core::HumanInputRequest,
        events::EventEnvelope,
        events::Event,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Debate session lifecycle and transcripts"),
        (name = "control", description = "Pause, resume, step, stop and participant input"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route(
            "/api/sessions",
            get(routes::list_sessions).post(routes::create_session),
        )
        .route("/api/sessions/{id}", get(routes::get_session))
        .route("/api/sessions/{id}/utterances", get(routes::list_utterances))
        .route("/api/sessions/{id}/pause", post(routes::pause_session))
        .route("/api/sessions/{id}/resume", post(routes::resume_session))
        .route("/api/sessions/{id}/continue", post(routes::continue_session))
        .route("/api/sessions/{id}/stop", post(routes::stop_session))
        .route(
            "/api/sessions/{id}/human-turn",
            post(routes::submit_human_turn),
        )
        .route("/api/sessions/{id}/questions", post(routes::ask_question))
        .route(
            "/api/sessions/{id}/events",
            get(routes::sse::session_events_stream),
        )
        .route(
            "/api/sessions/{id}/subscribers",
            get(routes::sse::list_subscribers),
        )
        .route(
            "/api/sessions/{id}/subscribers/{subscriber_id}",
            delete(routes::sse::unsubscribe),
        )
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
