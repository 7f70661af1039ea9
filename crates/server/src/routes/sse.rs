use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use events::FeedFilter;
use futures::stream::{Stream, StreamExt};
use orchestrator::SubscriberInfo;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
pub const SUBSCRIBER_ID_HEADER: &str = "x-subscriber-id";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Comma-separated session IDs to filter events
    pub session_ids: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionEventsQuery {
    /// Highest utterance sequence already seen; takes precedence over
    /// the `Last-Event-ID` header.
    pub last_seen_seq: Option<u64>,
}

fn last_event_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// SSE ids are utterance sequences, so a browser's `Last-Event-ID` is a
/// valid resume point.
fn envelope_to_sse_event(envelope: &events::EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
    let event = Event::default().event(envelope.event_type()).data(data);

    Ok(match envelope.event.utterance_sequence() {
        Some(sequence) => event.id(sequence.to_string()),
        None => event,
    })
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "SSE stream of every session's events"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = FeedFilter::from_query(query.session_ids.as_deref());
    let rx = state.event_bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(envelope) => filter
                .admits(&envelope)
                .then(|| envelope_to_sse_event(&envelope)),
            Err(e) => {
                tracing::warn!(error = ?e, "Global SSE feed lagged");
                None
            }
        };
        std::future::ready(event)
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        SessionEventsQuery,
        ("Last-Event-ID" = Option<u64>, Header, description = "Last utterance sequence received"),
    ),
    responses(
        (status = 200, description = "Catch-up followed by the live session stream"),
        (status = 404, description = "Session not loaded"),
    ),
    tag = "events"
)]
pub async fn session_events_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SessionEventsQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.registry.get(id)?;
    let last_seen = query.last_seen_seq.or_else(|| last_event_id(&headers));

    let subscription = handle.subscribe(last_seen).await?;
    let subscriber_id = subscription.id();
    tracing::info!(
        session_id = %id,
        subscriber_id = %subscriber_id,
        last_seen = ?last_seen,
        "SSE subscriber connected"
    );

    let stream = subscription
        .into_stream()
        .map(|envelope| envelope_to_sse_event(&envelope));

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    );
    Ok(([(SUBSCRIBER_ID_HEADER, subscriber_id.to_string())], sse))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/subscribers",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Connected subscribers", body = Vec<SubscriberInfo>),
        (status = 404, description = "Session not loaded"),
    ),
    tag = "events"
)]
pub async fn list_subscribers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SubscriberInfo>>, AppError> {
    let handle = state.registry.get(id)?;
    Ok(Json(handle.hub().subscribers()))
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}/subscribers/{subscriber_id}",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("subscriber_id" = Uuid, Path, description = "Subscriber ID"),
    ),
    responses(
        (status = 204, description = "Subscriber removed"),
        (status = 404, description = "Session or subscriber not found"),
    ),
    tag = "events"
)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path((id, subscriber_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let handle = state.registry.get(id)?;

    if handle.hub().unsubscribe(subscriber_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "Subscriber not found: {}",
            subscriber_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debate_core::{DebatePhase, SpeakerRole, TurnKind, Utterance};

    #[test]
    fn test_last_event_id_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(last_event_id(&headers), None);

        headers.insert("Last-Event-ID", "12".parse().unwrap());
        assert_eq!(last_event_id(&headers), Some(12));

        headers.insert("Last-Event-ID", "not-a-number".parse().unwrap());
        assert_eq!(last_event_id(&headers), None);
    }

    #[test]
    fn test_envelope_to_sse_event_does_not_panic() {
        let session_id = Uuid::new_v4();
        let utterance = Utterance::new(
            session_id,
            4,
            SpeakerRole::CON,
            DebatePhase::Constructive,
            TurnKind::Statement,
            "Text",
        );
        let complete = events::EventEnvelope::new(
            session_id,
            events::Event::TurnComplete { utterance },
        );
        let _event = envelope_to_sse_event(&complete).unwrap();

        let heartbeat = events::EventEnvelope::new(session_id, events::Event::Heartbeat);
        let _event = envelope_to_sse_event(&heartbeat).unwrap();
    }
}
