use crate::{
    AppState,
    research::StreamEvent,
    types::{AppError, ChatRequest, ChatResponse, Result},
};
use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, stream};
use std::convert::Infallible;

/// Marker sent after the last event of a run.
pub const DONE_MARKER: &str = "[DONE]";

/// Run the selected pipeline and stream its events
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    validate(&payload)?;

    let (kind, events) = state.orchestrator.stream(
        &payload.message,
        &payload.session_id,
        payload.agent_type.as_deref(),
    );
    tracing::debug!(pipeline = %kind, session_id = %payload.session_id, "Streaming run");

    // Dropping the response body drops `events`, which aborts the run
    let body = events
        .map(|event| Ok::<_, Infallible>(sse_event(&event)))
        .chain(stream::once(async {
            Ok::<_, Infallible>(Event::default().data(DONE_MARKER))
        }));

    Ok(Sse::new(body).keep_alive(KeepAlive::default()))
}

/// Run the selected pipeline to completion and return the assembled reply
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    validate(&payload)?;
    let response = state.orchestrator.respond(&payload).await?;
    Ok(Json(response))
}

fn validate(payload: &ChatRequest) -> Result<()> {
    if payload.message.trim().is_empty() {
        return Err(AppError::InvalidInput("message must not be empty".to_string()));
    }
    if payload.session_id.trim().is_empty() {
        return Err(AppError::InvalidInput("sessionId must not be empty".to_string()));
    }
    Ok(())
}

fn sse_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(err) => {
            tracing::error!(error = %err, sequence = event.sequence, "Failed to encode event");
            Event::default().comment("encoding error")
        }
    }
}
