//! Event ingest endpoint, standing in for the queue transport.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::IngestError;
use crate::event::InboundEvent;

/// Shared state for the ingest route: the sending half of the worker queue.
#[derive(Clone)]
pub struct IngestState {
    pub queue: mpsc::Sender<InboundEvent>,
}

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
}

/// POST /events: enqueues the body as payload and every header as metadata.
///
/// Never waits for the queue; a full queue is reported as 503 so the caller
/// can retry.
#[tracing::instrument(skip_all, fields(bytes = body.len()))]
pub async fn ingest(
    State(state): State<IngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), IngestError> {
    let event = headers
        .iter()
        .fold(InboundEvent::new(body.to_vec()), |event, (name, value)| {
            event.with_header(name.as_str(), value.as_bytes())
        });

    state.queue.try_send(event).map_err(|e| match e {
        TrySendError::Full(_) => IngestError::QueueFull,
        TrySendError::Closed(_) => IngestError::QueueClosed,
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse { status: "accepted" }),
    ))
}
