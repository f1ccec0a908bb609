use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

/// Query parameters of the room event stream.
#[derive(Debug, Deserialize, IntoParams)]
pub struct EventStreamParams {
    /// Participant the stream belongs to; tracked in the presence set.
    pub participant_id: String,
}

#[utoipa::path(
    get,
    path = "/rooms/{id}/events",
    tag = "events",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        EventStreamParams
    ),
    responses(
        (status = 200, description = "Room SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Room not found")
    )
)]
/// Stream realtime room events (votes, matches, presence) to one participant.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<EventStreamParams>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let receiver = sse_service::subscribe_room(&state, id, &params.participant_id).await?;
    info!(room_id = %id, participant = %params.participant_id, "new room SSE connection");
    Ok(sse_service::to_sse_stream(state, id, params.participant_id, receiver).await)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{id}/events", get(room_stream))
}
