use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        room::{
            CreateRoomRequest, HostActionRequest, JoinRoomRequest, LeaveRoomRequest, RoomSummary,
        },
        vote::{CastVoteRequest, MatchSummary, VoteOutcome, VoteSummary},
    },
    error::AppError,
    services::{room_service, vote_service},
    state::SharedState,
};

/// Routes handling room lifecycle, membership, and the vote ledger.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/join", post(join_room))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/start", post(start_room))
        .route("/rooms/{id}/cancel", post(cancel_room))
        .route("/rooms/{id}/leave", post(leave_room))
        .route("/rooms/{id}/votes", post(cast_vote).get(list_votes))
        .route("/rooms/{id}/matches", get(list_matches))
}

/// Create a fresh room and auto-join the host.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomSummary),
        (status = 503, description = "Storage unavailable or code space exhausted")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = room_service::create_room(&state, payload).await?;
    Ok(Json(summary))
}

/// Join a room by its shareable code; idempotent per participant.
#[utoipa::path(
    post,
    path = "/rooms/join",
    tag = "rooms",
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined (or already a member)", body = RoomSummary),
        (status = 404, description = "Unknown join code"),
        (status = 409, description = "Room no longer accepts joins")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = room_service::join_room(&state, payload).await?;
    Ok(Json(summary))
}

/// Fetch the current room snapshot.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomSummary),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = room_service::get_room(&state, id).await?;
    Ok(Json(summary))
}

/// Host-only: start the session.
#[utoipa::path(
    post,
    path = "/rooms/{id}/start",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Session active", body = RoomSummary),
        (status = 403, description = "Requestor is not the host"),
        (status = 409, description = "Invalid lifecycle transition")
    )
)]
pub async fn start_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<HostActionRequest>>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = room_service::start_room(&state, id, &payload.requestor_id).await?;
    Ok(Json(summary))
}

/// Host-only: cancel the room, terminally.
#[utoipa::path(
    post,
    path = "/rooms/{id}/cancel",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Room cancelled"),
        (status = 403, description = "Requestor is not the host"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn cancel_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<HostActionRequest>>,
) -> Result<(), AppError> {
    room_service::cancel_room(&state, id, &payload.requestor_id).await?;
    Ok(())
}

/// Remove the participant's membership from the room.
#[utoipa::path(
    post,
    path = "/rooms/{id}/leave",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = LeaveRoomRequest,
    responses(
        (status = 200, description = "Membership removed", body = RoomSummary),
        (status = 403, description = "The host cannot leave their own room")
    )
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<LeaveRoomRequest>>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = room_service::leave_room(&state, id, &payload.participant_id).await?;
    Ok(Json(summary))
}

/// Cast a vote on a catalog item and evaluate it for a match.
#[utoipa::path(
    post,
    path = "/rooms/{id}/votes",
    tag = "votes",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Vote recorded (or already present)", body = VoteOutcome),
        (status = 403, description = "Non-member voting in a closed room"),
        (status = 409, description = "Room no longer accepts votes")
    )
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CastVoteRequest>>,
) -> Result<Json<VoteOutcome>, AppError> {
    let outcome = vote_service::cast_vote(&state, id, payload).await?;
    Ok(Json(outcome))
}

/// Full vote ledger of the room, in cast order.
#[utoipa::path(
    get,
    path = "/rooms/{id}/votes",
    tag = "votes",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Votes in cast order", body = [VoteSummary]),
        (status = 404, description = "Room not found")
    )
)]
pub async fn list_votes(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<VoteSummary>>, AppError> {
    let votes = vote_service::list_votes(&state, id).await?;
    Ok(Json(votes))
}

/// All matches detected in the room, in creation order.
#[utoipa::path(
    get,
    path = "/rooms/{id}/matches",
    tag = "votes",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Matches in creation order", body = [MatchSummary]),
        (status = 404, description = "Room not found")
    )
)]
pub async fn list_matches(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MatchSummary>>, AppError> {
    let matches = vote_service::list_matches(&state, id).await?;
    Ok(Json(matches))
}
