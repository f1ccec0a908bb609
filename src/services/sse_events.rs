use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, VoteEntity},
    dto::{
        format_system_time,
        room::RoomSummary,
        sse::{
            MatchCreatedEvent, PresenceEntry, PresenceJoinEvent, PresenceLeaveEvent,
            PresenceSyncEvent, RoomDeletedEvent, RoomUpdatedEvent, ServerEvent, VoteCastEvent,
        },
    },
    state::SharedState,
};

const EVENT_ROOM_UPDATED: &str = "room.updated";
const EVENT_ROOM_DELETED: &str = "room.deleted";
const EVENT_VOTE_CAST: &str = "vote.cast";
const EVENT_MATCH_CREATED: &str = "match.created";
const EVENT_PRESENCE_JOIN: &str = "presence.join";
const EVENT_PRESENCE_LEAVE: &str = "presence.leave";
const EVENT_PRESENCE_SYNC: &str = "presence.sync";

/// Broadcast a fresh room snapshot after a membership or status change.
pub fn broadcast_room_updated(state: &SharedState, room: RoomSummary) {
    let room_id = room.id;
    let payload = RoomUpdatedEvent { room };
    send_room_event(state, room_id, EVENT_ROOM_UPDATED, &payload);
}

/// Broadcast that the room was cancelled.
pub fn broadcast_room_deleted(state: &SharedState, room_id: Uuid) {
    let payload = RoomDeletedEvent { room_id };
    send_room_event(state, room_id, EVENT_ROOM_DELETED, &payload);
}

/// Broadcast a newly appended vote. Duplicate casts never reach this point.
pub fn broadcast_vote_cast(state: &SharedState, vote: &VoteEntity) {
    let payload = VoteCastEvent {
        participant_id: vote.participant_id.clone(),
        item_id: vote.item_id,
        decision: vote.decision,
        cast_at: format_system_time(vote.cast_at),
    };
    send_room_event(state, vote.room_id, EVENT_VOTE_CAST, &payload);
}

/// Broadcast the unique match row for (room, item). Sent by the single caller
/// whose conditional insert won.
pub fn broadcast_match_created(state: &SharedState, record: MatchEntity) {
    let room_id = record.room_id;
    let payload = MatchCreatedEvent {
        record: record.into(),
    };
    send_room_event(state, room_id, EVENT_MATCH_CREATED, &payload);
}

/// Broadcast that a participant's stream connected.
pub fn broadcast_presence_join(state: &SharedState, room_id: Uuid, participant_id: &str) {
    let payload = PresenceJoinEvent {
        participant_id: participant_id.to_string(),
    };
    send_room_event(state, room_id, EVENT_PRESENCE_JOIN, &payload);
}

/// Broadcast that a participant's stream disconnected.
pub fn broadcast_presence_leave(state: &SharedState, room_id: Uuid, participant_id: &str) {
    let payload = PresenceLeaveEvent {
        participant_id: participant_id.to_string(),
    };
    send_room_event(state, room_id, EVENT_PRESENCE_LEAVE, &payload);
}

/// Broadcast the full presence snapshot for the room.
pub fn broadcast_presence_sync(state: &SharedState, room_id: Uuid) {
    let participants = state
        .channels()
        .participants(room_id)
        .into_iter()
        .map(|(participant_id, online_at)| PresenceEntry {
            participant_id,
            online_at: format_system_time(online_at),
        })
        .collect();
    let payload = PresenceSyncEvent { participants };
    send_room_event(state, room_id, EVENT_PRESENCE_SYNC, &payload);
}

fn send_room_event(state: &SharedState, room_id: Uuid, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.channels().broadcast(room_id, event),
        Err(err) => warn!(event, %room_id, error = %err, "failed to serialize SSE payload"),
    }
}
