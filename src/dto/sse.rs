//! Event payloads carried on the per-room SSE channels.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::VoteDecision,
    dto::{room::RoomSummary, vote::MatchSummary},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across per-room SSE channels.
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized data field.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to a subscriber when its stream opens.
pub struct Handshake {
    /// Room the stream is attached to.
    pub room_id: Uuid,
    /// Participant this stream belongs to.
    pub participant_id: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the room record changes (status, membership).
pub struct RoomUpdatedEvent {
    /// Fresh room snapshot.
    pub room: RoomSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once when the room is cancelled.
pub struct RoomDeletedEvent {
    /// Cancelled room id.
    pub room_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever a vote is newly appended to the ledger. Re-applying is
/// idempotent: consumers key on (participant, item).
pub struct VoteCastEvent {
    /// Voter.
    pub participant_id: String,
    /// Voted item.
    pub item_id: u64,
    /// The decision.
    pub decision: VoteDecision,
    /// RFC3339 cast timestamp.
    pub cast_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast exactly once per (room, item) when the match row is created.
pub struct MatchCreatedEvent {
    /// The new match.
    #[serde(flatten)]
    pub record: MatchSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when a participant's stream connects.
pub struct PresenceJoinEvent {
    /// Newly present participant.
    pub participant_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when a participant's stream disconnects.
pub struct PresenceLeaveEvent {
    /// No-longer-present participant.
    pub participant_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Full presence snapshot, emitted after every join so late subscribers can
/// rebuild their view without replaying individual joins.
pub struct PresenceSyncEvent {
    /// Currently connected participants, ordered by connection time.
    pub participants: Vec<PresenceEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
/// One presence entry.
pub struct PresenceEntry {
    /// Connected participant.
    pub participant_id: String,
    /// RFC3339 timestamp of the connection.
    pub online_at: String,
}
