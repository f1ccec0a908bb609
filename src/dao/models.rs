//! Entities shared between the service layer and the storage backends.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a room. `Cancelled` is terminal: the room row stays
/// behind as a tombstone, unreachable by join code, with all child rows
/// purged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Room is open and waiting for the host to start the session.
    Waiting,
    /// Session is running; participants are swiping.
    Active,
    /// Room was cancelled by its host.
    Cancelled,
}

/// Host-owned room configuration. The filter set is opaque to this subsystem
/// and only interpreted by the catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RoomConfigEntity {
    /// Whether votes from participants who never joined are accepted.
    pub open_join: bool,
    /// Opaque catalog filter set (genre, year, minimum rating, ...).
    pub filters: serde_json::Map<String, serde_json::Value>,
}

/// Room record persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Short human-shareable join code, stored uppercase.
    pub code: String,
    /// Participant id of the host.
    pub host_id: String,
    /// Host-owned configuration.
    pub config: RoomConfigEntity,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
}

/// Membership row, unique per (room, participant). Durable: it survives
/// disconnects and is only removed by an explicit leave.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipEntity {
    /// Room the participant belongs to.
    pub room_id: Uuid,
    /// Opaque stable participant id.
    pub participant_id: String,
    /// When the participant first joined.
    pub joined_at: SystemTime,
}

/// Swipe decision carried by a vote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteDecision {
    /// The participant liked the item.
    Yes,
    /// The participant passed on the item.
    No,
}

/// Append-only vote row, unique per (room, participant, item).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Room the vote was cast in.
    pub room_id: Uuid,
    /// Voter.
    pub participant_id: String,
    /// Catalog item being voted on.
    pub item_id: u64,
    /// The decision; immutable once written.
    pub decision: VoteDecision,
    /// When the vote was cast.
    pub cast_at: SystemTime,
}

/// Match row, unique per (room, item). Created exactly once by the vote that
/// first brings the distinct yes-voter count to two; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Room the match happened in.
    pub room_id: Uuid,
    /// Matched catalog item.
    pub item_id: u64,
    /// Yes-voters at creation time. Fixed; later yes-votes do not grow it.
    pub participant_ids: Vec<String>,
    /// When the match was detected.
    pub created_at: SystemTime,
}
