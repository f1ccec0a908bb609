//! Room lifecycle and membership payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{MembershipEntity, RoomEntity, RoomStatus},
    dto::{
        format_system_time,
        validation::{validate_join_code, validate_participant_id},
    },
};

/// Payload used to create a brand-new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Participant id of the host creating the room.
    #[validate(custom(function = validate_participant_id))]
    pub host_id: String,
    /// Optional room configuration.
    #[serde(default)]
    pub config: RoomConfigInput,
}

/// Host-owned room configuration supplied at creation.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RoomConfigInput {
    /// Whether non-members may vote. Defaults to the server-wide setting.
    #[serde(default)]
    pub open_join: Option<bool>,
    /// Opaque catalog filter set (genre, year, minimum rating, ...).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filters: serde_json::Map<String, serde_json::Value>,
}

/// Payload used to join an existing room by code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    /// The join code, case-insensitive.
    #[validate(custom(function = validate_join_code))]
    pub code: String,
    /// Joining participant.
    #[validate(custom(function = validate_participant_id))]
    pub participant_id: String,
}

/// Payload for host-only lifecycle operations (start, cancel).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct HostActionRequest {
    /// Participant claiming to be the host.
    #[validate(custom(function = validate_participant_id))]
    pub requestor_id: String,
}

/// Payload for leaving a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LeaveRoomRequest {
    /// Leaving participant.
    #[validate(custom(function = validate_participant_id))]
    pub participant_id: String,
}

/// Public projection of a room returned by REST calls and carried in
/// `room.updated` events.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RoomSummary {
    /// Room identifier.
    pub id: Uuid,
    /// Shareable join code (always uppercase).
    pub code: String,
    /// Host participant id.
    pub host_id: String,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Whether non-members may vote.
    pub open_join: bool,
    /// Opaque catalog filter set.
    #[schema(value_type = Object)]
    pub filters: serde_json::Map<String, serde_json::Value>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// Current members, ordered by join time.
    pub members: Vec<MemberSummary>,
}

/// Public projection of a membership row.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct MemberSummary {
    /// Member participant id.
    pub participant_id: String,
    /// RFC3339 join timestamp.
    pub joined_at: String,
}

impl From<MembershipEntity> for MemberSummary {
    fn from(value: MembershipEntity) -> Self {
        Self {
            participant_id: value.participant_id,
            joined_at: format_system_time(value.joined_at),
        }
    }
}

impl From<(RoomEntity, Vec<MembershipEntity>)> for RoomSummary {
    fn from((room, members): (RoomEntity, Vec<MembershipEntity>)) -> Self {
        Self {
            id: room.id,
            code: room.code,
            host_id: room.host_id,
            status: room.status,
            open_join: room.config.open_join,
            filters: room.config.filters,
            created_at: format_system_time(room.created_at),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}
