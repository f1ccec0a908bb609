use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    MatchEntity, MembershipEntity, RoomConfigEntity, RoomEntity, RoomStatus, VoteDecision,
    VoteEntity,
};

/// Item ids are stored signed; ids past `i64::MAX` are refused rather than
/// wrapped, since a wrapped id would alias another item's vote and match keys.
pub fn item_id_to_bson(item_id: u64) -> MongoResult<i64> {
    i64::try_from(item_id).map_err(|_| MongoDaoError::ItemIdOutOfRange { item_id })
}

fn item_id_from_bson(raw: i64) -> MongoResult<u64> {
    u64::try_from(raw).map_err(|_| MongoDaoError::CorruptItemId { raw })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    code: String,
    host_id: String,
    open_join: bool,
    filters: serde_json::Map<String, serde_json::Value>,
    status: RoomStatus,
    created_at: DateTime,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            code: value.code,
            host_id: value.host_id,
            open_join: value.config.open_join,
            filters: value.config.filters,
            status: value.status,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            id: value.id,
            code: value.code,
            host_id: value.host_id,
            config: RoomConfigEntity {
                open_join: value.open_join,
                filters: value.filters,
            },
            status: value.status,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMemberDocument {
    pub room_id: Uuid,
    pub participant_id: String,
    joined_at: DateTime,
}

impl From<MembershipEntity> for MongoMemberDocument {
    fn from(value: MembershipEntity) -> Self {
        Self {
            room_id: value.room_id,
            participant_id: value.participant_id,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl From<MongoMemberDocument> for MembershipEntity {
    fn from(value: MongoMemberDocument) -> Self {
        Self {
            room_id: value.room_id,
            participant_id: value.participant_id,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    pub room_id: Uuid,
    pub participant_id: String,
    pub item_id: i64,
    decision: VoteDecision,
    cast_at: DateTime,
}

impl TryFrom<VoteEntity> for MongoVoteDocument {
    type Error = MongoDaoError;

    fn try_from(value: VoteEntity) -> MongoResult<Self> {
        Ok(Self {
            room_id: value.room_id,
            participant_id: value.participant_id,
            item_id: item_id_to_bson(value.item_id)?,
            decision: value.decision,
            cast_at: DateTime::from_system_time(value.cast_at),
        })
    }
}

impl TryFrom<MongoVoteDocument> for VoteEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoVoteDocument) -> MongoResult<Self> {
        Ok(Self {
            room_id: value.room_id,
            participant_id: value.participant_id,
            item_id: item_id_from_bson(value.item_id)?,
            decision: value.decision,
            cast_at: value.cast_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    pub room_id: Uuid,
    pub item_id: i64,
    participant_ids: Vec<String>,
    created_at: DateTime,
}

impl TryFrom<MatchEntity> for MongoMatchDocument {
    type Error = MongoDaoError;

    fn try_from(value: MatchEntity) -> MongoResult<Self> {
        Ok(Self {
            room_id: value.room_id,
            item_id: item_id_to_bson(value.item_id)?,
            participant_ids: value.participant_ids,
            created_at: DateTime::from_system_time(value.created_at),
        })
    }
}

impl TryFrom<MongoMatchDocument> for MatchEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMatchDocument) -> MongoResult<Self> {
        Ok(Self {
            room_id: value.room_id,
            item_id: item_id_from_bson(value.item_id)?,
            participant_ids: value.participant_ids,
            created_at: value.created_at.to_system_time(),
        })
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_item_ids_are_refused() {
        assert_eq!(item_id_to_bson(i64::MAX as u64).unwrap(), i64::MAX);
        assert!(matches!(
            item_id_to_bson(u64::MAX),
            Err(MongoDaoError::ItemIdOutOfRange { .. })
        ));
        assert!(matches!(
            item_id_from_bson(-1),
            Err(MongoDaoError::CorruptItemId { raw: -1 })
        ));
    }
}
