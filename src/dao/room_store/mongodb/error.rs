use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Errors raised by the MongoDB room store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("invalid MongoDB URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        #[source]
        source: mongodb::error::Error,
    },
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("health ping failed")]
    HealthPing {
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to save room `{id}`")]
    SaveRoom {
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to load room `{id}`")]
    LoadRoom {
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to look up room by code `{code}`")]
    LoadRoomByCode {
        code: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to cancel room `{id}`")]
    CancelRoom {
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to write membership for room `{room_id}`")]
    WriteMembership {
        room_id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to list members of room `{room_id}`")]
    ListMembers {
        room_id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("item id `{item_id}` exceeds the storable range")]
    ItemIdOutOfRange { item_id: u64 },
    #[error("stored item id `{raw}` is negative")]
    CorruptItemId { raw: i64 },
    #[error("failed to write vote for room `{room_id}`")]
    WriteVote {
        room_id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to list votes of room `{room_id}`")]
    ListVotes {
        room_id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to write match for room `{room_id}`")]
    WriteMatch {
        room_id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to list matches of room `{room_id}`")]
    ListMatches {
        room_id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
}
