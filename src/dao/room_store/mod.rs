//! The [`RoomStore`] abstraction and its backends.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{MatchEntity, MembershipEntity, RoomEntity, RoomStatus, VoteEntity};
use crate::dao::storage::StorageResult;

/// Outcome of a room insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomInsert {
    /// The room was created with a fresh join code.
    Created,
    /// Another live room already owns the join code; caller should retry
    /// with a new code.
    CodeTaken,
}

/// Outcome of a conditional vote insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteInsert {
    /// The vote was newly appended.
    Created,
    /// A vote already existed for this (room, participant, item); the stored
    /// row is returned untouched.
    Duplicate(VoteEntity),
    /// The parent room is cancelled or gone; nothing was written.
    RoomClosed,
}

/// Outcome of the conditional match insert, the serialization point for the
/// whole subsystem: backends must guarantee that of all concurrent insert
/// attempts for the same (room, item), exactly one observes `Created`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchInsert {
    /// This caller created the match row.
    Created,
    /// A match row already existed; the stored row is returned untouched.
    AlreadyExists(MatchEntity),
    /// The parent room is cancelled or gone; nothing was written.
    RoomClosed,
}

/// Abstraction over the persistence layer for rooms, membership, votes, and
/// matches. The two uniqueness constraints — (room, participant, item) on
/// votes and (room, item) on matches — are the load-bearing invariants every
/// backend must enforce at insert time.
pub trait RoomStore: Send + Sync {
    /// Insert a fresh room, failing softly when the join code is taken.
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<RoomInsert>>;
    /// Look a room up by id.
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Look a room up by its uppercase join code.
    fn find_room_by_code(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Compare-and-set the room's lifecycle status: the write applies only
    /// while the stored status still equals `from`. Returns the updated room,
    /// or `None` when the room is gone or its status moved on, so a stale
    /// transition can never overwrite a newer one.
    fn update_room_status(
        &self,
        id: Uuid,
        from: RoomStatus,
        to: RoomStatus,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Tombstone a room: mark it cancelled, free its join code for reuse,
    /// and delete its members, votes, and matches. Returns the tombstoned
    /// room, or `None` when no such room exists.
    fn cancel_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Add a membership row; returns `false` when it already existed.
    fn add_member(&self, member: MembershipEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Remove a membership row; returns `false` when there was none.
    fn remove_member(
        &self,
        room_id: Uuid,
        participant_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Whether the participant holds a membership row in the room.
    fn is_member(
        &self,
        room_id: Uuid,
        participant_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// All members of a room, ordered by join time.
    fn list_members(&self, room_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>>;

    /// Conditionally append a vote, returning the stored row on duplicates.
    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteInsert>>;
    /// All votes of a room, ordered by cast time, for client reconciliation.
    fn list_votes(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;
    /// Distinct participants with a yes-vote on (room, item).
    fn yes_voters(
        &self,
        room_id: Uuid,
        item_id: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>>;

    /// Conditionally create the match row for (room, item); see [`MatchInsert`].
    fn insert_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<MatchInsert>>;
    /// All matches of a room, ordered by creation time.
    fn list_matches(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;

    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
