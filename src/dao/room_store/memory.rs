//! In-memory [`RoomStore`] backend.
//!
//! Used as the development fallback when no database is configured and as the
//! backend for the integration test suite. The conditional inserts rely on
//! the DashMap entry API: the shard write lock is held across the
//! vacant/occupied decision, which serializes racing inserts per key.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{MatchEntity, MembershipEntity, RoomEntity, RoomStatus, VoteEntity},
    room_store::{MatchInsert, RoomInsert, RoomStore, VoteInsert},
    storage::StorageResult,
};

/// Process-lifetime room store backed by sharded hash maps.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rooms: DashMap<Uuid, RoomEntity>,
    /// Join-code reservations for live rooms; freed on room deletion.
    codes: DashMap<String, Uuid>,
    members: DashMap<(Uuid, String), MembershipEntity>,
    votes: DashMap<(Uuid, String, u64), VoteEntity>,
    matches: DashMap<(Uuid, u64), MatchEntity>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_room_sync(&self, room: RoomEntity) -> RoomInsert {
        // Reserve the code first; the reservation is the uniqueness guard.
        match self.inner.codes.entry(room.code.clone()) {
            Entry::Occupied(_) => RoomInsert::CodeTaken,
            Entry::Vacant(slot) => {
                slot.insert(room.id);
                self.inner.rooms.insert(room.id, room);
                RoomInsert::Created
            }
        }
    }

    fn cancel_room_sync(&self, id: Uuid) -> Option<RoomEntity> {
        let room = {
            let mut entry = self.inner.rooms.get_mut(&id)?;
            entry.status = RoomStatus::Cancelled;
            entry.clone()
        };
        // Free the code for reuse; by-code lookups go through the
        // reservation map, so the tombstone becomes unreachable by code.
        self.inner.codes.remove(&room.code);
        self.inner.members.retain(|(room_id, _), _| *room_id != id);
        self.inner.votes.retain(|(room_id, _, _), _| *room_id != id);
        self.inner.matches.retain(|(room_id, _), _| *room_id != id);
        Some(room)
    }
}

impl RoomStore for MemoryRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<RoomInsert>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert_room_sync(room)) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.rooms.get(&id).map(|room| room.clone())) })
    }

    fn find_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(id) = store.inner.codes.get(&code).map(|entry| *entry.value()) else {
                return Ok(None);
            };
            Ok(store.inner.rooms.get(&id).map(|room| room.clone()))
        })
    }

    fn update_room_status(
        &self,
        id: Uuid,
        from: RoomStatus,
        to: RoomStatus,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.inner.rooms.get_mut(&id).and_then(|mut room| {
                (room.status == from).then(|| {
                    room.status = to;
                    room.clone()
                })
            }))
        })
    }

    fn cancel_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.cancel_room_sync(id)) })
    }

    fn add_member(&self, member: MembershipEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (member.room_id, member.participant_id.clone());
            match store.inner.members.entry(key) {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(slot) => {
                    slot.insert(member);
                    Ok(true)
                }
            }
        })
    }

    fn remove_member(
        &self,
        room_id: Uuid,
        participant_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .members
                .remove(&(room_id, participant_id))
                .is_some())
        })
    }

    fn is_member(
        &self,
        room_id: Uuid,
        participant_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .members
                .contains_key(&(room_id, participant_id)))
        })
    }

    fn list_members(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut members: Vec<MembershipEntity> = store
                .inner
                .members
                .iter()
                .filter(|entry| entry.key().0 == room_id)
                .map(|entry| entry.value().clone())
                .collect();
            members.sort_by(|a, b| {
                a.joined_at
                    .cmp(&b.joined_at)
                    .then_with(|| a.participant_id.cmp(&b.participant_id))
            });
            Ok(members)
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteInsert>> {
        let store = self.clone();
        Box::pin(async move {
            // Hold the room entry across the insert: a concurrent
            // cancellation blocks on the same shard, so it cannot purge the
            // ledger between this status check and the write.
            let Some(room) = store.inner.rooms.get(&vote.room_id) else {
                return Ok(VoteInsert::RoomClosed);
            };
            if room.status == RoomStatus::Cancelled {
                return Ok(VoteInsert::RoomClosed);
            }

            let key = (vote.room_id, vote.participant_id.clone(), vote.item_id);
            match store.inner.votes.entry(key) {
                Entry::Occupied(existing) => Ok(VoteInsert::Duplicate(existing.get().clone())),
                Entry::Vacant(slot) => {
                    slot.insert(vote);
                    Ok(VoteInsert::Created)
                }
            }
        })
    }

    fn list_votes(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut votes: Vec<VoteEntity> = store
                .inner
                .votes
                .iter()
                .filter(|entry| entry.key().0 == room_id)
                .map(|entry| entry.value().clone())
                .collect();
            votes.sort_by(|a, b| {
                a.cast_at
                    .cmp(&b.cast_at)
                    .then_with(|| a.participant_id.cmp(&b.participant_id))
            });
            Ok(votes)
        })
    }

    fn yes_voters(
        &self,
        room_id: Uuid,
        item_id: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut voters: Vec<(std::time::SystemTime, String)> = store
                .inner
                .votes
                .iter()
                .filter(|entry| {
                    let (vote_room, _, vote_item) = entry.key();
                    *vote_room == room_id
                        && *vote_item == item_id
                        && entry.value().decision == crate::dao::models::VoteDecision::Yes
                })
                .map(|entry| (entry.value().cast_at, entry.value().participant_id.clone()))
                .collect();
            voters.sort();
            Ok(voters.into_iter().map(|(_, participant)| participant).collect())
        })
    }

    fn insert_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<MatchInsert>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(room) = store.inner.rooms.get(&record.room_id) else {
                return Ok(MatchInsert::RoomClosed);
            };
            if room.status == RoomStatus::Cancelled {
                return Ok(MatchInsert::RoomClosed);
            }

            match store.inner.matches.entry((record.room_id, record.item_id)) {
                Entry::Occupied(existing) => Ok(MatchInsert::AlreadyExists(existing.get().clone())),
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    Ok(MatchInsert::Created)
                }
            }
        })
    }

    fn list_matches(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut matches: Vec<MatchEntity> = store
                .inner
                .matches
                .iter()
                .filter(|entry| entry.key().0 == room_id)
                .map(|entry| entry.value().clone())
                .collect();
            matches.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.item_id.cmp(&b.item_id))
            });
            Ok(matches)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::{RoomConfigEntity, VoteDecision};

    fn room(code: &str) -> RoomEntity {
        RoomEntity {
            id: Uuid::new_v4(),
            code: code.to_string(),
            host_id: "host".into(),
            config: RoomConfigEntity::default(),
            status: RoomStatus::Waiting,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn join_code_reservation_is_exclusive_until_cancellation() {
        let store = MemoryRoomStore::new();
        let first = room("AB12CD");
        let second = room("AB12CD");

        assert_eq!(
            store.insert_room(first.clone()).await.unwrap(),
            RoomInsert::Created
        );
        assert_eq!(
            store.insert_room(second.clone()).await.unwrap(),
            RoomInsert::CodeTaken
        );

        let tombstone = store.cancel_room(first.id).await.unwrap().unwrap();
        assert_eq!(tombstone.status, RoomStatus::Cancelled);
        // The tombstone is unreachable by code and the code is free again.
        assert!(
            store
                .find_room_by_code("AB12CD".into())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            store.insert_room(second).await.unwrap(),
            RoomInsert::Created
        );
    }

    #[tokio::test]
    async fn status_writes_are_compare_and_set() {
        let store = MemoryRoomStore::new();
        let entity = room("QQ11ZZ");
        store.insert_room(entity.clone()).await.unwrap();
        store.cancel_room(entity.id).await.unwrap();

        // A start that read the room before cancellation would issue exactly
        // this write; it must not apply.
        let stale = store
            .update_room_status(entity.id, RoomStatus::Waiting, RoomStatus::Active)
            .await
            .unwrap();
        assert!(stale.is_none());
        assert_eq!(
            store.find_room(entity.id).await.unwrap().unwrap().status,
            RoomStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn cancelled_rooms_refuse_child_inserts() {
        let store = MemoryRoomStore::new();
        let entity = room("XY34AB");
        store.insert_room(entity.clone()).await.unwrap();
        store.cancel_room(entity.id).await.unwrap();

        let vote = VoteEntity {
            room_id: entity.id,
            participant_id: "p1".into(),
            item_id: 4,
            decision: VoteDecision::Yes,
            cast_at: SystemTime::now(),
        };
        assert_eq!(
            store.insert_vote(vote).await.unwrap(),
            VoteInsert::RoomClosed
        );

        let record = MatchEntity {
            room_id: entity.id,
            item_id: 4,
            participant_ids: vec!["p1".into(), "p2".into()],
            created_at: SystemTime::now(),
        };
        assert_eq!(
            store.insert_match(record).await.unwrap(),
            MatchInsert::RoomClosed
        );

        assert!(store.list_votes(entity.id).await.unwrap().is_empty());
        assert!(store.list_matches(entity.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_vote_returns_stored_row() {
        let store = MemoryRoomStore::new();
        let entity = room("DV56EF");
        store.insert_room(entity.clone()).await.unwrap();
        let room_id = entity.id;
        let vote = VoteEntity {
            room_id,
            participant_id: "p1".into(),
            item_id: 9,
            decision: VoteDecision::Yes,
            cast_at: SystemTime::now(),
        };

        assert_eq!(
            store.insert_vote(vote.clone()).await.unwrap(),
            VoteInsert::Created
        );

        let retry = VoteEntity {
            decision: VoteDecision::No,
            ..vote.clone()
        };
        match store.insert_vote(retry).await.unwrap() {
            VoteInsert::Duplicate(stored) => assert_eq!(stored.decision, VoteDecision::Yes),
            other => panic!("expected duplicate, got {other:?}"),
        }

        assert_eq!(store.list_votes(room_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_match_insert_loses() {
        let store = MemoryRoomStore::new();
        let entity = room("SM78GH");
        store.insert_room(entity.clone()).await.unwrap();
        let record = MatchEntity {
            room_id: entity.id,
            item_id: 7,
            participant_ids: vec!["p1".into(), "p2".into()],
            created_at: SystemTime::now(),
        };

        assert_eq!(
            store.insert_match(record.clone()).await.unwrap(),
            MatchInsert::Created
        );
        match store.insert_match(record.clone()).await.unwrap() {
            MatchInsert::AlreadyExists(stored) => {
                assert_eq!(stored.participant_ids, record.participant_ids)
            }
            other => panic!("expected existing match, got {other:?}"),
        }
    }
}
