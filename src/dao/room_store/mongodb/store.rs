//! The [`MongoRoomStore`] itself plus the index bootstrap that carries the
//! two load-bearing uniqueness constraints.

use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoMatchDocument, MongoMemberDocument, MongoRoomDocument, MongoVoteDocument, doc_id,
        item_id_to_bson, uuid_as_binary,
    },
};
use crate::dao::{
    models::{MatchEntity, MembershipEntity, RoomEntity, RoomStatus, VoteEntity},
    room_store::{MatchInsert, RoomInsert, RoomStore, VoteInsert},
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const MEMBER_COLLECTION_NAME: &str = "room_members";
const VOTE_COLLECTION_NAME: &str = "room_votes";
const MATCH_COLLECTION_NAME: &str = "room_matches";

/// MongoDB-backed room store. Cheap to clone; all clones share one client.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

/// Write errors carrying the server-side duplicate-key code. Losing one of
/// the conditional inserts surfaces as exactly this error.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(write_error))
            if write_error.code == 11000
    )
}

fn status_str(status: RoomStatus) -> &'static str {
    match status {
        RoomStatus::Waiting => "waiting",
        RoomStatus::Active => "active",
        RoomStatus::Cancelled => "cancelled",
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let unique = |keys: mongodb::bson::Document, name: &str| {
            mongodb::IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(true))
                        .build(),
                )
                .build()
        };

        // Codes are only unique among live rooms; cancelled tombstones do
        // not block reuse.
        let code_index = mongodb::IndexModel::builder()
            .keys(doc! {"code": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_code_idx".to_owned()))
                    .unique(Some(true))
                    .partial_filter_expression(Some(
                        doc! {"status": {"$in": ["waiting", "active"]}},
                    ))
                    .build(),
            )
            .build();
        database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
            .create_index(code_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "code",
                source,
            })?;

        database
            .collection::<MongoMemberDocument>(MEMBER_COLLECTION_NAME)
            .create_index(unique(
                doc! {"room_id": 1, "participant_id": 1},
                "member_room_participant_idx",
            ))
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MEMBER_COLLECTION_NAME,
                index: "room_id,participant_id",
                source,
            })?;

        database
            .collection::<MongoVoteDocument>(VOTE_COLLECTION_NAME)
            .create_index(unique(
                doc! {"room_id": 1, "participant_id": 1, "item_id": 1},
                "vote_room_participant_item_idx",
            ))
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: VOTE_COLLECTION_NAME,
                index: "room_id,participant_id,item_id",
                source,
            })?;

        database
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
            .create_index(unique(
                doc! {"room_id": 1, "item_id": 1},
                "match_room_item_idx",
            ))
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "room_id,item_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        self.database()
            .await
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn members(&self) -> Collection<MongoMemberDocument> {
        self.database()
            .await
            .collection::<MongoMemberDocument>(MEMBER_COLLECTION_NAME)
    }

    async fn votes(&self) -> Collection<MongoVoteDocument> {
        self.database()
            .await
            .collection::<MongoVoteDocument>(VOTE_COLLECTION_NAME)
    }

    async fn matches(&self) -> Collection<MongoMatchDocument> {
        self.database()
            .await
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn insert_room(&self, room: RoomEntity) -> MongoResult<RoomInsert> {
        let id = room.id;
        let document: MongoRoomDocument = room.into();
        match self.rooms().await.insert_one(&document).await {
            Ok(_) => Ok(RoomInsert::Created),
            Err(err) if is_duplicate_key(&err) => Ok(RoomInsert::CodeTaken),
            Err(source) => Err(MongoDaoError::SaveRoom { id, source }),
        }
    }

    async fn find_room(&self, id: Uuid) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_room_by_code(&self, code: String) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(doc! {
                "code": &code,
                "status": {"$in": ["waiting", "active"]},
            })
            .await
            .map_err(|source| MongoDaoError::LoadRoomByCode { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn update_room_status(
        &self,
        id: Uuid,
        from: RoomStatus,
        to: RoomStatus,
    ) -> MongoResult<Option<RoomEntity>> {
        // Filtering on the expected status makes the write a compare-and-set;
        // a transition racing a cancellation matches nothing.
        let mut filter = doc_id(id);
        filter.insert("status", status_str(from));

        let document = self
            .rooms()
            .await
            .find_one_and_update(filter, doc! {"$set": {"status": status_str(to)}})
            .return_document(mongodb::options::ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;
        Ok(document.map(Into::into))
    }

    /// Whether the room row still exists in a status that accepts new child
    /// rows. Used to fence vote and match inserts against cancellation.
    async fn room_accepts_writes(&self, id: Uuid) -> MongoResult<bool> {
        let mut filter = doc_id(id);
        filter.insert("status", doc! {"$in": ["waiting", "active"]});
        let document = self
            .rooms()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;
        Ok(document.is_some())
    }

    async fn cancel_room(&self, id: Uuid) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one_and_update(doc_id(id), doc! {"$set": {"status": "cancelled"}})
            .return_document(mongodb::options::ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::CancelRoom { id, source })?;
        let Some(document) = document else {
            return Ok(None);
        };

        let by_room = doc! {"room_id": uuid_as_binary(id)};
        self.members()
            .await
            .delete_many(by_room.clone())
            .await
            .map_err(|source| MongoDaoError::CancelRoom { id, source })?;
        self.votes()
            .await
            .delete_many(by_room.clone())
            .await
            .map_err(|source| MongoDaoError::CancelRoom { id, source })?;
        self.matches()
            .await
            .delete_many(by_room)
            .await
            .map_err(|source| MongoDaoError::CancelRoom { id, source })?;

        Ok(Some(document.into()))
    }

    async fn add_member(&self, member: MembershipEntity) -> MongoResult<bool> {
        let room_id = member.room_id;
        let document: MongoMemberDocument = member.into();
        match self.members().await.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::WriteMembership { room_id, source }),
        }
    }

    async fn remove_member(&self, room_id: Uuid, participant_id: String) -> MongoResult<bool> {
        let result = self
            .members()
            .await
            .delete_one(doc! {
                "room_id": uuid_as_binary(room_id),
                "participant_id": participant_id,
            })
            .await
            .map_err(|source| MongoDaoError::WriteMembership { room_id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn is_member(&self, room_id: Uuid, participant_id: String) -> MongoResult<bool> {
        let document = self
            .members()
            .await
            .find_one(doc! {
                "room_id": uuid_as_binary(room_id),
                "participant_id": participant_id,
            })
            .await
            .map_err(|source| MongoDaoError::ListMembers { room_id, source })?;
        Ok(document.is_some())
    }

    async fn list_members(&self, room_id: Uuid) -> MongoResult<Vec<MembershipEntity>> {
        let documents: Vec<MongoMemberDocument> = self
            .members()
            .await
            .find(doc! {"room_id": uuid_as_binary(room_id)})
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListMembers { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMembers { room_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_vote(&self, vote: VoteEntity) -> MongoResult<VoteInsert> {
        let room_id = vote.room_id;
        let document = MongoVoteDocument::try_from(vote.clone())?;
        if !self.room_accepts_writes(room_id).await? {
            return Ok(VoteInsert::RoomClosed);
        }

        match self.votes().await.insert_one(&document).await {
            Ok(_) => {
                // A cancellation flips the status before purging children, so
                // re-checking here catches a vote that slipped in after the
                // purge; such a row is withdrawn again.
                if self.room_accepts_writes(room_id).await? {
                    Ok(VoteInsert::Created)
                } else {
                    self.votes()
                        .await
                        .delete_one(doc! {
                            "room_id": uuid_as_binary(room_id),
                            "participant_id": &vote.participant_id,
                            "item_id": document.item_id,
                        })
                        .await
                        .map_err(|source| MongoDaoError::WriteVote { room_id, source })?;
                    Ok(VoteInsert::RoomClosed)
                }
            }
            Err(err) if is_duplicate_key(&err) => {
                let existing = self
                    .votes()
                    .await
                    .find_one(doc! {
                        "room_id": uuid_as_binary(room_id),
                        "participant_id": &vote.participant_id,
                        "item_id": document.item_id,
                    })
                    .await
                    .map_err(|source| MongoDaoError::WriteVote { room_id, source })?;
                // The row can only vanish if the room is cancelled mid-flight;
                // report the attempted vote as the stored one in that case.
                Ok(VoteInsert::Duplicate(
                    existing.map(VoteEntity::try_from).transpose()?.unwrap_or(vote),
                ))
            }
            Err(source) => Err(MongoDaoError::WriteVote { room_id, source }),
        }
    }

    async fn list_votes(&self, room_id: Uuid) -> MongoResult<Vec<VoteEntity>> {
        let documents: Vec<MongoVoteDocument> = self
            .votes()
            .await
            .find(doc! {"room_id": uuid_as_binary(room_id)})
            .sort(doc! {"cast_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListVotes { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListVotes { room_id, source })?;

        documents.into_iter().map(VoteEntity::try_from).collect()
    }

    async fn yes_voters(&self, room_id: Uuid, item_id: u64) -> MongoResult<Vec<String>> {
        let documents: Vec<MongoVoteDocument> = self
            .votes()
            .await
            .find(doc! {
                "room_id": uuid_as_binary(room_id),
                "item_id": item_id_to_bson(item_id)?,
                "decision": "yes",
            })
            .sort(doc! {"cast_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListVotes { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListVotes { room_id, source })?;

        Ok(documents
            .into_iter()
            .map(|document| document.participant_id)
            .collect())
    }

    async fn insert_match(&self, record: MatchEntity) -> MongoResult<MatchInsert> {
        let room_id = record.room_id;
        let document = MongoMatchDocument::try_from(record.clone())?;
        if !self.room_accepts_writes(room_id).await? {
            return Ok(MatchInsert::RoomClosed);
        }

        match self.matches().await.insert_one(&document).await {
            Ok(_) => {
                if self.room_accepts_writes(room_id).await? {
                    Ok(MatchInsert::Created)
                } else {
                    self.matches()
                        .await
                        .delete_one(doc! {
                            "room_id": uuid_as_binary(room_id),
                            "item_id": document.item_id,
                        })
                        .await
                        .map_err(|source| MongoDaoError::WriteMatch { room_id, source })?;
                    Ok(MatchInsert::RoomClosed)
                }
            }
            Err(err) if is_duplicate_key(&err) => {
                let existing = self
                    .matches()
                    .await
                    .find_one(doc! {
                        "room_id": uuid_as_binary(room_id),
                        "item_id": document.item_id,
                    })
                    .await
                    .map_err(|source| MongoDaoError::WriteMatch { room_id, source })?;
                Ok(MatchInsert::AlreadyExists(
                    existing.map(MatchEntity::try_from).transpose()?.unwrap_or(record),
                ))
            }
            Err(source) => Err(MongoDaoError::WriteMatch { room_id, source }),
        }
    }

    async fn list_matches(&self, room_id: Uuid) -> MongoResult<Vec<MatchEntity>> {
        let documents: Vec<MongoMatchDocument> = self
            .matches()
            .await
            .find(doc! {"room_id": uuid_as_binary(room_id)})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListMatches { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { room_id, source })?;

        documents.into_iter().map(MatchEntity::try_from).collect()
    }
}

impl RoomStore for MongoRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<RoomInsert>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await.map_err(Into::into) })
    }

    fn find_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room_by_code(code).await.map_err(Into::into) })
    }

    fn update_room_status(
        &self,
        id: Uuid,
        from: RoomStatus,
        to: RoomStatus,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_room_status(id, from, to)
                .await
                .map_err(Into::into)
        })
    }

    fn cancel_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.cancel_room(id).await.map_err(Into::into) })
    }

    fn add_member(&self, member: MembershipEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.add_member(member).await.map_err(Into::into) })
    }

    fn remove_member(
        &self,
        room_id: Uuid,
        participant_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .remove_member(room_id, participant_id)
                .await
                .map_err(Into::into)
        })
    }

    fn is_member(
        &self,
        room_id: Uuid,
        participant_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .is_member(room_id, participant_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_members(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_members(room_id).await.map_err(Into::into) })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteInsert>> {
        let store = self.clone();
        Box::pin(async move { store.insert_vote(vote).await.map_err(Into::into) })
    }

    fn list_votes(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_votes(room_id).await.map_err(Into::into) })
    }

    fn yes_voters(
        &self,
        room_id: Uuid,
        item_id: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.yes_voters(room_id, item_id).await.map_err(Into::into) })
    }

    fn insert_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<MatchInsert>> {
        let store = self.clone();
        Box::pin(async move { store.insert_match(record).await.map_err(Into::into) })
    }

    fn list_matches(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches(room_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
