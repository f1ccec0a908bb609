//! End-to-end exercises of the room, vote, and fan-out services against the
//! in-memory store.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::time::timeout;

use cinematch_back::{
    config::AppConfig,
    dao::{
        models::{MatchEntity, RoomStatus, VoteDecision, VoteEntity},
        room_store::{MatchInsert, RoomStore, VoteInsert, memory::MemoryRoomStore},
    },
    dto::{
        room::{CreateRoomRequest, JoinRoomRequest, RoomConfigInput},
        sse::ServerEvent,
        vote::CastVoteRequest,
    },
    error::ServiceError,
    services::{room_service, sse_service, vote_service},
    state::{AppState, SharedState},
};

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

async fn state_with_memory_store(config: AppConfig) -> SharedState {
    let state = AppState::new(config);
    let store: Arc<dyn RoomStore> = Arc::new(MemoryRoomStore::default());
    state.set_room_store(store).await;
    state
}

fn create_request(host_id: &str) -> CreateRoomRequest {
    CreateRoomRequest {
        host_id: host_id.to_string(),
        config: RoomConfigInput::default(),
    }
}

fn closed_room_request(host_id: &str) -> CreateRoomRequest {
    CreateRoomRequest {
        host_id: host_id.to_string(),
        config: RoomConfigInput {
            open_join: Some(false),
            filters: serde_json::Map::new(),
        },
    }
}

fn yes_vote(participant_id: &str, item_id: u64) -> CastVoteRequest {
    CastVoteRequest {
        participant_id: participant_id.to_string(),
        item_id,
        decision: VoteDecision::Yes,
    }
}

async fn next_named_event(
    receiver: &mut tokio::sync::broadcast::Receiver<ServerEvent>,
    name: &str,
) -> ServerEvent {
    loop {
        let event = timeout(RECV_TIMEOUT, receiver.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if event.event.as_deref() == Some(name) {
            return event;
        }
    }
}

#[tokio::test]
async fn create_join_and_match_on_second_yes_vote() {
    let state = state_with_memory_store(AppConfig::default()).await;

    let room = room_service::create_room(&state, create_request("host")).await.unwrap();
    assert_eq!(room.members.len(), 1, "host auto-joins");
    assert_eq!(room.code.to_ascii_uppercase(), room.code);

    // Codes are case-insensitive on the way in.
    let joined = room_service::join_room(
        &state,
        JoinRoomRequest {
            code: room.code.to_ascii_lowercase(),
            participant_id: "guest".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(joined.id, room.id);
    assert_eq!(joined.members.len(), 2);

    let first = vote_service::cast_vote(&state, room.id, yes_vote("guest", 7)).await.unwrap();
    assert!(!first.matched);
    assert!(first.other_yes_voters.is_empty());

    let second = vote_service::cast_vote(&state, room.id, yes_vote("host", 7)).await.unwrap();
    assert!(second.matched, "second yes vote completes the match");
    assert_eq!(second.other_yes_voters, vec!["guest".to_string()]);

    let matches = vote_service::list_matches(&state, room.id).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].item_id, 7);
    assert_eq!(
        matches[0].participant_ids,
        vec!["guest".to_string(), "host".to_string()]
    );
}

#[tokio::test]
async fn no_votes_never_produce_a_match() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();

    let outcome = vote_service::cast_vote(
        &state,
        room.id,
        CastVoteRequest {
            participant_id: "host".to_string(),
            item_id: 9,
            decision: VoteDecision::No,
        },
    )
    .await
    .unwrap();
    assert!(!outcome.matched);
    assert!(outcome.other_yes_voters.is_empty());

    let outcome = vote_service::cast_vote(&state, room.id, yes_vote("guest", 9)).await.unwrap();
    assert!(!outcome.matched, "a no vote does not count towards a match");
    assert!(vote_service::list_matches(&state, room.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_votes_are_idempotent() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();

    vote_service::cast_vote(&state, room.id, yes_vote("host", 3)).await.unwrap();
    // Retried cast, even with a flipped decision, leaves the stored row alone.
    let retried = vote_service::cast_vote(
        &state,
        room.id,
        CastVoteRequest {
            participant_id: "host".to_string(),
            item_id: 3,
            decision: VoteDecision::No,
        },
    )
    .await
    .unwrap();
    assert!(!retried.matched);

    let votes = vote_service::list_votes(&state, room.id).await.unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].decision, VoteDecision::Yes);
}

#[tokio::test]
async fn join_is_idempotent_per_participant() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();

    for _ in 0..3 {
        room_service::join_room(
            &state,
            JoinRoomRequest {
                code: room.code.clone(),
                participant_id: "guest".to_string(),
            },
        )
        .await
        .unwrap();
    }

    let snapshot = room_service::get_room(&state, room.id).await.unwrap();
    assert_eq!(snapshot.members.len(), 2);
}

#[tokio::test]
async fn only_the_host_may_start_and_retries_are_noops() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();
    room_service::join_room(
        &state,
        JoinRoomRequest {
            code: room.code.clone(),
            participant_id: "guest".to_string(),
        },
    )
    .await
    .unwrap();

    let err = room_service::start_room(&state, room.id, "guest").await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let started = room_service::start_room(&state, room.id, "host").await.unwrap();
    let retried = room_service::start_room(&state, room.id, "host").await.unwrap();
    assert_eq!(started.status, retried.status);
}

#[tokio::test]
async fn cancellation_is_terminal_and_announced() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();
    let mut receiver = sse_service::subscribe_room(&state, room.id, "host").await.unwrap();

    room_service::cancel_room(&state, room.id, "host").await.unwrap();
    next_named_event(&mut receiver, "room.deleted").await;

    let tombstone = room_service::get_room(&state, room.id).await.unwrap();
    assert_eq!(tombstone.status, RoomStatus::Cancelled);
    assert!(tombstone.members.is_empty(), "child rows are purged");

    // The code is no longer resolvable, so late joiners get NotFound.
    let err = room_service::join_room(
        &state,
        JoinRoomRequest {
            code: room.code.clone(),
            participant_id: "late".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = vote_service::cast_vote(&state, room.id, yes_vote("host", 1)).await.unwrap_err();
    assert!(matches!(err, ServiceError::RoomNotJoinable(_)));

    let err = room_service::cancel_room(&state, room.id, "host").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn stale_start_cannot_revive_a_cancelled_room() {
    let state = AppState::new(AppConfig::default());
    let store: Arc<dyn RoomStore> = Arc::new(MemoryRoomStore::default());
    state.set_room_store(store.clone()).await;

    let room = room_service::create_room(&state, create_request("host")).await.unwrap();
    room_service::cancel_room(&state, room.id, "host").await.unwrap();

    // A start request that read the room as waiting before the cancellation
    // completed would issue exactly this store write.
    let stale = store
        .update_room_status(room.id, RoomStatus::Waiting, RoomStatus::Active)
        .await
        .unwrap();
    assert!(stale.is_none(), "stale transition must not apply");

    let tombstone = room_service::get_room(&state, room.id).await.unwrap();
    assert_eq!(tombstone.status, RoomStatus::Cancelled);

    let err = room_service::start_room(&state, room.id, "host").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn votes_landing_after_cancellation_leave_no_trace() {
    let state = AppState::new(AppConfig::default());
    let store: Arc<dyn RoomStore> = Arc::new(MemoryRoomStore::default());
    state.set_room_store(store.clone()).await;

    let room = room_service::create_room(&state, create_request("host")).await.unwrap();
    room_service::join_room(
        &state,
        JoinRoomRequest {
            code: room.code.clone(),
            participant_id: "guest".to_string(),
        },
    )
    .await
    .unwrap();
    room_service::cancel_room(&state, room.id, "host").await.unwrap();

    // The writes a vote in flight during cancellation would issue after its
    // snapshot check passed; the store must refuse them.
    let vote = VoteEntity {
        room_id: room.id,
        participant_id: "guest".to_string(),
        item_id: 3,
        decision: VoteDecision::Yes,
        cast_at: SystemTime::now(),
    };
    assert!(matches!(
        store.insert_vote(vote).await.unwrap(),
        VoteInsert::RoomClosed
    ));

    let record = MatchEntity {
        room_id: room.id,
        item_id: 3,
        participant_ids: vec!["guest".to_string(), "host".to_string()],
        created_at: SystemTime::now(),
    };
    assert!(matches!(
        store.insert_match(record).await.unwrap(),
        MatchInsert::RoomClosed
    ));

    assert!(vote_service::list_votes(&state, room.id).await.unwrap().is_empty());
    assert!(vote_service::list_matches(&state, room.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn closed_rooms_reject_votes_from_non_members() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, closed_room_request("host")).await.unwrap();

    let err = vote_service::cast_vote(&state, room.id, yes_vote("stranger", 5)).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotAMember(_)));

    // Members vote freely.
    room_service::join_room(
        &state,
        JoinRoomRequest {
            code: room.code.clone(),
            participant_id: "guest".to_string(),
        },
    )
    .await
    .unwrap();
    vote_service::cast_vote(&state, room.id, yes_vote("guest", 5)).await.unwrap();
}

#[tokio::test]
async fn hosts_cannot_leave_their_own_room() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();

    let err = room_service::leave_room(&state, room.id, "host").await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    room_service::join_room(
        &state,
        JoinRoomRequest {
            code: room.code.clone(),
            participant_id: "guest".to_string(),
        },
    )
    .await
    .unwrap();
    let after_leave = room_service::leave_room(&state, room.id, "guest").await.unwrap();
    assert_eq!(after_leave.members.len(), 1);
}

#[tokio::test]
async fn concurrent_yes_votes_produce_exactly_one_match() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();

    let voters: Vec<String> = (0..8).map(|i| format!("voter-{i}")).collect();
    for voter in &voters {
        room_service::join_room(
            &state,
            JoinRoomRequest {
                code: room.code.clone(),
                participant_id: voter.clone(),
            },
        )
        .await
        .unwrap();
    }

    let mut handles = Vec::new();
    for voter in voters {
        let state = state.clone();
        let room_id = room.id;
        handles.push(tokio::spawn(async move {
            vote_service::cast_vote(&state, room_id, yes_vote(&voter, 42)).await
        }));
    }

    let mut match_reports = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if outcome.matched {
            match_reports += 1;
        }
    }

    assert_eq!(match_reports, 1, "exactly one vote reports the match");
    let matches = vote_service::list_matches(&state, room.id).await.unwrap();
    assert_eq!(matches.len(), 1);
}

#[tokio::test]
async fn vote_and_match_events_reach_subscribers() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();
    room_service::join_room(
        &state,
        JoinRoomRequest {
            code: room.code.clone(),
            participant_id: "guest".to_string(),
        },
    )
    .await
    .unwrap();

    let mut receiver = sse_service::subscribe_room(&state, room.id, "host").await.unwrap();

    vote_service::cast_vote(&state, room.id, yes_vote("guest", 11)).await.unwrap();
    let vote_event = next_named_event(&mut receiver, "vote.cast").await;
    let payload: serde_json::Value = serde_json::from_str(&vote_event.data).unwrap();
    assert_eq!(payload["participant_id"], "guest");
    assert_eq!(payload["item_id"], 11);

    vote_service::cast_vote(&state, room.id, yes_vote("host", 11)).await.unwrap();
    let match_event = next_named_event(&mut receiver, "match.created").await;
    let payload: serde_json::Value = serde_json::from_str(&match_event.data).unwrap();
    assert_eq!(payload["item_id"], 11);
}

#[tokio::test]
async fn presence_tracks_streams_not_membership() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();

    // A participant who never joined may still watch the stream.
    let mut receiver = sse_service::subscribe_room(&state, room.id, "watcher").await.unwrap();
    let sync = next_named_event(&mut receiver, "presence.sync").await;
    let payload: serde_json::Value = serde_json::from_str(&sync.data).unwrap();
    assert_eq!(payload["participants"][0]["participant_id"], "watcher");

    let snapshot = room_service::get_room(&state, room.id).await.unwrap();
    assert_eq!(snapshot.members.len(), 1, "presence leaves membership untouched");
}

#[tokio::test]
async fn dropping_the_stream_releases_presence() {
    let state = state_with_memory_store(AppConfig::default()).await;
    let room = room_service::create_room(&state, create_request("host")).await.unwrap();

    let mut observer = sse_service::subscribe_room(&state, room.id, "host").await.unwrap();

    let guest_receiver = sse_service::subscribe_room(&state, room.id, "guest").await.unwrap();
    let response =
        sse_service::to_sse_stream(state.clone(), room.id, "guest".to_string(), guest_receiver)
            .await;
    next_named_event(&mut observer, "presence.join").await;

    // Client disconnect: axum drops the response body.
    drop(response);

    let leave = next_named_event(&mut observer, "presence.leave").await;
    let payload: serde_json::Value = serde_json::from_str(&leave.data).unwrap();
    assert_eq!(payload["participant_id"], "guest");

    let sync = next_named_event(&mut observer, "presence.sync").await;
    let payload: serde_json::Value = serde_json::from_str(&sync.data).unwrap();
    let participants = payload["participants"].as_array().unwrap();
    assert!(
        participants.iter().all(|p| p["participant_id"] != "guest"),
        "guest must leave the presence set"
    );
}

#[tokio::test]
async fn code_generation_reports_exhaustion() {
    // One-symbol codes leave 36 possibilities; a generous retry budget makes
    // filling the space deterministic in practice.
    let config = AppConfig::default().with_code_settings(1, 512);
    let state = state_with_memory_store(config).await;

    for i in 0..36 {
        room_service::create_room(&state, create_request(&format!("host-{i}")))
            .await
            .expect("code space not yet full");
    }

    let err = room_service::create_room(&state, create_request("unlucky")).await.unwrap_err();
    assert!(matches!(err, ServiceError::CodeExhaustion { .. }));
}

#[tokio::test]
async fn operations_fail_while_degraded() {
    let state = AppState::new(AppConfig::default());
    let err = room_service::create_room(&state, create_request("host")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
}
