//! Vote ledger and match detection.
//!
//! Match detection hinges on one serialization point: the conditional match
//! insert in the store. Any number of votes may concurrently observe a
//! matching yes-voter set, but only the caller whose insert returns
//! `Created` reports the match and broadcasts the event.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        models::{MatchEntity, VoteDecision, VoteEntity},
        room_store::{MatchInsert, VoteInsert},
    },
    dto::vote::{CastVoteRequest, MatchSummary, VoteOutcome, VoteSummary},
    error::ServiceError,
    services::{
        room_service::{ensure_accepting, find_room},
        sse_events,
    },
    state::SharedState,
};

/// Append a vote to the room's ledger and evaluate it for a match.
///
/// Duplicate casts for the same (participant, item) are idempotent: the
/// stored decision wins, nothing is re-broadcast, and no match evaluation
/// runs again. The response still carries the current other yes-voters so a
/// reconnecting client can rebuild its view.
pub async fn cast_vote(
    state: &SharedState,
    room_id: Uuid,
    request: CastVoteRequest,
) -> Result<VoteOutcome, ServiceError> {
    let store = state.require_room_store().await?;
    let room = find_room(&store, room_id).await?;
    ensure_accepting(&room)?;

    if !room.config.open_join {
        let member = store
            .is_member(room_id, request.participant_id.clone())
            .await?;
        if !member {
            return Err(ServiceError::NotAMember(request.participant_id));
        }
    }

    let vote = VoteEntity {
        room_id,
        participant_id: request.participant_id,
        item_id: request.item_id,
        decision: request.decision,
        cast_at: SystemTime::now(),
    };

    let stored = match store.insert_vote(vote.clone()).await? {
        VoteInsert::Created => {
            sse_events::broadcast_vote_cast(state, &vote);
            vote
        }
        // The room was cancelled between the snapshot above and the insert;
        // the store refused the write.
        VoteInsert::RoomClosed => {
            return Err(ServiceError::RoomNotJoinable(format!(
                "room `{room_id}` has been cancelled"
            )));
        }
        VoteInsert::Duplicate(existing) => {
            // Retried cast: report against the stored row without touching
            // the ledger or re-running detection.
            let other_yes_voters = match existing.decision {
                VoteDecision::Yes => {
                    other_yes_voters(state, room_id, existing.item_id, &existing.participant_id)
                        .await?
                }
                VoteDecision::No => Vec::new(),
            };
            return Ok(VoteOutcome {
                matched: false,
                other_yes_voters,
            });
        }
    };

    if stored.decision == VoteDecision::No {
        return Ok(VoteOutcome {
            matched: false,
            other_yes_voters: Vec::new(),
        });
    }

    let others = other_yes_voters(state, room_id, stored.item_id, &stored.participant_id).await?;
    if others.is_empty() {
        return Ok(VoteOutcome {
            matched: false,
            other_yes_voters: others,
        });
    }

    let mut participant_ids = others.clone();
    participant_ids.push(stored.participant_id.clone());
    participant_ids.sort();
    let record = MatchEntity {
        room_id,
        item_id: stored.item_id,
        participant_ids,
        created_at: SystemTime::now(),
    };

    let matched = match store.insert_match(record.clone()).await? {
        MatchInsert::Created => {
            info!(%room_id, item_id = stored.item_id, "match detected");
            sse_events::broadcast_match_created(state, record);
            true
        }
        // Lost the race: some concurrent vote already created the row and
        // broadcast the event.
        MatchInsert::AlreadyExists(_) => false,
        // Cancelled in flight; the match never happened for this room.
        MatchInsert::RoomClosed => false,
    };

    Ok(VoteOutcome {
        matched,
        other_yes_voters: others,
    })
}

/// The room's full vote ledger, for client reconciliation after a reconnect.
pub async fn list_votes(
    state: &SharedState,
    room_id: Uuid,
) -> Result<Vec<VoteSummary>, ServiceError> {
    let store = state.require_room_store().await?;
    find_room(&store, room_id).await?;
    let votes = store.list_votes(room_id).await?;
    Ok(votes.into_iter().map(Into::into).collect())
}

/// All matches detected in the room so far, in creation order.
pub async fn list_matches(
    state: &SharedState,
    room_id: Uuid,
) -> Result<Vec<MatchSummary>, ServiceError> {
    let store = state.require_room_store().await?;
    find_room(&store, room_id).await?;
    let matches = store.list_matches(room_id).await?;
    Ok(matches.into_iter().map(Into::into).collect())
}

async fn other_yes_voters(
    state: &SharedState,
    room_id: Uuid,
    item_id: u64,
    participant_id: &str,
) -> Result<Vec<String>, ServiceError> {
    let store = state.require_room_store().await?;
    let mut voters = store.yes_voters(room_id, item_id).await?;
    voters.retain(|voter| voter != participant_id);
    Ok(voters)
}
