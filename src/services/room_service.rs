//! Room lifecycle and membership operations.
//!
//! Every operation here resolves the store through the shared state, so all
//! of them fail with the degraded-mode error while no backend is installed.

use std::{sync::Arc, time::SystemTime};

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        models::{MembershipEntity, RoomConfigEntity, RoomEntity, RoomStatus},
        room_store::{RoomInsert, RoomStore},
    },
    dto::room::{CreateRoomRequest, JoinRoomRequest, RoomSummary},
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        lifecycle::{RoomLifecycleEvent, next_status},
    },
};

/// Symbols join codes are drawn from. Uppercase-only so codes survive being
/// read aloud or typed on a phone keyboard.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Create a room with a freshly generated join code; the host becomes its
/// first member. Code collisions are retried up to the configured attempt
/// budget before reporting exhaustion.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomSummary, ServiceError> {
    let store = state.require_room_store().await?;
    let config = RoomConfigEntity {
        open_join: request
            .config
            .open_join
            .unwrap_or(state.config().open_join_default()),
        filters: request.config.filters,
    };
    let max_attempts = state.config().max_code_attempts();

    for _ in 0..max_attempts {
        let room = RoomEntity {
            id: Uuid::new_v4(),
            code: generate_code(state.config().code_length()),
            host_id: request.host_id.clone(),
            config: config.clone(),
            status: RoomStatus::Waiting,
            created_at: SystemTime::now(),
        };

        match store.insert_room(room.clone()).await? {
            RoomInsert::Created => {
                store
                    .add_member(MembershipEntity {
                        room_id: room.id,
                        participant_id: room.host_id.clone(),
                        joined_at: room.created_at,
                    })
                    .await?;
                info!(room_id = %room.id, code = %room.code, "room created");
                return room_summary(&store, room).await;
            }
            RoomInsert::CodeTaken => continue,
        }
    }

    Err(ServiceError::CodeExhaustion {
        attempts: max_attempts,
    })
}

/// Join a room by its code. Joining is idempotent: a participant who already
/// holds a membership row gets the current snapshot back and no event is
/// re-broadcast.
pub async fn join_room(
    state: &SharedState,
    request: JoinRoomRequest,
) -> Result<RoomSummary, ServiceError> {
    let store = state.require_room_store().await?;
    let code = request.code.to_ascii_uppercase();
    let room = store
        .find_room_by_code(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no room with code `{code}`")))?;

    ensure_accepting(&room)?;

    let newly_added = store
        .add_member(MembershipEntity {
            room_id: room.id,
            participant_id: request.participant_id.clone(),
            joined_at: SystemTime::now(),
        })
        .await?;

    let summary = room_summary(&store, room).await?;
    if newly_added {
        info!(room_id = %summary.id, participant = %request.participant_id, "participant joined");
        sse_events::broadcast_room_updated(state, summary.clone());
    }
    Ok(summary)
}

/// Fetch the current snapshot of a room.
pub async fn get_room(state: &SharedState, room_id: Uuid) -> Result<RoomSummary, ServiceError> {
    let store = state.require_room_store().await?;
    let room = find_room(&store, room_id).await?;
    room_summary(&store, room).await
}

/// Host-only: move the room from `Waiting` to `Active`. Retried starts are
/// accepted as no-ops and neither rewrite the store nor re-broadcast.
pub async fn start_room(
    state: &SharedState,
    room_id: Uuid,
    requestor_id: &str,
) -> Result<RoomSummary, ServiceError> {
    let store = state.require_room_store().await?;
    let room = find_room(&store, room_id).await?;
    ensure_host(&room, requestor_id)?;

    let next = next_status(room.status, RoomLifecycleEvent::Start)?;
    if next == room.status {
        return room_summary(&store, room).await;
    }

    let Some(updated) = store.update_room_status(room_id, room.status, next).await? else {
        // The compare-and-set lost to another lifecycle write. Re-read and
        // judge the transition against the current status: a concurrent
        // start degrades to a no-op, a cancellation stays terminal.
        let current = find_room(&store, room_id).await?;
        next_status(current.status, RoomLifecycleEvent::Start)?;
        return room_summary(&store, current).await;
    };
    info!(%room_id, "session started");
    let summary = room_summary(&store, updated).await?;
    sse_events::broadcast_room_updated(state, summary.clone());
    Ok(summary)
}

/// Host-only: cancel the room. Cancellation is terminal; the room row stays
/// behind as a tombstone while its join code, members, votes, and matches
/// are released. Subscribers get one final `room.deleted` event before the
/// fan-out hub is torn down.
pub async fn cancel_room(
    state: &SharedState,
    room_id: Uuid,
    requestor_id: &str,
) -> Result<(), ServiceError> {
    let store = state.require_room_store().await?;
    let room = find_room(&store, room_id).await?;
    ensure_host(&room, requestor_id)?;
    next_status(room.status, RoomLifecycleEvent::Cancel)?;

    store
        .cancel_room(room_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no room `{room_id}`")))?;
    info!(%room_id, "room cancelled");
    sse_events::broadcast_room_deleted(state, room_id);
    state.channels().remove(room_id);
    Ok(())
}

/// Remove the participant's membership row. The host cannot leave their own
/// room; cancelling is the way out.
pub async fn leave_room(
    state: &SharedState,
    room_id: Uuid,
    participant_id: &str,
) -> Result<RoomSummary, ServiceError> {
    let store = state.require_room_store().await?;
    let room = find_room(&store, room_id).await?;
    if room.host_id == participant_id {
        return Err(ServiceError::Forbidden(
            "the host cannot leave; cancel the room instead".into(),
        ));
    }

    let removed = store
        .remove_member(room_id, participant_id.to_string())
        .await?;
    let summary = room_summary(&store, room).await?;
    if removed {
        info!(%room_id, participant = %participant_id, "participant left");
        sse_events::broadcast_room_updated(state, summary.clone());
    }
    Ok(summary)
}

/// Reject joins and votes against rooms that no longer accept them.
pub(crate) fn ensure_accepting(room: &RoomEntity) -> Result<(), ServiceError> {
    match room.status {
        RoomStatus::Waiting | RoomStatus::Active => Ok(()),
        RoomStatus::Cancelled => Err(ServiceError::RoomNotJoinable(format!(
            "room `{}` has been cancelled",
            room.id
        ))),
    }
}

pub(crate) async fn find_room(
    store: &Arc<dyn RoomStore>,
    room_id: Uuid,
) -> Result<RoomEntity, ServiceError> {
    store
        .find_room(room_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no room `{room_id}`")))
}

fn ensure_host(room: &RoomEntity, requestor_id: &str) -> Result<(), ServiceError> {
    if room.host_id == requestor_id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "only the host may change the room lifecycle".into(),
        ))
    }
}

async fn room_summary(
    store: &Arc<dyn RoomStore>,
    room: RoomEntity,
) -> Result<RoomSummary, ServiceError> {
    let members = store.list_members(room.id).await?;
    Ok((room, members).into())
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_uppercase_alphanumeric() {
        for length in [4, 6, 10] {
            let code = generate_code(length);
            assert_eq!(code.len(), length);
            assert!(
                code.bytes().all(|b| CODE_ALPHABET.contains(&b)),
                "unexpected symbol in {code}"
            );
        }
    }
}
