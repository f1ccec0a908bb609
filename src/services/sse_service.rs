use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::{
        room_service::{ensure_accepting, find_room},
        sse_events,
    },
    state::SharedState,
};

/// Subscribe a participant to a room's event stream.
///
/// Subscribing registers the participant in the room's ephemeral presence
/// set and announces it; membership is untouched. The returned receiver only
/// carries events broadcast after this call, so clients reconcile missed
/// history through the REST listing endpoints.
pub async fn subscribe_room(
    state: &SharedState,
    room_id: Uuid,
    participant_id: &str,
) -> Result<broadcast::Receiver<ServerEvent>, ServiceError> {
    let store = state.require_room_store().await?;
    let room = find_room(&store, room_id).await?;
    ensure_accepting(&room)?;

    let receiver = state.channels().subscribe(room_id);
    if state.channels().track(room_id, participant_id) {
        sse_events::broadcast_presence_join(state, room_id, participant_id);
    }
    sse_events::broadcast_presence_sync(state, room_id);

    Ok(receiver)
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning the presence entry up once the client disconnects.
pub async fn to_sse_stream(
    state: SharedState,
    room_id: Uuid,
    participant_id: String,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    send_handshake(&state, room_id, &participant_id, &tx).await;

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        // Own the state inside the spawned task so presence is released even
        // if the request context has already dropped.
        if state.channels().forget(room_id, &participant_id) {
            sse_events::broadcast_presence_leave(&state, room_id, &participant_id);
            sse_events::broadcast_presence_sync(&state, room_id);
        }
        tracing::info!(%room_id, participant = %participant_id, "SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Push the handshake straight into this connection's bridge so only the new
/// subscriber sees it.
async fn send_handshake(
    state: &SharedState,
    room_id: Uuid,
    participant_id: &str,
    tx: &mpsc::Sender<Result<Event, Infallible>>,
) {
    let payload = Handshake {
        room_id,
        participant_id: participant_id.to_string(),
        degraded: state.is_degraded().await,
    };
    match serde_json::to_string(&payload) {
        Ok(data) => {
            let event = Event::default().event("handshake").data(data);
            let _ = tx.send(Ok(event)).await;
        }
        Err(err) => tracing::warn!(error = %err, "failed to serialize handshake payload"),
    }
}
