use std::time::SystemTime;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Per-room fan-out hubs plus the ephemeral presence sets.
///
/// Presence is process-lifetime state rebuilt from live subscriptions; it is
/// kept strictly apart from durable membership so a flaky connection can
/// never revoke a participant's standing in the room.
pub struct RoomChannels {
    capacity: usize,
    hubs: DashMap<Uuid, RoomHub>,
    presence: DashMap<Uuid, DashMap<String, SystemTime>>,
}

impl RoomChannels {
    /// Build the registry with the per-hub broadcast capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hubs: DashMap::new(),
            presence: DashMap::new(),
        }
    }

    /// Register a new subscriber on the room's hub, creating it on demand.
    pub fn subscribe(&self, room_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(room_id)
            .or_insert_with(|| RoomHub::new(self.capacity))
            .subscribe()
    }

    /// Send an event to all current subscribers of the room. Rooms without a
    /// hub have no subscribers; the event is simply dropped.
    pub fn broadcast(&self, room_id: Uuid, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(&room_id) {
            hub.broadcast(event);
        }
    }

    /// Drop the room's hub and presence set; called on cancellation. Live
    /// receivers observe the closed channel and terminate their streams.
    pub fn remove(&self, room_id: Uuid) {
        self.hubs.remove(&room_id);
        self.presence.remove(&room_id);
    }

    /// Mark a participant as present, returning `true` when newly tracked.
    pub fn track(&self, room_id: Uuid, participant_id: &str) -> bool {
        self.presence
            .entry(room_id)
            .or_default()
            .insert(participant_id.to_string(), SystemTime::now())
            .is_none()
    }

    /// Remove a participant from the presence set, returning `true` when it
    /// was present.
    pub fn forget(&self, room_id: Uuid, participant_id: &str) -> bool {
        self.presence
            .get(&room_id)
            .is_some_and(|room| room.remove(participant_id).is_some())
    }

    /// Snapshot the room's presence set ordered by connection time.
    pub fn participants(&self, room_id: Uuid) -> Vec<(String, SystemTime)> {
        let Some(room) = self.presence.get(&room_id) else {
            return Vec::new();
        };
        let mut entries: Vec<(String, SystemTime)> = room
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

/// Simple broadcast hub wrapper holding one room's event channel.
pub struct RoomHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl RoomHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
