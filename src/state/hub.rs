use tokio::sync::broadcast;

use crate::dto::events::ServerEvent;

/// Per-room broadcast hub fanning events out to every connected participant.
///
/// Events are only ever published while holding the room's mutex, so
/// subscribers observe them in the exact order the room's serialized
/// mutations produced them.
#[derive(Debug)]
pub struct RoomHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl RoomHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
