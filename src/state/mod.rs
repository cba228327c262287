pub mod hub;
pub mod phase;
pub mod room;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::{config::AppConfig, questions::QuestionSource, state::room::Room};

pub use self::hub::RoomHub;

/// Cheaply clonable handle to the shared application state.
pub type SharedState = Arc<AppState>;

/// Capacity of each room's broadcast channel.
const ROOM_HUB_CAPACITY: usize = 64;

/// One live room: its mutable state behind a mutex plus its broadcast hub.
///
/// Every mutation of the inner [`Room`] goes through the mutex, which
/// linearizes the three timing sources that touch it (phase tick, question
/// tick, participant actions). Cross-room operations never share a lock.
pub struct RoomHandle {
    code: String,
    hub: RoomHub,
    room: Mutex<Room>,
}

impl RoomHandle {
    /// Wrap a freshly built room.
    pub fn new(room: Room) -> Arc<Self> {
        Arc::new(Self {
            code: room.code.clone(),
            hub: RoomHub::new(ROOM_HUB_CAPACITY),
            room: Mutex::new(room),
        })
    }

    /// Join code of this room.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Broadcast hub fanning events out to this room's participants.
    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    /// Acquire the room's serialization point.
    pub async fn lock(&self) -> MutexGuard<'_, Room> {
        self.room.lock().await
    }
}

/// Central application state storing the room registry and shared collaborators.
pub struct AppState {
    config: AppConfig,
    questions: Arc<dyn QuestionSource>,
    rooms: DashMap<String, Arc<RoomHandle>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, questions: Arc<dyn QuestionSource>) -> SharedState {
        Arc::new(Self {
            config,
            questions,
            rooms: DashMap::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the question-generation boundary.
    pub fn question_source(&self) -> Arc<dyn QuestionSource> {
        self.questions.clone()
    }

    /// Registry of active rooms keyed by join code.
    pub fn rooms(&self) -> &DashMap<String, Arc<RoomHandle>> {
        &self.rooms
    }

    /// Look up a room by its join code.
    pub fn room(&self, code: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Number of currently active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
