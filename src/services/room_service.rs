use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{
        room::{CreateRoomInput, RoomSummary},
        validation::ROOM_CODE_LENGTH,
    },
    error::ServiceError,
    services::ws_events,
    state::{RoomHandle, SharedState},
    state::room::{
        DEFAULT_QUESTION_TIME_LIMIT_SECS, DEFAULT_TOPIC, Participant, Room, RoomSettings,
        TriviaSession,
    },
};

/// Code alphabet without easily-confused characters (no 0/O, 1/I).
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Create a room with the requesting connection as host and sole participant.
pub async fn create_room(
    state: &SharedState,
    connection_id: Uuid,
    input: CreateRoomInput,
) -> Arc<RoomHandle> {
    let host = Participant {
        id: connection_id,
        username: input.username.trim().to_string(),
        is_host: true,
        score: 0,
    };

    let settings = RoomSettings {
        study_duration_secs: input.study_duration_secs,
        break_duration_secs: input.break_duration_secs,
    };

    let category = input
        .topic
        .filter(|topic| !topic.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string());
    let trivia = TriviaSession::new(
        category,
        input.difficulty.unwrap_or_default(),
        input
            .question_time_limit_secs
            .unwrap_or(DEFAULT_QUESTION_TIME_LIMIT_SECS),
    );

    let code = allocate_room_code(state);
    let room = Room::new(code.clone(), host, settings, input.trivia_enabled, trivia);
    let handle = RoomHandle::new(room);
    state.rooms().insert(code.clone(), handle.clone());
    info!(%code, host = %connection_id, "room created");
    handle
}

/// Draw fresh codes until one does not collide with an active room.
fn allocate_room_code(state: &SharedState) -> String {
    loop {
        let code = generate_room_code();
        if !state.rooms().contains_key(&code) {
            return code;
        }
    }
}

/// Append a non-host participant to an existing room and broadcast the new
/// snapshot. Fails when the room code is unknown or the room vanished while
/// joining.
pub async fn join_room(
    state: &SharedState,
    code: &str,
    connection_id: Uuid,
    username: String,
) -> Result<Arc<RoomHandle>, ServiceError> {
    let code = code.to_uppercase();
    let Some(handle) = state.room(&code) else {
        return Err(ServiceError::NotFound(format!("room `{code}` not found")));
    };

    let mut room = handle.lock().await;

    // The room may have been torn down between lookup and lock; joining a
    // zombie room would strand the participant in a never-ticking session.
    if !state.rooms().contains_key(handle.code()) {
        debug!(code = handle.code(), "join rejected: room already gone");
        return Err(ServiceError::NotFound(format!("room `{code}` not found")));
    }

    if !room.add_participant(connection_id, username.trim().to_string()) {
        debug!(code = handle.code(), connection = %connection_id, "duplicate join ignored");
        return Err(ServiceError::InvalidState(
            "connection already joined this room".into(),
        ));
    }

    info!(code = handle.code(), connection = %connection_id, "participant joined");
    ws_events::broadcast_room_snapshot(&handle, &room);
    drop(room);
    Ok(handle)
}

/// Read-only snapshot of an active room for the REST surface.
pub async fn room_snapshot(state: &SharedState, code: &str) -> Result<RoomSummary, ServiceError> {
    let code = code.to_uppercase();
    let Some(handle) = state.room(&code) else {
        return Err(ServiceError::NotFound(format!("room `{code}` not found")));
    };
    let room = handle.lock().await;
    Ok(RoomSummary::from(&*room))
}

/// Remove a participant from a room. Migrates the host role to the earliest
/// joined remaining participant, or tears the room down when it empties.
pub async fn leave_room(state: &SharedState, handle: &Arc<RoomHandle>, connection_id: Uuid) {
    let mut room = handle.lock().await;

    if !room.participants.contains_key(&connection_id) {
        return;
    }

    let new_host = room.remove_participant(connection_id);
    info!(code = handle.code(), connection = %connection_id, "participant left");

    if room.participants.is_empty() {
        // Cancel every scheduled callback before dropping the registry entry
        // so no timer ever fires against a destroyed room.
        room.tasks.abort_all();
        drop(room);
        state.rooms().remove(handle.code());
        info!(code = handle.code(), "room torn down");
        return;
    }

    if let Some(host_id) = new_host {
        info!(code = handle.code(), host = %host_id, "host migrated");
    }
    ws_events::broadcast_room_snapshot(handle, &room);
}

/// Remove the connection from every room containing it. A connection belongs
/// to at most one room in practice, but the scan is safe to repeat.
pub async fn handle_disconnect(state: &SharedState, connection_id: Uuid) {
    let handles: Vec<Arc<RoomHandle>> = state
        .rooms()
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    for handle in handles {
        leave_room(state, &handle, connection_id).await;
    }
}

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[index] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::validation::validate_room_code;

    #[test]
    fn generated_codes_pass_validation() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(validate_room_code(&code).is_ok(), "{code}");
        }
    }
}
