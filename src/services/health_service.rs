use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload including the active room count.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.room_count())
}
