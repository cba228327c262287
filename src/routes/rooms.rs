use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::room::RoomSummary, error::AppError, services::room_service, state::SharedState,
};

/// Routes exposing read-only room snapshots.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms/{code}", get(get_room))
}

/// Fetch a snapshot of an active room by its join code.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomSummary),
        (status = 404, description = "Unknown room code")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = room_service::room_snapshot(&state, &code).await?;
    Ok(Json(summary))
}
