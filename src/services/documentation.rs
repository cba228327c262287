use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for BrainBreak Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::get_room,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomSummary,
            crate::dto::room::ParticipantSummary,
            crate::dto::room::TimerSummary,
            crate::dto::room::TriviaSummary,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::JoinedReply,
            crate::dto::ws::AnswerAck,
            crate::dto::ws::ErrorReply,
            crate::dto::phase::VisibleTriviaPhase,
            crate::state::room::RoomMode,
            crate::state::room::Difficulty,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room snapshot endpoints"),
        (name = "ws", description = "WebSocket operations for participants"),
    )
)]
pub struct ApiDoc;
