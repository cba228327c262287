/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room registry: creation, membership, host migration, teardown.
pub mod room_service;
/// Study/break countdown state machine.
pub mod timer_service;
/// Trivia session controller for break-time mini-games.
pub mod trivia_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
/// Room-scoped broadcast event construction.
pub mod ws_events;
