use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::room::ParticipantSummary,
    state::room::{Difficulty, RoomMode},
};

#[derive(Clone, Debug, Serialize)]
/// Dispatched payload carried across a room's broadcast hub, serialized as one
/// WebSocket text frame.
pub struct ServerEvent {
    /// Event name, e.g. `trivia.question`.
    pub event: String,
    /// JSON payload for the event.
    pub data: serde_json::Value,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the event data field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(payload)?,
        })
    }
}

/// Severity of an advisory message shown to participants.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational message.
    Info,
    /// Positive confirmation.
    Success,
    /// Something participants should pay attention to.
    Warning,
    /// Something went wrong.
    Error,
}

/// Advisory message broadcast to a room (inactivity pause, break ending soon, ...).
#[derive(Debug, Serialize, ToSchema)]
pub struct NoticeEvent {
    /// Message severity.
    pub level: NoticeLevel,
    /// Human-readable text.
    pub message: String,
}

/// Broadcast when the room flips between Study and Break.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseChangedEvent {
    /// The mode just entered.
    pub mode: RoomMode,
    /// Full duration of the new mode in seconds.
    pub remaining_secs: u32,
}

/// 1 Hz study/break countdown update.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseTickEvent {
    /// Current mode.
    pub mode: RoomMode,
    /// Seconds left.
    pub remaining_secs: u32,
    /// Whether the countdown is ticking.
    pub running: bool,
}

/// Broadcast while a question batch is being generated.
#[derive(Debug, Serialize, ToSchema)]
pub struct TriviaLoadingEvent {
    /// True while generation is in flight.
    pub loading: bool,
}

/// Prompt asking the host to pick the next round's topic.
#[derive(Debug, Serialize, ToSchema)]
pub struct TopicPromptEvent {
    /// Topic of the previous round, prefilled client-side.
    pub category: String,
    /// Difficulty of the previous round.
    pub difficulty: Difficulty,
}

/// A new question going on screen. The correct index is withheld.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionEvent {
    /// Question id; answers must echo it.
    pub id: Uuid,
    /// Zero-based position within the current batch.
    pub index: usize,
    /// Batch size.
    pub total: usize,
    /// Question text.
    pub text: String,
    /// The four answer options.
    pub options: Vec<String>,
    /// Seconds participants get to answer.
    pub time_limit_secs: u32,
}

/// 1 Hz per-question countdown update.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionTickEvent {
    /// Active question id.
    pub question_id: Uuid,
    /// Seconds left to answer.
    pub remaining_secs: u32,
}

/// Reveal of the correct option once the question countdown expires.
#[derive(Debug, Serialize, ToSchema)]
pub struct RevealEvent {
    /// Resolved question id.
    pub question_id: Uuid,
    /// Index of the correct option.
    pub correct_index: usize,
}

/// Updated scores broadcast after each question resolution.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreboardEvent {
    /// All participants with their current scores, in join order.
    pub scores: Vec<ParticipantSummary>,
}

/// Final summary broadcast when a trivia session ends.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionEndedEvent {
    /// Highest scoring participant, ties broken by join order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<ParticipantSummary>,
    /// Final scores for every participant.
    pub scores: Vec<ParticipantSummary>,
}
