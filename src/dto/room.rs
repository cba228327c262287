use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{format_system_time, phase::VisibleTriviaPhase},
    state::room::{Difficulty, Participant, Room, RoomMode},
};

/// Validated room-creation parameters carried from the WebSocket handshake
/// into the registry.
#[derive(Debug, Clone)]
pub struct CreateRoomInput {
    /// Display name of the creating participant (the host).
    pub username: String,
    /// Study phase length in seconds.
    pub study_duration_secs: u32,
    /// Break phase length in seconds.
    pub break_duration_secs: u32,
    /// Whether breaks should run the trivia mini-game.
    pub trivia_enabled: bool,
    /// Topic used for the first trivia round. Defaults to a general pool topic.
    pub topic: Option<String>,
    /// Question difficulty for the first round.
    pub difficulty: Option<Difficulty>,
    /// Per-question time limit in seconds.
    pub question_time_limit_secs: Option<u32>,
}

/// Public projection of a participant exposed to REST/WS clients.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ParticipantSummary {
    /// Connection id of the participant.
    pub id: Uuid,
    /// Display name.
    pub username: String,
    /// Whether this participant holds host controls.
    pub is_host: bool,
    /// Current trivia score.
    pub score: u32,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.id,
            username: participant.username.clone(),
            is_host: participant.is_host,
            score: participant.score,
        }
    }
}

/// Countdown projection included in room snapshots.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct TimerSummary {
    /// Seconds left in the current mode.
    pub remaining_secs: u32,
    /// Whether the countdown is currently ticking.
    pub running: bool,
}

/// Trivia session projection included in room snapshots.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct TriviaSummary {
    /// Topic of the current (or upcoming) batch.
    pub category: String,
    /// Requested question difficulty.
    pub difficulty: Difficulty,
    /// Per-question time limit in seconds.
    pub question_time_limit_secs: u32,
    /// Visible session phase.
    pub phase: VisibleTriviaPhase,
}

/// Snapshot of one room, broadcast after membership changes and served over REST.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RoomSummary {
    /// Join code.
    pub code: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// Connection id of the current host.
    pub host_id: Uuid,
    /// Current top-level phase.
    pub mode: RoomMode,
    /// Countdown state.
    pub timer: TimerSummary,
    /// Study phase length in seconds.
    pub study_duration_secs: u32,
    /// Break phase length in seconds.
    pub break_duration_secs: u32,
    /// Whether breaks run trivia.
    pub trivia_enabled: bool,
    /// Trivia session projection, present when trivia is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trivia: Option<TriviaSummary>,
    /// Members in join order.
    pub participants: Vec<ParticipantSummary>,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        let trivia = room.trivia_enabled.then(|| TriviaSummary {
            category: room.trivia.category.clone(),
            difficulty: room.trivia.difficulty,
            question_time_limit_secs: room.trivia.question_time_limit_secs,
            phase: (&room.trivia.phase).into(),
        });

        Self {
            code: room.code.clone(),
            created_at: format_system_time(room.created_at),
            host_id: room.host_id,
            mode: room.mode,
            timer: TimerSummary {
                remaining_secs: room.timer.remaining_secs,
                running: room.timer.running,
            },
            study_duration_secs: room.settings.study_duration_secs,
            break_duration_secs: room.settings.break_duration_secs,
            trivia_enabled: room.trivia_enabled,
            trivia,
            participants: room.participants.values().map(Into::into).collect(),
        }
    }
}
