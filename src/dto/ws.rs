use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{
        room::RoomSummary,
        validation::{
            validate_phase_duration, validate_question_time_limit, validate_room_code,
            validate_username,
        },
    },
    state::room::Difficulty,
};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from participant WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a new room; only valid as the first frame of a connection.
    CreateRoom {
        /// Display name of the creating participant (the host).
        username: String,
        /// Study phase length in seconds.
        study_duration_secs: u32,
        /// Break phase length in seconds.
        break_duration_secs: u32,
        /// Whether breaks should run the trivia mini-game.
        #[serde(default = "default_trivia_enabled")]
        trivia_enabled: bool,
        /// Topic used for the first trivia round.
        #[serde(default)]
        topic: Option<String>,
        /// Question difficulty for the first round.
        #[serde(default)]
        difficulty: Option<Difficulty>,
        /// Per-question time limit in seconds.
        #[serde(default)]
        question_time_limit_secs: Option<u32>,
    },
    /// Join an existing room; only valid as the first frame of a connection.
    JoinRoom {
        /// Join code of the target room.
        code: String,
        /// Display name of the joining participant.
        username: String,
    },
    /// Request a fresh snapshot of the joined room.
    GetRoom,
    /// Leave the joined room (also implied by closing the socket).
    LeaveRoom,
    /// Start the study/break countdown (host only).
    StartTimer,
    /// Pause the study/break countdown (host only).
    PauseTimer,
    /// Force the phase transition that would occur at zero (host only).
    SkipTimer,
    /// Pick the topic for the next trivia round.
    SelectTopic {
        /// Free-text topic for the next batch.
        #[serde(default)]
        topic: Option<String>,
        /// Opaque reference to uploaded notes, forwarded to the generator.
        #[serde(default)]
        notes_ref: Option<String>,
        /// Difficulty for the next batch.
        #[serde(default)]
        difficulty: Option<Difficulty>,
        /// Per-question time limit for the next batch.
        #[serde(default)]
        question_time_limit_secs: Option<u32>,
    },
    /// Submit (or, while paused, resume with) an answer.
    SubmitAnswer {
        /// Id of the question being answered.
        question_id: Uuid,
        /// Chosen option index.
        answer_index: usize,
        /// Seconds left on the question countdown at submission.
        time_remaining_secs: u32,
    },
    /// Anything unrecognised; ignored with a warning.
    #[serde(other)]
    Unknown,
}

fn default_trivia_enabled() -> bool {
    true
}

impl ClientMessage {
    /// Parse a text frame and validate the fields of the resulting message.
    pub fn from_json_str(payload: &str) -> Result<Self, String> {
        let message: Self = serde_json::from_str(payload).map_err(|err| err.to_string())?;
        message.validate_fields()?;
        Ok(message)
    }

    fn validate_fields(&self) -> Result<(), String> {
        match self {
            ClientMessage::CreateRoom {
                username,
                study_duration_secs,
                break_duration_secs,
                question_time_limit_secs,
                ..
            } => {
                validate_username(username).map_err(|err| err.to_string())?;
                validate_phase_duration(*study_duration_secs).map_err(|err| err.to_string())?;
                validate_phase_duration(*break_duration_secs).map_err(|err| err.to_string())?;
                if let Some(limit) = question_time_limit_secs {
                    validate_question_time_limit(*limit).map_err(|err| err.to_string())?;
                }
                Ok(())
            }
            ClientMessage::JoinRoom { code, username } => {
                validate_room_code(code).map_err(|err| err.to_string())?;
                validate_username(username).map_err(|err| err.to_string())
            }
            ClientMessage::SelectTopic {
                question_time_limit_secs: Some(limit),
                ..
            } => validate_question_time_limit(*limit).map_err(|err| err.to_string()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Positive acknowledgement sent to a connection after it created or joined a room.
pub struct JoinedReply {
    /// Identifier assigned to this connection; doubles as the participant id.
    pub connection_id: Uuid,
    /// Snapshot of the room at join time.
    pub room: RoomSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Acknowledgement sent to the submitter once an answer has been buffered.
pub struct AnswerAck {
    /// Question the buffered answer targets.
    pub question_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Terminal error reply sent before closing a connection.
pub struct ErrorReply {
    /// Human-readable reason.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_room_round_trips_with_defaults() {
        let payload = r#"{
            "type": "create_room",
            "username": "ada",
            "study_duration_secs": 1500,
            "break_duration_secs": 300
        }"#;

        let message = ClientMessage::from_json_str(payload).unwrap();
        match message {
            ClientMessage::CreateRoom {
                username,
                trivia_enabled,
                topic,
                ..
            } => {
                assert_eq!(username, "ada");
                assert!(trivia_enabled);
                assert!(topic.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn invalid_durations_are_rejected() {
        let payload = r#"{
            "type": "create_room",
            "username": "ada",
            "study_duration_secs": 0,
            "break_duration_secs": 300
        }"#;

        assert!(ClientMessage::from_json_str(payload).is_err());
    }

    #[test]
    fn join_room_validates_the_code() {
        let payload = r#"{"type": "join_room", "code": "ab", "username": "ada"}"#;
        assert!(ClientMessage::from_json_str(payload).is_err());
    }

    #[test]
    fn unknown_types_parse_to_the_unknown_variant() {
        let payload = r#"{"type": "dance"}"#;
        let message = ClientMessage::from_json_str(payload).unwrap();
        assert!(matches!(message, ClientMessage::Unknown));
    }
}
