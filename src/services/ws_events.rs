use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        events::{
            NoticeEvent, NoticeLevel, PhaseChangedEvent, PhaseTickEvent, QuestionEvent,
            QuestionTickEvent, RevealEvent, ScoreboardEvent, ServerEvent, SessionEndedEvent,
            TopicPromptEvent, TriviaLoadingEvent,
        },
        room::{ParticipantSummary, RoomSummary},
    },
    state::{
        RoomHandle,
        room::{Question, Room, RoomMode},
    },
};

const EVENT_ROOM_SNAPSHOT: &str = "room.snapshot";
const EVENT_PHASE_CHANGED: &str = "phase.changed";
const EVENT_PHASE_TICK: &str = "phase.tick";
const EVENT_TRIVIA_LOADING: &str = "trivia.loading";
const EVENT_TOPIC_PROMPT: &str = "trivia.topic_prompt";
const EVENT_QUESTION: &str = "trivia.question";
const EVENT_QUESTION_TICK: &str = "trivia.tick";
const EVENT_REVEAL: &str = "trivia.reveal";
const EVENT_SCOREBOARD: &str = "trivia.scores";
const EVENT_SESSION_ENDED: &str = "trivia.ended";
const EVENT_NOTICE: &str = "notice";

/// Broadcast a full snapshot of the room after a membership or host change.
pub fn broadcast_room_snapshot(handle: &RoomHandle, room: &Room) {
    let summary = RoomSummary::from(room);
    send_room_event(handle, EVENT_ROOM_SNAPSHOT, &summary);
}

/// Broadcast a study/break mode flip with the new mode's full duration.
pub fn broadcast_phase_changed(handle: &RoomHandle, mode: RoomMode, remaining_secs: u32) {
    let payload = PhaseChangedEvent {
        mode,
        remaining_secs,
    };
    send_room_event(handle, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast a 1 Hz study/break countdown update.
pub fn broadcast_phase_tick(handle: &RoomHandle, mode: RoomMode, remaining_secs: u32, running: bool) {
    let payload = PhaseTickEvent {
        mode,
        remaining_secs,
        running,
    };
    send_room_event(handle, EVENT_PHASE_TICK, &payload);
}

/// Broadcast whether a question batch is currently being generated.
pub fn broadcast_trivia_loading(handle: &RoomHandle, loading: bool) {
    let payload = TriviaLoadingEvent { loading };
    send_room_event(handle, EVENT_TRIVIA_LOADING, &payload);
}

/// Broadcast the prompt asking for the next round's topic.
pub fn broadcast_topic_prompt(handle: &RoomHandle, room: &Room) {
    let payload = TopicPromptEvent {
        category: room.trivia.category.clone(),
        difficulty: room.trivia.difficulty,
    };
    send_room_event(handle, EVENT_TOPIC_PROMPT, &payload);
}

/// Broadcast a new question with the answer key withheld.
pub fn broadcast_question(handle: &RoomHandle, question: &Question, index: usize, total: usize) {
    let payload = QuestionEvent {
        id: question.id,
        index,
        total,
        text: question.text.clone(),
        options: question.options.to_vec(),
        time_limit_secs: question.time_limit_secs,
    };
    send_room_event(handle, EVENT_QUESTION, &payload);
}

/// Broadcast a 1 Hz per-question countdown update.
pub fn broadcast_question_tick(handle: &RoomHandle, question_id: Uuid, remaining_secs: u32) {
    let payload = QuestionTickEvent {
        question_id,
        remaining_secs,
    };
    send_room_event(handle, EVENT_QUESTION_TICK, &payload);
}

/// Broadcast the correct option once a question's countdown expired.
pub fn broadcast_reveal(handle: &RoomHandle, question_id: Uuid, correct_index: usize) {
    let payload = RevealEvent {
        question_id,
        correct_index,
    };
    send_room_event(handle, EVENT_REVEAL, &payload);
}

/// Broadcast every participant's current score.
pub fn broadcast_scoreboard(handle: &RoomHandle, room: &Room) {
    let payload = ScoreboardEvent {
        scores: room.participants.values().map(Into::into).collect(),
    };
    send_room_event(handle, EVENT_SCOREBOARD, &payload);
}

/// Broadcast the final summary of a trivia session.
pub fn broadcast_session_ended(
    handle: &RoomHandle,
    winner: Option<ParticipantSummary>,
    scores: Vec<ParticipantSummary>,
) {
    let payload = SessionEndedEvent { winner, scores };
    send_room_event(handle, EVENT_SESSION_ENDED, &payload);
}

/// Broadcast an advisory message to the room.
pub fn broadcast_notice(handle: &RoomHandle, level: NoticeLevel, message: impl Into<String>) {
    let payload = NoticeEvent {
        level,
        message: message.into(),
    };
    send_room_event(handle, EVENT_NOTICE, &payload);
}

fn send_room_event(handle: &RoomHandle, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(event, payload) {
        Ok(event) => handle.hub().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize room event payload"),
    }
}
