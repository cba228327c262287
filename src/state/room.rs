use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::phase::TriviaPhase;

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;
/// Points awarded for a correct answer submitted with the full time limit left.
pub const MAX_POINTS_PER_QUESTION: u32 = 20;
/// Per-question time limit applied when the host does not pick one.
pub const DEFAULT_QUESTION_TIME_LIMIT_SECS: u32 = 30;
/// Topic used for the very first round when the room was created without one.
pub const DEFAULT_TOPIC: &str = "general knowledge";

/// Question difficulty requested from the question source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Warm-up questions.
    Easy,
    /// Default difficulty.
    #[default]
    Medium,
    /// Questions for seasoned players.
    Hard,
}

/// Top-level phase of a room: participants are either studying or on a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoomMode {
    /// Heads-down study countdown.
    Study,
    /// Break countdown, optionally hosting a trivia session.
    Break,
}

impl RoomMode {
    /// The mode entered when this one's countdown reaches zero.
    pub fn flipped(self) -> Self {
        match self {
            RoomMode::Study => RoomMode::Break,
            RoomMode::Break => RoomMode::Study,
        }
    }
}

/// Immutable per-room durations fixed at creation.
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    /// Length of the study phase in seconds.
    pub study_duration_secs: u32,
    /// Length of the break phase in seconds.
    pub break_duration_secs: u32,
}

impl RoomSettings {
    /// Countdown duration for the given mode.
    pub fn duration_for(&self, mode: RoomMode) -> u32 {
        match mode {
            RoomMode::Study => self.study_duration_secs,
            RoomMode::Break => self.break_duration_secs,
        }
    }
}

/// A connected member of a room, keyed by its connection id.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Connection identifier, unique per WebSocket session.
    pub id: Uuid,
    /// Display name chosen when joining.
    pub username: String,
    /// Whether this participant currently holds host controls.
    pub is_host: bool,
    /// Trivia score accumulated during the current session.
    pub score: u32,
}

/// A single generated trivia question. Immutable once built.
#[derive(Debug, Clone)]
pub struct Question {
    /// Globally unique id, fresh for every generation.
    pub id: Uuid,
    /// Question text shown to participants.
    pub text: String,
    /// Exactly four answer options, order significant.
    pub options: [String; OPTION_COUNT],
    /// Index of the correct option.
    pub correct_index: usize,
    /// Seconds participants get to answer.
    pub time_limit_secs: u32,
}

/// An answer buffered until the question's countdown expires.
#[derive(Debug, Clone)]
pub struct PendingAnswer {
    /// Connection id of the submitter.
    pub participant_id: Uuid,
    /// Question the answer was submitted against.
    pub question_id: Uuid,
    /// Chosen option index.
    pub answer_index: usize,
    /// Seconds left on the question countdown when the answer arrived.
    pub time_remaining_secs: u32,
}

/// Trivia sub-session state, meaningful only while the room is on Break
/// with trivia enabled.
#[derive(Debug)]
pub struct TriviaSession {
    /// Topic (or notes reference) used for the current batch.
    pub category: String,
    /// Whether `category` refers to uploaded notes rather than a subject.
    pub use_notes: bool,
    /// Difficulty requested from the question source.
    pub difficulty: Difficulty,
    /// Time limit applied to every question of the session.
    pub question_time_limit_secs: u32,
    /// Questions currently being played through.
    pub current_batch: Vec<Question>,
    /// Prefetched follow-up batch, installed when the current one runs out.
    pub next_batch: Option<Vec<Question>>,
    /// Index into `current_batch`; `None` before the first question.
    pub current_index: Option<usize>,
    /// Answers buffered for the active question.
    pub pending_answers: Vec<PendingAnswer>,
    /// How many questions in a row resolved with zero answers.
    pub consecutive_inactive: u32,
    /// Tagged session phase; `Paused` means no question timer is running.
    pub phase: TriviaPhase,
    /// True while a background prefetch request is in flight.
    pub is_prefetching: bool,
    /// Whether the room has already played a round (controls the topic prompt).
    pub has_run_first_round: bool,
}

impl TriviaSession {
    /// Build the initial session shell from room-creation choices.
    pub fn new(category: String, difficulty: Difficulty, question_time_limit_secs: u32) -> Self {
        Self {
            category,
            use_notes: false,
            difficulty,
            question_time_limit_secs,
            current_batch: Vec::new(),
            next_batch: None,
            current_index: None,
            pending_answers: Vec::new(),
            consecutive_inactive: 0,
            phase: TriviaPhase::Idle,
            is_prefetching: false,
            has_run_first_round: false,
        }
    }

    /// The question the session is currently playing, if any.
    pub fn current_question(&self) -> Option<&Question> {
        self.current_batch.get(self.current_index?)
    }

    /// Clear per-break transient state ahead of a fresh session.
    pub fn reset_for_new_break(&mut self) {
        self.current_index = None;
        self.pending_answers.clear();
        self.consecutive_inactive = 0;
        self.phase = TriviaPhase::Idle;
    }

    /// Buffer an answer, overwriting any earlier submission by the same
    /// participant for the same question.
    pub fn buffer_answer(&mut self, answer: PendingAnswer) {
        if let Some(existing) = self
            .pending_answers
            .iter_mut()
            .find(|pending| pending.participant_id == answer.participant_id)
        {
            *existing = answer;
        } else {
            self.pending_answers.push(answer);
        }
    }
}

/// Study/Break countdown state.
#[derive(Debug)]
pub struct PhaseTimer {
    /// Seconds left in the current mode.
    pub remaining_secs: u32,
    /// Whether a tick source is currently driving the countdown.
    pub running: bool,
    /// Absolute deadline used while on Break so drift does not accumulate.
    pub break_deadline: Option<Instant>,
}

impl PhaseTimer {
    /// Seconds left until the break deadline, zero once it has passed.
    pub fn secs_until_break_deadline(&self, now: Instant) -> Option<u32> {
        self.break_deadline
            .map(|deadline| deadline.saturating_duration_since(now).as_secs() as u32)
    }
}

/// Handles for every scheduled callback owned by a room. All of them must be
/// aborted when the room is torn down or when a newer schedule supersedes them.
#[derive(Debug, Default)]
pub struct RoomTasks {
    /// 1 Hz study/break countdown task.
    pub phase_ticker: Option<JoinHandle<()>>,
    /// 1 Hz per-question countdown task.
    pub question_timer: Option<JoinHandle<()>>,
    /// Delay between a reveal and the next question.
    pub reveal_delay: Option<JoinHandle<()>>,
    /// Generation task for the batch currently being loaded.
    pub loading: Option<JoinHandle<()>>,
    /// Background next-batch generation task.
    pub prefetch: Option<JoinHandle<()>>,
}

impl RoomTasks {
    /// Abort every outstanding task so nothing fires against a dead room.
    pub fn abort_all(&mut self) {
        for handle in [
            self.phase_ticker.take(),
            self.question_timer.take(),
            self.reveal_delay.take(),
            self.loading.take(),
            self.prefetch.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }

    /// Abort the per-question timer and the reveal delay, leaving the phase
    /// ticker and prefetch untouched.
    pub fn abort_question_tasks(&mut self) {
        for handle in [self.question_timer.take(), self.reveal_delay.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

/// Aggregated state for one study/break room. All mutation happens behind the
/// room's mutex; see [`crate::state::RoomHandle`].
#[derive(Debug)]
pub struct Room {
    /// Short human-typeable join code, unique among active rooms.
    pub code: String,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Connection id of the current host.
    pub host_id: Uuid,
    /// Members in join order, keyed by connection id.
    pub participants: IndexMap<Uuid, Participant>,
    /// Durations fixed at creation.
    pub settings: RoomSettings,
    /// Current top-level phase.
    pub mode: RoomMode,
    /// Study/Break countdown.
    pub timer: PhaseTimer,
    /// Whether breaks run the trivia mini-game.
    pub trivia_enabled: bool,
    /// Embedded trivia session state.
    pub trivia: TriviaSession,
    /// Cancellable handles for every scheduled callback.
    pub tasks: RoomTasks,
}

impl Room {
    /// Build a fresh room with its host as sole participant, starting in
    /// `Study` with the timer paused.
    pub fn new(
        code: String,
        host: Participant,
        settings: RoomSettings,
        trivia_enabled: bool,
        trivia: TriviaSession,
    ) -> Self {
        let host_id = host.id;
        let mut participants = IndexMap::new();
        participants.insert(host_id, host);

        Self {
            code,
            created_at: SystemTime::now(),
            host_id,
            participants,
            settings,
            mode: RoomMode::Study,
            timer: PhaseTimer {
                remaining_secs: settings.study_duration_secs,
                running: false,
                break_deadline: None,
            },
            trivia_enabled,
            trivia,
            tasks: RoomTasks::default(),
        }
    }

    /// Append a non-host participant. Returns `false` when the connection id
    /// is already a member.
    pub fn add_participant(&mut self, id: Uuid, username: String) -> bool {
        if self.participants.contains_key(&id) {
            return false;
        }
        self.participants.insert(
            id,
            Participant {
                id,
                username,
                is_host: false,
                score: 0,
            },
        );
        true
    }

    /// Remove a participant. When the departing member was host and others
    /// remain, the earliest joined remaining participant inherits the role.
    /// Returns the new host's id when a migration happened.
    pub fn remove_participant(&mut self, id: Uuid) -> Option<Uuid> {
        let removed = self.participants.shift_remove(&id)?;

        if !removed.is_host {
            return None;
        }

        let new_host = self.participants.first_mut().map(|(id, participant)| {
            participant.is_host = true;
            *id
        })?;
        self.host_id = new_host;
        Some(new_host)
    }

    /// Zero every participant's trivia score.
    pub fn reset_scores(&mut self) {
        for participant in self.participants.values_mut() {
            participant.score = 0;
        }
    }

    /// Highest-scoring participant, ties broken by join order.
    pub fn winner(&self) -> Option<&Participant> {
        let mut best: Option<&Participant> = None;
        for participant in self.participants.values() {
            if best.is_none_or(|current| participant.score > current.score) {
                best = Some(participant);
            }
        }
        best
    }
}

/// Points for a correct answer: `ceil(remaining * 20 / limit)`. A full-time
/// answer is worth [`MAX_POINTS_PER_QUESTION`]; slower answers decay linearly.
pub fn award_points(time_remaining_secs: u32, time_limit_secs: u32) -> u32 {
    if time_limit_secs == 0 {
        return 0;
    }
    let remaining = time_remaining_secs.min(time_limit_secs);
    (remaining * MAX_POINTS_PER_QUESTION).div_ceil(time_limit_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_with(usernames: &[&str]) -> (Room, Vec<Uuid>) {
        let ids: Vec<Uuid> = usernames.iter().map(|_| Uuid::new_v4()).collect();
        let host = Participant {
            id: ids[0],
            username: usernames[0].into(),
            is_host: true,
            score: 0,
        };
        let mut room = Room::new(
            "AB12CD".into(),
            host,
            RoomSettings {
                study_duration_secs: 1500,
                break_duration_secs: 300,
            },
            true,
            TriviaSession::new("history".into(), Difficulty::Medium, 30),
        );
        for (id, name) in ids.iter().zip(usernames).skip(1) {
            assert!(room.add_participant(*id, (*name).into()));
        }
        (room, ids)
    }

    #[test]
    fn host_leaving_promotes_earliest_joiner() {
        let (mut room, ids) = room_with(&["ada", "grace", "edsger"]);

        let new_host = room.remove_participant(ids[0]);
        assert_eq!(new_host, Some(ids[1]));
        assert_eq!(room.host_id, ids[1]);
        assert!(room.participants[&ids[1]].is_host);
        assert!(!room.participants[&ids[2]].is_host);
    }

    #[test]
    fn non_host_leaving_keeps_host() {
        let (mut room, ids) = room_with(&["ada", "grace"]);

        assert_eq!(room.remove_participant(ids[1]), None);
        assert_eq!(room.host_id, ids[0]);
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let (mut room, ids) = room_with(&["ada"]);
        assert!(!room.add_participant(ids[0], "ada-again".into()));
        assert_eq!(room.participants.len(), 1);
    }

    #[test]
    fn winner_tie_breaks_by_join_order() {
        let (mut room, ids) = room_with(&["ada", "grace", "edsger"]);
        room.participants[&ids[1]].score = 40;
        room.participants[&ids[2]].score = 40;

        assert_eq!(room.winner().map(|p| p.id), Some(ids[1]));
    }

    #[test]
    fn award_points_is_ceiled() {
        // 29s left of 30s: ceil(29 * 20 / 30) = ceil(19.33) = 20.
        assert_eq!(award_points(29, 30), 20);
        assert_eq!(award_points(30, 30), 20);
        assert_eq!(award_points(15, 30), 10);
        assert_eq!(award_points(1, 30), 1);
        assert_eq!(award_points(0, 30), 0);
    }

    #[test]
    fn award_points_clamps_to_the_limit() {
        assert_eq!(award_points(90, 30), MAX_POINTS_PER_QUESTION);
        assert_eq!(award_points(10, 0), 0);
    }

    #[test]
    fn buffered_answer_overwrites_earlier_submission() {
        let mut session = TriviaSession::new("math".into(), Difficulty::Easy, 20);
        let participant = Uuid::new_v4();
        let question = Uuid::new_v4();

        session.buffer_answer(PendingAnswer {
            participant_id: participant,
            question_id: question,
            answer_index: 1,
            time_remaining_secs: 18,
        });
        session.buffer_answer(PendingAnswer {
            participant_id: participant,
            question_id: question,
            answer_index: 3,
            time_remaining_secs: 12,
        });

        assert_eq!(session.pending_answers.len(), 1);
        assert_eq!(session.pending_answers[0].answer_index, 3);
        assert_eq!(session.pending_answers[0].time_remaining_secs, 12);
    }
}
