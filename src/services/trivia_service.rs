use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval, sleep},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{events::NoticeLevel, room::ParticipantSummary, ws::AnswerAck},
    questions::{GenerationRequest, fallback},
    services::{timer_service, websocket_service, ws_events},
    state::{
        RoomHandle, SharedState,
        phase::{TriviaEvent, TriviaPhase},
        room::{Difficulty, OPTION_COUNT, PendingAnswer, Question, Room, RoomMode, award_points},
    },
};

/// Questions requested per generation call.
const QUESTION_BATCH_SIZE: usize = 5;
/// Pause shown between a reveal and the next question.
const REVEAL_DELAY: Duration = Duration::from_secs(3);
/// Unanswered questions in a row before the session pauses.
const INACTIVITY_THRESHOLD: u32 = 2;
/// Below this much break time left, an exhausted batch ends the session
/// early instead of starting a fresh question.
const EARLY_END_WINDOW_SECS: u32 = 20;

/// Begin a trivia session as the room enters Break. Scores are reset and
/// broadcast regardless of whether trivia is enabled; with trivia disabled the
/// timer controller alone governs the phase.
pub(crate) fn start_session(state: &SharedState, handle: &Arc<RoomHandle>, room: &mut Room) {
    room.reset_scores();
    ws_events::broadcast_scoreboard(handle, room);
    room.trivia.reset_for_new_break();

    if !room.trivia_enabled {
        ws_events::broadcast_notice(
            handle,
            NoticeLevel::Info,
            "Break time! Trivia is disabled for this room, enjoy the rest.",
        );
        return;
    }

    let first_round = !room.trivia.has_run_first_round;
    match room.trivia.phase.apply(TriviaEvent::SessionStarted { first_round }) {
        Ok(TriviaPhase::Loading) => {
            room.trivia.has_run_first_round = true;
            ws_events::broadcast_trivia_loading(handle, true);
            spawn_batch_generation(state, handle, room);
        }
        Ok(_) => ws_events::broadcast_topic_prompt(handle, room),
        Err(err) => warn!(code = handle.code(), error = %err, "trivia session start out of phase"),
    }
}

/// Record the host's topic choice and request a fresh batch. Only valid while
/// the room is on Break and the session is waiting for a topic.
pub async fn select_topic(
    state: &SharedState,
    handle: &Arc<RoomHandle>,
    topic: Option<String>,
    notes_ref: Option<String>,
    difficulty: Option<Difficulty>,
    question_time_limit_secs: Option<u32>,
) {
    let mut room = handle.lock().await;
    if room.mode != RoomMode::Break || !room.trivia_enabled {
        debug!(code = handle.code(), "topic selection ignored outside a trivia break");
        return;
    }
    if let Err(err) = room.trivia.phase.apply(TriviaEvent::TopicSelected) {
        debug!(code = handle.code(), error = %err, "topic selection ignored");
        return;
    }

    match (notes_ref, topic) {
        (Some(notes), _) => {
            room.trivia.category = notes;
            room.trivia.use_notes = true;
        }
        (None, Some(topic)) if !topic.trim().is_empty() => {
            room.trivia.category = topic;
            room.trivia.use_notes = false;
        }
        _ => {}
    }
    if let Some(difficulty) = difficulty {
        room.trivia.difficulty = difficulty;
    }
    if let Some(limit) = question_time_limit_secs {
        room.trivia.question_time_limit_secs = limit;
    }

    ws_events::broadcast_trivia_loading(handle, true);
    spawn_batch_generation(state, handle, &mut room);
}

/// Buffer an answer against the active question, or resume a paused session.
///
/// While paused, the submitted answer is deliberately discarded: it acts as a
/// resume trigger and forces one advancement that bypasses the inactivity
/// gate. Stale or mismatched question ids are logged and ignored.
pub async fn submit_answer(
    state: &SharedState,
    handle: &Arc<RoomHandle>,
    connection_id: Uuid,
    question_id: Uuid,
    answer_index: usize,
    time_remaining_secs: u32,
    reply: &mpsc::UnboundedSender<Message>,
) {
    let mut room = handle.lock().await;
    if !room.participants.contains_key(&connection_id) {
        return;
    }

    if room.trivia.phase.is_paused() {
        info!(code = handle.code(), "answer received while paused; resuming trivia");
        room.trivia.consecutive_inactive = 0;
        advance_question(state, handle, &mut room, true);
        return;
    }

    let Some(active_id) = room.trivia.phase.active_question() else {
        debug!(code = handle.code(), "answer ignored: no active question");
        return;
    };
    if active_id != question_id {
        debug!(code = handle.code(), question = %question_id, "stale answer ignored");
        return;
    }
    if answer_index >= OPTION_COUNT {
        debug!(code = handle.code(), answer_index, "answer ignored: option out of range");
        return;
    }
    let Some(time_limit_secs) = room.trivia.current_question().map(|q| q.time_limit_secs) else {
        debug!(code = handle.code(), "answer ignored: active question missing from batch");
        return;
    };

    room.trivia.buffer_answer(PendingAnswer {
        participant_id: connection_id,
        question_id,
        answer_index,
        time_remaining_secs: time_remaining_secs.min(time_limit_secs),
    });
    websocket_service::send_event_to_connection(
        reply,
        "answer.ack",
        &AnswerAck { question_id },
        "answer acknowledgement",
    );
}

/// The sequencing core: decide what happens after a resolved question (or a
/// freshly installed batch) and put the next question on screen.
pub(crate) fn advance_question(
    state: &SharedState,
    handle: &Arc<RoomHandle>,
    room: &mut Room,
    bypass_inactivity: bool,
) {
    // Ending the break takes priority over everything else.
    if room.mode != RoomMode::Break {
        end_session(handle, room);
        return;
    }
    if break_secs_left(room) == 0 {
        timer_service::complete_phase(state, handle, room);
        return;
    }

    // An empty batch would otherwise wedge the session; re-seed it.
    if room.trivia.current_batch.is_empty() {
        warn!(
            code = handle.code(),
            "advancing with an empty batch; re-seeding from the fallback pool"
        );
        room.trivia.current_batch = fallback::draw(
            &state.config().fallback_questions,
            room.trivia.difficulty,
            QUESTION_BATCH_SIZE,
            room.trivia.question_time_limit_secs,
        );
        room.trivia.current_index = None;
    }

    // Kick off the next-batch prefetch two questions before exhaustion. The
    // request runs in the background and never blocks advancement.
    let len = room.trivia.current_batch.len();
    if let Some(index) = room.trivia.current_index {
        if len >= 2
            && index == len - 2
            && !room.trivia.is_prefetching
            && room.trivia.next_batch.is_none()
        {
            spawn_prefetch(state, handle, room);
        }
    }

    let next_index = match room.trivia.current_index {
        None => 0,
        Some(index) if index + 1 >= room.trivia.current_batch.len() => {
            if let Some(next) = room.trivia.next_batch.take() {
                room.trivia.current_batch = next;
                0
            } else if break_secs_left(room) < EARLY_END_WINDOW_SECS {
                // Not enough break left for another run: wrap up instead of
                // showing a partial question.
                ws_events::broadcast_notice(
                    handle,
                    NoticeLevel::Warning,
                    "Break is almost over, wrapping up trivia.",
                );
                end_session(handle, room);
                return;
            } else {
                // Degraded fallback: replay the current batch from the start.
                0
            }
        }
        Some(index) => index + 1,
    };
    room.trivia.current_index = Some(next_index);

    // Two consecutive unanswered questions suspend the session. The gate is
    // bypassed exactly once when resuming from a pause.
    if !bypass_inactivity && room.trivia.consecutive_inactive >= INACTIVITY_THRESHOLD {
        match room.trivia.phase.apply(TriviaEvent::InactivityPause) {
            Ok(_) => {
                ws_events::broadcast_notice(
                    handle,
                    NoticeLevel::Warning,
                    "Nobody is answering, trivia is paused. Submit an answer to resume.",
                );
                return;
            }
            Err(err) => {
                warn!(code = handle.code(), error = %err, "inactivity pause out of phase")
            }
        }
    }

    present_question(state, handle, room);
}

/// Wrap up the trivia session: cancel its timers and broadcast the results.
/// A no-op for sessions that never started (trivia-free breaks).
pub(crate) fn end_session(handle: &Arc<RoomHandle>, room: &mut Room) {
    if matches!(room.trivia.phase, TriviaPhase::Idle) {
        return;
    }

    room.tasks.abort_question_tasks();
    if let Some(task) = room.tasks.loading.take() {
        task.abort();
    }
    if let Some(task) = room.tasks.prefetch.take() {
        task.abort();
    }
    room.trivia.is_prefetching = false;
    let _ = room.trivia.phase.apply(TriviaEvent::SessionEnded);

    let winner = room.winner().map(ParticipantSummary::from);
    let scores = room.participants.values().map(Into::into).collect();
    ws_events::broadcast_session_ended(handle, winner, scores);
    info!(code = handle.code(), "trivia session ended");
}

/// Seconds of break left, falling back to the last tick value while the break
/// countdown is paused.
fn break_secs_left(room: &Room) -> u32 {
    room.timer
        .secs_until_break_deadline(Instant::now())
        .unwrap_or(room.timer.remaining_secs)
}

/// Request a batch for the current topic and install it as the active batch.
fn spawn_batch_generation(state: &SharedState, handle: &Arc<RoomHandle>, room: &mut Room) {
    if let Some(previous) = room.tasks.loading.take() {
        previous.abort();
    }

    let request = GenerationRequest {
        topic: room.trivia.category.clone(),
        use_notes: room.trivia.use_notes,
        count: QUESTION_BATCH_SIZE,
        difficulty: room.trivia.difficulty,
        time_limit_secs: room.trivia.question_time_limit_secs,
    };
    let state = state.clone();
    let code = handle.code().to_string();

    room.tasks.loading = Some(tokio::spawn(async move {
        let (questions, from_fallback) = generate_or_fallback(&state, request).await;

        let Some(handle) = state.room(&code) else {
            return;
        };
        let mut room = handle.lock().await;
        if room.mode != RoomMode::Break || !matches!(room.trivia.phase, TriviaPhase::Loading) {
            debug!(%code, "discarding generated batch: state moved on");
            return;
        }

        if from_fallback {
            ws_events::broadcast_notice(
                &handle,
                NoticeLevel::Info,
                "Question generator unavailable, using the backup question pool.",
            );
        }
        room.trivia.current_batch = questions;
        room.trivia.current_index = None;
        room.trivia.next_batch = None;
        ws_events::broadcast_trivia_loading(&handle, false);
        advance_question(&state, &handle, &mut room, false);
    }));
}

/// Request the follow-up batch in the background, installing it as `next_batch`
/// once complete. Results for rooms torn down in the meantime are discarded.
fn spawn_prefetch(state: &SharedState, handle: &Arc<RoomHandle>, room: &mut Room) {
    room.trivia.is_prefetching = true;

    let request = GenerationRequest {
        topic: room.trivia.category.clone(),
        use_notes: room.trivia.use_notes,
        count: QUESTION_BATCH_SIZE,
        difficulty: room.trivia.difficulty,
        time_limit_secs: room.trivia.question_time_limit_secs,
    };
    let state = state.clone();
    let code = handle.code().to_string();

    if let Some(previous) = room.tasks.prefetch.take() {
        previous.abort();
    }
    room.tasks.prefetch = Some(tokio::spawn(async move {
        debug!(%code, "prefetching the next question batch");
        let (questions, _) = generate_or_fallback(&state, request).await;

        let Some(handle) = state.room(&code) else {
            return;
        };
        let mut room = handle.lock().await;
        room.trivia.is_prefetching = false;
        if room.mode == RoomMode::Break && !matches!(room.trivia.phase, TriviaPhase::Idle) {
            room.trivia.next_batch = Some(questions);
        }
    }));
}

/// Call the question source, substituting the fallback pool on any failure.
/// Returns the batch and whether it came from the fallback pool.
async fn generate_or_fallback(
    state: &SharedState,
    request: GenerationRequest,
) -> (Vec<Question>, bool) {
    let difficulty = request.difficulty;
    let count = request.count;
    let time_limit_secs = request.time_limit_secs;

    match state.question_source().generate(request).await {
        Ok(questions) => (questions, false),
        Err(err) => {
            warn!(error = %err, "question generation failed; drawing from the fallback pool");
            let questions = fallback::draw(
                &state.config().fallback_questions,
                difficulty,
                count,
                time_limit_secs,
            );
            (questions, true)
        }
    }
}

/// Put the question at `current_index` on screen and start its countdown.
fn present_question(state: &SharedState, handle: &Arc<RoomHandle>, room: &mut Room) {
    let Some(index) = room.trivia.current_index else {
        return;
    };
    let total = room.trivia.current_batch.len();
    let Some(question) = room.trivia.current_batch.get(index).cloned() else {
        warn!(code = handle.code(), index, "current index points past the batch");
        end_session(handle, room);
        return;
    };

    room.trivia.pending_answers.clear();
    if let Err(err) = room
        .trivia
        .phase
        .apply(TriviaEvent::QuestionPresented(question.id))
    {
        debug!(code = handle.code(), error = %err, "question presentation dropped");
        return;
    }

    ws_events::broadcast_question(handle, &question, index, total);

    room.tasks.abort_question_tasks();
    room.tasks.question_timer = Some(spawn_question_timer(
        state.clone(),
        handle.code().to_string(),
        question.id,
        question.time_limit_secs,
    ));
}

/// 1 Hz countdown for the active question. Exits silently whenever the
/// question it was started for is no longer the active one.
fn spawn_question_timer(
    state: SharedState,
    code: String,
    question_id: Uuid,
    time_limit_secs: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut remaining = time_limit_secs;
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(handle) = state.room(&code) else {
                break;
            };
            let mut room = handle.lock().await;
            if room.trivia.phase.active_question() != Some(question_id) {
                break;
            }

            remaining = remaining.saturating_sub(1);
            ws_events::broadcast_question_tick(&handle, question_id, remaining);

            if remaining == 0 {
                resolve_question(&state, &handle, &mut room);
                break;
            }
        }
    })
}

/// Resolve the active question: reveal the answer, score the buffered batch
/// atomically, update the inactivity streak, and schedule the next advance.
fn resolve_question(state: &SharedState, handle: &Arc<RoomHandle>, room: &mut Room) {
    let Some(question) = room.trivia.current_question().cloned() else {
        warn!(code = handle.code(), "resolution without an active question");
        end_session(handle, room);
        return;
    };
    if let Err(err) = room.trivia.phase.apply(TriviaEvent::TimerExpired(question.id)) {
        debug!(code = handle.code(), error = %err, "stale question resolution dropped");
        return;
    }

    ws_events::broadcast_reveal(handle, question.id, question.correct_index);

    // The whole batch resolves at once: fairness is by time remaining at
    // submission, not by arrival order.
    let answers = std::mem::take(&mut room.trivia.pending_answers);
    let answered = !answers.is_empty();
    for answer in &answers {
        if answer.answer_index != question.correct_index {
            continue;
        }
        if let Some(participant) = room.participants.get_mut(&answer.participant_id) {
            participant.score += award_points(answer.time_remaining_secs, question.time_limit_secs);
        }
    }
    if answered {
        room.trivia.consecutive_inactive = 0;
    } else {
        room.trivia.consecutive_inactive += 1;
    }
    ws_events::broadcast_scoreboard(handle, room);

    schedule_reveal_delay(state, handle, room);
}

/// Give clients a beat to show the reveal, then advance.
fn schedule_reveal_delay(state: &SharedState, handle: &Arc<RoomHandle>, room: &mut Room) {
    if let Some(previous) = room.tasks.reveal_delay.take() {
        previous.abort();
    }

    let state = state.clone();
    let code = handle.code().to_string();
    room.tasks.reveal_delay = Some(tokio::spawn(async move {
        sleep(REVEAL_DELAY).await;

        let Some(handle) = state.room(&code) else {
            return;
        };
        let mut room = handle.lock().await;
        if !matches!(room.trivia.phase, TriviaPhase::Resolving(_)) {
            return;
        }
        advance_question(&state, &handle, &mut room, false);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use tokio::sync::broadcast::error::TryRecvError;

    use crate::{
        config::AppConfig,
        questions::{QuestionSource, SourceError},
        state::AppState,
        state::room::{Difficulty, Participant, RoomSettings, TriviaSession},
    };

    struct FailingSource;

    impl QuestionSource for FailingSource {
        fn generate(
            &self,
            _request: GenerationRequest,
        ) -> BoxFuture<'static, Result<Vec<Question>, SourceError>> {
            Box::pin(async { Err(SourceError::Disabled) })
        }
    }

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default(), Arc::new(FailingSource))
    }

    fn make_question(correct_index: usize, time_limit_secs: u32) -> Question {
        Question {
            id: Uuid::new_v4(),
            text: "test question".into(),
            options: [
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string(),
            ],
            correct_index,
            time_limit_secs,
        }
    }

    /// Build a room on Break with a far-away deadline and register it.
    fn break_room(
        state: &SharedState,
        members: usize,
        trivia_enabled: bool,
    ) -> (Arc<RoomHandle>, Vec<Uuid>) {
        let ids: Vec<Uuid> = (0..members).map(|_| Uuid::new_v4()).collect();
        let host = Participant {
            id: ids[0],
            username: "host".into(),
            is_host: true,
            score: 0,
        };
        let mut room = Room::new(
            format!("TEST{:02}", state.room_count()),
            host,
            RoomSettings {
                study_duration_secs: 1500,
                break_duration_secs: 300,
            },
            trivia_enabled,
            TriviaSession::new("history".into(), Difficulty::Medium, 30),
        );
        for (offset, id) in ids.iter().enumerate().skip(1) {
            room.add_participant(*id, format!("player-{offset}"));
        }
        room.mode = RoomMode::Break;
        room.timer.remaining_secs = 300;
        room.timer.break_deadline = Some(Instant::now() + Duration::from_secs(300));

        let handle = RoomHandle::new(room);
        state
            .rooms()
            .insert(handle.code().to_string(), handle.clone());
        (handle, ids)
    }

    fn drain_events(
        rx: &mut tokio::sync::broadcast::Receiver<crate::dto::events::ServerEvent>,
    ) -> Vec<String> {
        let mut names = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => names.push(event.event),
                Err(TryRecvError::Empty) => break,
                Err(_) => break,
            }
        }
        names
    }

    #[tokio::test]
    async fn batch_resolution_scores_only_correct_answers() {
        let state = test_state();
        let (handle, ids) = break_room(&state, 3, true);
        let question = make_question(2, 30);
        let mut room = handle.lock().await;
        room.trivia.current_batch = vec![question.clone()];
        room.trivia.current_index = Some(0);
        room.trivia.phase = TriviaPhase::Active(question.id);
        room.trivia.pending_answers = vec![
            PendingAnswer {
                participant_id: ids[1],
                question_id: question.id,
                answer_index: 2,
                time_remaining_secs: 15,
            },
            PendingAnswer {
                participant_id: ids[2],
                question_id: question.id,
                answer_index: 0,
                time_remaining_secs: 30,
            },
        ];

        resolve_question(&state, &handle, &mut room);

        // ceil(15 * 20 / 30) = 10 for the correct answer, 0 for the wrong one.
        assert_eq!(room.participants[&ids[1]].score, 10);
        assert_eq!(room.participants[&ids[2]].score, 0);
        assert_eq!(room.trivia.consecutive_inactive, 0);
        assert!(room.trivia.pending_answers.is_empty());
        assert_eq!(room.trivia.phase, TriviaPhase::Resolving(question.id));
    }

    #[tokio::test]
    async fn unanswered_resolution_increments_the_inactivity_streak() {
        let state = test_state();
        let (handle, _ids) = break_room(&state, 1, true);
        let question = make_question(0, 30);
        let mut room = handle.lock().await;
        room.trivia.current_batch = vec![question.clone()];
        room.trivia.current_index = Some(0);
        room.trivia.phase = TriviaPhase::Active(question.id);

        resolve_question(&state, &handle, &mut room);
        assert_eq!(room.trivia.consecutive_inactive, 1);
    }

    #[tokio::test]
    async fn two_inactive_questions_pause_instead_of_presenting() {
        let state = test_state();
        let (handle, _ids) = break_room(&state, 2, true);
        let questions: Vec<Question> = (0..3).map(|_| make_question(1, 30)).collect();
        let resolved = questions[0].id;
        let mut rx = handle.hub().subscribe();

        let mut room = handle.lock().await;
        room.trivia.current_batch = questions;
        room.trivia.current_index = Some(0);
        room.trivia.consecutive_inactive = 2;
        room.trivia.phase = TriviaPhase::Resolving(resolved);

        advance_question(&state, &handle, &mut room, false);

        assert!(room.trivia.phase.is_paused());
        let events = drain_events(&mut rx);
        assert!(events.contains(&"notice".to_string()));
        assert!(!events.contains(&"trivia.question".to_string()));
    }

    #[tokio::test]
    async fn paused_submission_resumes_without_scoring() {
        let state = test_state();
        let (handle, ids) = break_room(&state, 2, true);
        {
            let mut room = handle.lock().await;
            room.trivia.current_batch = (0..3).map(|_| make_question(1, 30)).collect();
            room.trivia.current_index = Some(0);
            room.trivia.consecutive_inactive = 2;
            room.trivia.phase = TriviaPhase::Paused;
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        submit_answer(&state, &handle, ids[1], Uuid::new_v4(), 1, 30, &tx).await;

        let room = handle.lock().await;
        assert!(room.trivia.phase.active_question().is_some());
        assert_eq!(room.trivia.consecutive_inactive, 0);
        assert!(room.trivia.pending_answers.is_empty());
        assert!(room.participants.values().all(|p| p.score == 0));
    }

    #[tokio::test]
    async fn correct_answers_at_full_time_reach_the_maximum_score() {
        let state = test_state();
        let (handle, ids) = break_room(&state, 1, true);
        let batch: Vec<Question> = (0..5).map(|_| make_question(1, 30)).collect();
        let (tx, _rx) = mpsc::unbounded_channel();

        {
            let mut room = handle.lock().await;
            room.trivia.current_batch = batch.clone();
            room.trivia.phase = TriviaPhase::Loading;
        }

        for question in &batch {
            {
                let mut room = handle.lock().await;
                advance_question(&state, &handle, &mut room, false);
                assert_eq!(room.trivia.phase.active_question(), Some(question.id));
            }
            submit_answer(&state, &handle, ids[0], question.id, 1, 30, &tx).await;
            let mut room = handle.lock().await;
            resolve_question(&state, &handle, &mut room);
        }

        let room = handle.lock().await;
        assert_eq!(room.participants[&ids[0]].score, 100);
    }

    #[tokio::test]
    async fn stale_question_ids_are_ignored() {
        let state = test_state();
        let (handle, ids) = break_room(&state, 1, true);
        let question = make_question(0, 30);
        {
            let mut room = handle.lock().await;
            room.trivia.current_batch = vec![question.clone()];
            room.trivia.current_index = Some(0);
            room.trivia.phase = TriviaPhase::Active(question.id);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        submit_answer(&state, &handle, ids[0], Uuid::new_v4(), 0, 30, &tx).await;

        let room = handle.lock().await;
        assert!(room.trivia.pending_answers.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn later_submissions_overwrite_earlier_ones() {
        let state = test_state();
        let (handle, ids) = break_room(&state, 1, true);
        let question = make_question(3, 30);
        {
            let mut room = handle.lock().await;
            room.trivia.current_batch = vec![question.clone()];
            room.trivia.current_index = Some(0);
            room.trivia.phase = TriviaPhase::Active(question.id);
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        submit_answer(&state, &handle, ids[0], question.id, 0, 25, &tx).await;
        submit_answer(&state, &handle, ids[0], question.id, 3, 20, &tx).await;

        let room = handle.lock().await;
        assert_eq!(room.trivia.pending_answers.len(), 1);
        assert_eq!(room.trivia.pending_answers[0].answer_index, 3);
    }

    #[tokio::test]
    async fn exhausted_batch_swaps_to_the_prefetched_one() {
        let state = test_state();
        let (handle, _ids) = break_room(&state, 1, true);
        let current: Vec<Question> = (0..2).map(|_| make_question(0, 30)).collect();
        let next: Vec<Question> = (0..5).map(|_| make_question(0, 30)).collect();
        let first_of_next = next[0].id;

        let mut room = handle.lock().await;
        room.trivia.current_batch = current;
        room.trivia.current_index = Some(1);
        room.trivia.next_batch = Some(next);
        room.trivia.phase = TriviaPhase::Resolving(room.trivia.current_batch[1].id);

        advance_question(&state, &handle, &mut room, false);

        assert_eq!(room.trivia.current_index, Some(0));
        assert_eq!(room.trivia.current_batch.len(), 5);
        assert!(room.trivia.next_batch.is_none());
        assert_eq!(room.trivia.phase.active_question(), Some(first_of_next));
    }

    #[tokio::test]
    async fn exhausted_batch_near_the_deadline_ends_early() {
        let state = test_state();
        let (handle, _ids) = break_room(&state, 1, true);
        let mut rx = handle.hub().subscribe();

        let mut room = handle.lock().await;
        let question = make_question(0, 30);
        room.trivia.current_batch = vec![question.clone()];
        room.trivia.current_index = Some(0);
        room.trivia.phase = TriviaPhase::Resolving(question.id);
        room.timer.break_deadline = Some(Instant::now() + Duration::from_secs(10));

        advance_question(&state, &handle, &mut room, false);

        assert_eq!(room.trivia.phase, TriviaPhase::Idle);
        let events = drain_events(&mut rx);
        assert!(events.contains(&"trivia.ended".to_string()));
    }

    #[tokio::test]
    async fn passed_deadline_forces_the_room_back_to_study() {
        let state = test_state();
        let (handle, _ids) = break_room(&state, 1, true);

        let mut room = handle.lock().await;
        let question = make_question(0, 30);
        room.trivia.current_batch = vec![question.clone()];
        room.trivia.current_index = Some(0);
        room.trivia.phase = TriviaPhase::Resolving(question.id);
        room.timer.break_deadline = Some(Instant::now());

        advance_question(&state, &handle, &mut room, false);

        assert_eq!(room.mode, RoomMode::Study);
        assert_eq!(room.trivia.phase, TriviaPhase::Idle);
        assert!(room.tasks.phase_ticker.is_some());
        room.tasks.abort_all();
    }

    #[tokio::test]
    async fn disabled_trivia_breaks_only_reset_scores() {
        let state = test_state();
        let (handle, ids) = break_room(&state, 2, false);
        let mut rx = handle.hub().subscribe();

        let mut room = handle.lock().await;
        room.participants[&ids[1]].score = 42;
        start_session(&state, &handle, &mut room);

        assert_eq!(room.trivia.phase, TriviaPhase::Idle);
        assert_eq!(room.participants[&ids[1]].score, 0);
        let events = drain_events(&mut rx);
        assert!(events.contains(&"trivia.scores".to_string()));
        assert!(events.contains(&"notice".to_string()));
        assert!(!events.contains(&"trivia.loading".to_string()));
    }

    #[tokio::test]
    async fn first_round_generates_without_a_topic_prompt() {
        let state = test_state();
        let (handle, _ids) = break_room(&state, 1, true);
        let mut rx = handle.hub().subscribe();

        let mut room = handle.lock().await;
        start_session(&state, &handle, &mut room);

        assert!(room.trivia.has_run_first_round);
        assert_eq!(room.trivia.phase, TriviaPhase::Loading);
        let events = drain_events(&mut rx);
        assert!(events.contains(&"trivia.loading".to_string()));
        assert!(!events.contains(&"trivia.topic_prompt".to_string()));
    }

    #[tokio::test]
    async fn second_round_prompts_for_a_topic() {
        let state = test_state();
        let (handle, _ids) = break_room(&state, 1, true);
        let mut rx = handle.hub().subscribe();

        let mut room = handle.lock().await;
        room.trivia.has_run_first_round = true;
        start_session(&state, &handle, &mut room);

        assert_eq!(room.trivia.phase, TriviaPhase::AwaitingTopic);
        let events = drain_events(&mut rx);
        assert!(events.contains(&"trivia.topic_prompt".to_string()));
    }

    #[tokio::test]
    async fn failed_generation_falls_back_to_a_full_batch() {
        let state = test_state();
        let request = GenerationRequest {
            topic: "anything".into(),
            use_notes: false,
            count: QUESTION_BATCH_SIZE,
            difficulty: Difficulty::Hard,
            time_limit_secs: 25,
        };

        let (questions, from_fallback) = generate_or_fallback(&state, request).await;

        assert!(from_fallback);
        assert_eq!(questions.len(), QUESTION_BATCH_SIZE);
        for question in &questions {
            assert!(question.correct_index < OPTION_COUNT);
            assert_eq!(question.time_limit_secs, 25);
        }
    }
}
