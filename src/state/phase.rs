use thiserror::Error;
use uuid::Uuid;

/// Tagged phase of a room's trivia session.
///
/// Replaces the ad hoc `paused` / `isRegenerating` boolean flags with a single
/// state so illegal combinations cannot be represented: a paused session never
/// has a question timer, and a loading session never has an active question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriviaPhase {
    /// No session activity; the room is studying or on a trivia-free break.
    Idle,
    /// Session started, waiting for the host to pick a topic.
    AwaitingTopic,
    /// A question batch is being generated.
    Loading,
    /// The identified question is on screen with its countdown running.
    Active(Uuid),
    /// The countdown expired; answers are being scored and revealed.
    Resolving(Uuid),
    /// Suspended after consecutive unanswered questions; any incoming answer
    /// resumes the session.
    Paused,
}

/// Events that drive the trivia session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriviaEvent {
    /// Break started with trivia enabled. `first_round` selects whether the
    /// initial topic is used directly or a topic prompt goes out first.
    SessionStarted {
        /// True for the room's very first trivia round.
        first_round: bool,
    },
    /// The host picked a topic; a batch request is going out.
    TopicSelected,
    /// A question went on screen and its countdown started.
    QuestionPresented(Uuid),
    /// The active question's countdown reached zero.
    TimerExpired(Uuid),
    /// Two consecutive questions resolved without answers.
    InactivityPause,
    /// The break ended or the session was ended early.
    SessionEnded,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid trivia transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the session was in when the invalid event was received.
    pub from: TriviaPhase,
    /// The event that cannot be applied from this phase.
    pub event: TriviaEvent,
}

impl TriviaPhase {
    /// Whether the session is suspended waiting for an answer to resume it.
    pub fn is_paused(&self) -> bool {
        matches!(self, TriviaPhase::Paused)
    }

    /// The question id currently on screen, if a question is active.
    pub fn active_question(&self) -> Option<Uuid> {
        match self {
            TriviaPhase::Active(id) => Some(*id),
            _ => None,
        }
    }

    /// Apply `event`, moving to the next phase when the transition is valid.
    pub fn apply(&mut self, event: TriviaEvent) -> Result<TriviaPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        *self = next;
        Ok(next)
    }

    /// Compute the transition for an event without applying it.
    fn compute_transition(&self, event: TriviaEvent) -> Result<TriviaPhase, InvalidTransition> {
        let next = match (*self, event) {
            (_, TriviaEvent::SessionEnded) => TriviaPhase::Idle,
            (TriviaPhase::Idle, TriviaEvent::SessionStarted { first_round: true }) => {
                TriviaPhase::Loading
            }
            (TriviaPhase::Idle, TriviaEvent::SessionStarted { first_round: false }) => {
                TriviaPhase::AwaitingTopic
            }
            (TriviaPhase::AwaitingTopic, TriviaEvent::TopicSelected) => TriviaPhase::Loading,
            (TriviaPhase::Loading, TriviaEvent::QuestionPresented(id)) => TriviaPhase::Active(id),
            (TriviaPhase::Active(active), TriviaEvent::TimerExpired(id)) if active == id => {
                TriviaPhase::Resolving(id)
            }
            (TriviaPhase::Resolving(_), TriviaEvent::QuestionPresented(id)) => {
                TriviaPhase::Active(id)
            }
            (TriviaPhase::Resolving(_), TriviaEvent::InactivityPause) => TriviaPhase::Paused,
            (TriviaPhase::Paused, TriviaEvent::QuestionPresented(id)) => TriviaPhase::Active(id),
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(phase: &mut TriviaPhase, event: TriviaEvent) -> TriviaPhase {
        phase.apply(event).unwrap()
    }

    #[test]
    fn first_round_skips_the_topic_prompt() {
        let mut phase = TriviaPhase::Idle;
        assert_eq!(
            apply(&mut phase, TriviaEvent::SessionStarted { first_round: true }),
            TriviaPhase::Loading
        );
    }

    #[test]
    fn later_rounds_wait_for_a_topic() {
        let mut phase = TriviaPhase::Idle;
        assert_eq!(
            apply(&mut phase, TriviaEvent::SessionStarted { first_round: false }),
            TriviaPhase::AwaitingTopic
        );
        assert_eq!(
            apply(&mut phase, TriviaEvent::TopicSelected),
            TriviaPhase::Loading
        );
    }

    #[test]
    fn full_question_cycle() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let mut phase = TriviaPhase::Idle;
        apply(&mut phase, TriviaEvent::SessionStarted { first_round: true });
        apply(&mut phase, TriviaEvent::QuestionPresented(first));
        assert_eq!(
            apply(&mut phase, TriviaEvent::TimerExpired(first)),
            TriviaPhase::Resolving(first)
        );
        assert_eq!(
            apply(&mut phase, TriviaEvent::QuestionPresented(second)),
            TriviaPhase::Active(second)
        );
    }

    #[test]
    fn inactivity_pauses_and_an_answer_resumes() {
        let question = Uuid::new_v4();
        let next = Uuid::new_v4();

        let mut phase = TriviaPhase::Resolving(question);
        assert_eq!(
            apply(&mut phase, TriviaEvent::InactivityPause),
            TriviaPhase::Paused
        );
        assert!(phase.is_paused());
        assert_eq!(
            apply(&mut phase, TriviaEvent::QuestionPresented(next)),
            TriviaPhase::Active(next)
        );
    }

    #[test]
    fn session_end_is_valid_from_every_phase() {
        let question = Uuid::new_v4();
        for phase in [
            TriviaPhase::Idle,
            TriviaPhase::AwaitingTopic,
            TriviaPhase::Loading,
            TriviaPhase::Active(question),
            TriviaPhase::Resolving(question),
            TriviaPhase::Paused,
        ] {
            let mut phase = phase;
            assert_eq!(
                apply(&mut phase, TriviaEvent::SessionEnded),
                TriviaPhase::Idle
            );
        }
    }

    #[test]
    fn stale_timer_expiry_is_rejected() {
        let active = Uuid::new_v4();
        let stale = Uuid::new_v4();

        let mut phase = TriviaPhase::Active(active);
        let err = phase.apply(TriviaEvent::TimerExpired(stale)).unwrap_err();
        assert_eq!(err.from, TriviaPhase::Active(active));
        assert_eq!(phase, TriviaPhase::Active(active));
    }

    #[test]
    fn answers_cannot_activate_an_idle_session() {
        let mut phase = TriviaPhase::Idle;
        let err = phase
            .apply(TriviaEvent::QuestionPresented(Uuid::new_v4()))
            .unwrap_err();
        assert_eq!(err.from, TriviaPhase::Idle);
    }
}
