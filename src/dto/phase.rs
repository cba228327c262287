use serde::Serialize;
use utoipa::ToSchema;

use crate::state::phase::TriviaPhase;

/// Publicly visible trivia session phase exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum VisibleTriviaPhase {
    /// No trivia activity.
    Idle,
    /// Waiting for the host to pick a topic.
    AwaitingTopic,
    /// A question batch is being generated.
    Loading,
    /// A question is on screen.
    Question,
    /// The current question is being revealed and scored.
    Resolving,
    /// Paused after consecutive unanswered questions.
    Paused,
}

impl From<&TriviaPhase> for VisibleTriviaPhase {
    fn from(value: &TriviaPhase) -> Self {
        match value {
            TriviaPhase::Idle => VisibleTriviaPhase::Idle,
            TriviaPhase::AwaitingTopic => VisibleTriviaPhase::AwaitingTopic,
            TriviaPhase::Loading => VisibleTriviaPhase::Loading,
            TriviaPhase::Active(_) => VisibleTriviaPhase::Question,
            TriviaPhase::Resolving(_) => VisibleTriviaPhase::Resolving,
            TriviaPhase::Paused => VisibleTriviaPhase::Paused,
        }
    }
}
