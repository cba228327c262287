//! Boundary to the question-generation service, with local fallback.

pub mod fallback;
pub mod generator;

use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::state::room::{Difficulty, OPTION_COUNT, Question};

/// Errors surfaced by a question source. Every variant is recovered locally by
/// substituting the fallback pool; none of them reach participants as errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No generator endpoint is configured.
    #[error("no question generator endpoint configured")]
    Disabled,
    /// The HTTP request to the generator failed.
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The generator answered with a payload we could not recover questions from.
    #[error("malformed generation payload: {0}")]
    BadPayload(String),
    /// The generator answered with zero usable questions.
    #[error("generator returned no usable questions")]
    Empty,
}

/// Parameters for one batch generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Free-text topic, or an opaque notes reference when `use_notes` is set.
    pub topic: String,
    /// Whether `topic` refers to uploaded notes rather than a subject.
    pub use_notes: bool,
    /// Number of questions requested.
    pub count: usize,
    /// Requested difficulty.
    pub difficulty: Difficulty,
    /// Time limit stamped onto every returned question.
    pub time_limit_secs: u32,
}

/// Abstraction over the question-generation service.
pub trait QuestionSource: Send + Sync {
    /// Generate a batch of questions for the request, or fail.
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'static, Result<Vec<Question>, SourceError>>;
}

/// Wire shape of a single generated question, tolerant of common field aliases.
#[derive(Debug, Deserialize)]
pub struct RawQuestion {
    /// Question text.
    #[serde(alias = "text")]
    pub question: String,
    /// Answer options; only four-option questions are usable.
    pub options: Vec<String>,
    /// Index of the correct option.
    #[serde(alias = "answer", alias = "correct")]
    pub correct_index: usize,
}

impl RawQuestion {
    /// Convert into a domain [`Question`], rejecting malformed entries.
    pub fn into_question(self, time_limit_secs: u32) -> Option<Question> {
        let options: [String; OPTION_COUNT] = self.options.try_into().ok()?;
        if self.correct_index >= OPTION_COUNT {
            return None;
        }
        Some(Question {
            id: Uuid::new_v4(),
            text: self.question,
            options,
            correct_index: self.correct_index,
            time_limit_secs,
        })
    }
}

/// Best-effort extraction of a question-shaped array from an arbitrary payload.
///
/// Accepts a top-level array, a `questions` field, or any nested array whose
/// elements all deserialize as [`RawQuestion`]. Generators wrap their output in
/// varying envelopes; scanning beats failing the whole break.
pub fn questions_from_value(value: &serde_json::Value) -> Option<Vec<RawQuestion>> {
    const MAX_DEPTH: usize = 4;
    search_value(value, MAX_DEPTH)
}

fn search_value(value: &serde_json::Value, depth: usize) -> Option<Vec<RawQuestion>> {
    match value {
        serde_json::Value::Array(items) if !items.is_empty() => {
            let parsed: Vec<RawQuestion> = items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect();
            if parsed.len() == items.len() {
                return Some(parsed);
            }
            None
        }
        serde_json::Value::Object(map) if depth > 0 => {
            if let Some(found) = map
                .get("questions")
                .and_then(|nested| search_value(nested, depth - 1))
            {
                return Some(found);
            }
            map.values()
                .find_map(|nested| search_value(nested, depth - 1))
        }
        _ => None,
    }
}

/// Convert raw questions to domain questions, dropping malformed entries.
pub fn build_questions(raw: Vec<RawQuestion>, time_limit_secs: u32) -> Vec<Question> {
    raw.into_iter()
        .filter_map(|question| question.into_question(time_limit_secs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_a_top_level_array() {
        let payload = json!([
            {"question": "2+2?", "options": ["1", "2", "3", "4"], "correct_index": 3}
        ]);
        let raw = questions_from_value(&payload).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].correct_index, 3);
    }

    #[test]
    fn extracts_a_nested_questions_field() {
        let payload = json!({
            "model": "whatever",
            "result": {
                "questions": [
                    {"text": "Capital of France?", "options": ["Paris", "Rome", "Oslo", "Bern"], "answer": 0}
                ]
            }
        });
        let raw = questions_from_value(&payload).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].question, "Capital of France?");
    }

    #[test]
    fn rejects_payloads_without_question_shapes() {
        let payload = json!({"message": "quota exceeded", "items": [1, 2, 3]});
        assert!(questions_from_value(&payload).is_none());
    }

    #[test]
    fn malformed_entries_are_dropped_during_build() {
        let raw = vec![
            RawQuestion {
                question: "ok".into(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_index: 1,
            },
            RawQuestion {
                question: "three options".into(),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_index: 0,
            },
            RawQuestion {
                question: "index out of range".into(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_index: 4,
            },
        ];

        let questions = build_questions(raw, 30);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "ok");
        assert_eq!(questions[0].time_limit_secs, 30);
    }
}
