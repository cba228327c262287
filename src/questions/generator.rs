use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use crate::{
    questions::{GenerationRequest, QuestionSource, SourceError, build_questions, questions_from_value},
    state::room::{Difficulty, Question},
};

/// Request body sent to the generation service.
#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    topic: &'a str,
    use_notes: bool,
    count: usize,
    difficulty: Difficulty,
}

/// HTTP adapter for the external question-generation service.
///
/// Failures of any kind (network, HTTP status, malformed payload) are reported
/// as [`SourceError`]; the trivia controller substitutes the fallback pool and
/// never retries.
pub struct HttpQuestionSource {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpQuestionSource {
    /// Build the adapter. With no endpoint configured every call fails fast
    /// with [`SourceError::Disabled`], which routes the caller to the fallback
    /// pool. That keeps local development working without a generator.
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, endpoint }
    }
}

impl QuestionSource for HttpQuestionSource {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'static, Result<Vec<Question>, SourceError>> {
        let Some(endpoint) = self.endpoint.clone() else {
            return Box::pin(async { Err(SourceError::Disabled) });
        };
        let client = self.client.clone();

        Box::pin(async move {
            let body = GenerateBody {
                topic: &request.topic,
                use_notes: request.use_notes,
                count: request.count,
                difficulty: request.difficulty,
            };

            let response = client
                .post(&endpoint)
                .json(&body)
                .send()
                .await?
                .error_for_status()?;
            let payload: serde_json::Value = response.json().await?;

            let raw = questions_from_value(&payload).ok_or_else(|| {
                SourceError::BadPayload("no question-shaped array in response".into())
            })?;
            debug!(
                requested = request.count,
                received = raw.len(),
                topic = %request.topic,
                "generator answered"
            );

            let questions = build_questions(raw, request.time_limit_secs);
            if questions.is_empty() {
                return Err(SourceError::Empty);
            }
            Ok(questions)
        })
    }
}
