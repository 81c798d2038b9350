use crate::config::Settings;
use crate::error::{ConfigError, UpstreamError};
use crate::models::{GenerateQuizRequest, Quiz, QuizQuestion};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Source of raw quiz JSON. The handler parses and validates whatever comes back.
pub trait AiQuizClient: Send + Sync {
    /// Model name reported back to the caller.
    fn model(&self) -> &str;

    fn generate_quiz_json(&self, request: &GenerateQuizRequest) -> BoxFuture<'static, Result<String, UpstreamError>>;
}

#[derive(Clone)]
pub struct MockAiClient;

impl MockAiClient {
    pub fn build_quiz(request: &GenerateQuizRequest) -> Quiz {
        let topic = match request.topic.trim() {
            "" => "General Knowledge".to_string(),
            t => t.to_string(),
        };
        let opts = request.options_per_question.max(2) as usize;
        let questions = (0..request.num_questions.max(1) as usize)
            .map(|i| {
                let correct_index = i % opts;
                let options = (0..opts)
                    .map(|j| {
                        if j == correct_index {
                            format!("{} fact {}", topic, i + 1)
                        } else {
                            format!("{} distractor {}.{}", topic, i + 1, j + 1)
                        }
                    })
                    .collect();
                QuizQuestion {
                    id: format!("q{}", i + 1),
                    prompt: format!("Question {}: Which statement best relates to {}?", i + 1, topic),
                    options,
                    correct_index,
                    explanation: Some(format!("The correct option mentions a core {} idea.", topic)),
                }
            })
            .collect();
        Quiz { topic, questions }
    }
}

impl AiQuizClient for MockAiClient {
    fn model(&self) -> &str {
        "mock"
    }

    fn generate_quiz_json(&self, request: &GenerateQuizRequest) -> BoxFuture<'static, Result<String, UpstreamError>> {
        let quiz = Self::build_quiz(request);
        Box::pin(async move {
            serde_json::to_string(&quiz).map_err(|e| UpstreamError::MalformedReply(e.to_string()))
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Resolved once at startup; a configuration error is reported per request.
    pub ai_client: Result<Arc<dyn AiQuizClient>, ConfigError>,
    pub quiz_schema: Arc<jsonschema::Validator>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        ai_client: Result<Arc<dyn AiQuizClient>, ConfigError>,
        quiz_schema: jsonschema::Validator,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            ai_client,
            quiz_schema: Arc::new(quiz_schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(topic: &str, num: u32, opts: u32) -> GenerateQuizRequest {
        GenerateQuizRequest {
            topic: topic.into(),
            num_questions: num,
            options_per_question: opts,
            difficulty: None,
        }
    }

    #[test]
    fn mock_quiz_shape() {
        let quiz = MockAiClient::build_quiz(&request("Rust", 5, 3));
        assert_eq!(quiz.topic, "Rust");
        assert_eq!(quiz.questions.len(), 5);
        for (i, q) in quiz.questions.iter().enumerate() {
            assert_eq!(q.id, format!("q{}", i + 1));
            assert_eq!(q.options.len(), 3);
            assert_eq!(q.correct_index, i % 3);
            assert_eq!(q.options[q.correct_index], format!("Rust fact {}", i + 1));
        }
        assert!(crate::models::validate_quiz(&quiz).is_ok());
    }

    #[test]
    fn mock_quiz_blank_topic() {
        let quiz = MockAiClient::build_quiz(&request("   ", 1, 4));
        assert_eq!(quiz.topic, "General Knowledge");
        assert_eq!(quiz.questions[0].options[1], "General Knowledge distractor 1.2");
    }

    #[tokio::test]
    async fn mock_client_returns_json() {
        let raw = MockAiClient.generate_quiz_json(&request("Space", 2, 4)).await.unwrap();
        let quiz: Quiz = serde_json::from_str(&raw).unwrap();
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(MockAiClient.model(), "mock");
    }
}
