use crate::config::{Provider, UpstreamTarget};
use crate::error::UpstreamError;
use crate::models::GenerateQuizRequest;
use crate::state::AiQuizClient;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

pub const SYSTEM_PROMPT: &str = "You generate multiple-choice quizzes. Return strict JSON matching the schema: \
{\"topic\": string, \"questions\": [{\"id\": string, \"prompt\": string, \"options\": string[], \"correctIndex\": number, \"explanation\"?: string}]} \
Respond with JSON only, no code fences.";

pub fn build_user_prompt(request: &GenerateQuizRequest) -> String {
    format!(
        "Generate a quiz as JSON with fields topic and questions. Topic: {}. Questions: {}. Options per question: {}. \
         Difficulty: {}. Ensure exactly one correct answer per question and valid JSON.",
        request.topic.trim(),
        request.num_questions,
        request.options_per_question,
        request.difficulty.as_deref().filter(|d| !d.trim().is_empty()).unwrap_or("medium"),
    )
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the OpenAI-compatible `chat/completions` endpoint shared by
/// Groq, OpenRouter and OpenAI.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    target: UpstreamTarget,
}

impl ChatCompletionsClient {
    pub fn new(target: UpstreamTarget, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, target })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.target.base_url)
    }

    pub fn request_body(&self, request: &GenerateQuizRequest) -> Value {
        let user_prompt = build_user_prompt(request);
        let messages = [
            ChatMessage { role: "system", content: SYSTEM_PROMPT },
            ChatMessage { role: "user", content: &user_prompt },
        ];
        let mut body = json!({
            "model": self.target.model,
            "messages": messages,
        });
        match self.target.provider {
            Provider::Groq => {
                body["temperature"] = json!(0.2);
            }
            Provider::OpenRouter | Provider::OpenAi => {
                body["response_format"] = json!({ "type": "json_object" });
            }
        }
        body
    }

    fn headers(&self) -> Result<HeaderMap, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.target.api_key))
            .map_err(|_| UpstreamError::Transport("api key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        if self.target.provider == Provider::OpenRouter {
            if let Ok(referer) = HeaderValue::from_str(&self.target.referer) {
                headers.insert("http-referer", referer);
            }
            if let Ok(title) = HeaderValue::from_str(&self.target.app_title) {
                headers.insert("x-title", title);
            }
        }
        Ok(headers)
    }
}

impl AiQuizClient for ChatCompletionsClient {
    fn model(&self) -> &str {
        &self.target.model
    }

    fn generate_quiz_json(&self, request: &GenerateQuizRequest) -> BoxFuture<'static, Result<String, UpstreamError>> {
        let http = self.http.clone();
        let url = self.endpoint();
        let body = self.request_body(request);
        let headers = self.headers();

        Box::pin(async move {
            let resp = http.post(&url).headers(headers?).json(&body).send().await?;
            let status = resp.status();
            if !status.is_success() {
                match resp.text().await {
                    Ok(text) => {
                        let excerpt: String = text.chars().take(500).collect();
                        warn!(%url, status = status.as_u16(), body = %excerpt, "provider rejected quiz request");
                    }
                    Err(err) => {
                        warn!(%url, status = status.as_u16(), error = %err, "provider rejected quiz request, body unreadable");
                    }
                }
                return Err(UpstreamError::Status { status: status.as_u16() });
            }

            let parsed: ChatCompletionResponse = resp.json().await?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|c| c.trim().to_string())
                .unwrap_or_default();
            if content.is_empty() {
                return Err(UpstreamError::MalformedReply("provider returned empty content".into()));
            }
            Ok(content)
        })
    }
}
