use crate::error::{AppError, ErrorDetail, UpstreamError};
use crate::models::{extract_json, validate_quiz, GenerateQuizRequest, GenerateQuizResponse, Quiz};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};
use validator::Validate;

pub fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

pub async fn health() -> &'static str {
    "ok"
}

fn upstream_failure(err: UpstreamError, details: Vec<ErrorDetail>, req_id: &str) -> AppError {
    warn!(request_id = %req_id, error = %err, "quiz generation failed upstream");
    AppError::from_upstream(&err, req_id).with_details(details)
}

/// Turns raw model output into a checked quiz. Anything unusable is an
/// upstream failure, never a silent fallback.
fn decode_quiz(state: &AppState, raw: &str, fallback_topic: &str, req_id: &str) -> Result<Quiz, AppError> {
    let json_value = extract_json(raw).map_err(|e| {
        upstream_failure(
            UpstreamError::MalformedReply(format!("reply is not valid json: {}", e)),
            Vec::new(),
            req_id,
        )
    })?;

    if state.quiz_schema.validate(&json_value).is_err() {
        let details = state
            .quiz_schema
            .iter_errors(&json_value)
            .map(|e| ErrorDetail {
                field: e.instance_path.to_string(),
                issue: e.to_string(),
            })
            .collect();
        return Err(upstream_failure(
            UpstreamError::MalformedReply("reply does not match quiz schema".into()),
            details,
            req_id,
        ));
    }

    let mut quiz: Quiz = serde_json::from_value(json_value).map_err(|e| {
        upstream_failure(
            UpstreamError::MalformedReply(format!("cannot decode quiz: {}", e)),
            Vec::new(),
            req_id,
        )
    })?;

    if let Err(issues) = validate_quiz(&quiz) {
        let details = issues
            .into_iter()
            .map(|i| ErrorDetail {
                field: i.field,
                issue: i.issue,
            })
            .collect();
        return Err(upstream_failure(
            UpstreamError::MalformedReply("quiz validation failed".into()),
            details,
            req_id,
        ));
    }

    if quiz.topic.trim().is_empty() {
        quiz.topic = fallback_topic.trim().to_string();
    }
    Ok(quiz)
}

pub async fn generate_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateQuizRequest>, JsonRejection>,
) -> Result<Json<GenerateQuizResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let Json(payload) = payload.map_err(|rejection| {
        AppError::new(rejection.status(), "INVALID_REQUEST", rejection.body_text(), req_id.clone())
    })?;

    if let Err(errors) = payload.validate() {
        let details = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ErrorDetail {
                    field: field.to_string(),
                    issue: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        return Err(AppError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            "invalid quiz parameters",
            req_id,
        )
        .with_details(details));
    }

    let client = state.ai_client.as_ref().map_err(|err| {
        warn!(request_id = %req_id, error = %err, "rejecting request: provider is not configured");
        AppError::from_config(err, req_id.clone())
    })?;

    let raw = client
        .generate_quiz_json(&payload)
        .await
        .map_err(|e| upstream_failure(e, Vec::new(), &req_id))?;

    let quiz = decode_quiz(&state, &raw, &payload.topic, &req_id)?;
    info!(
        request_id = %req_id,
        model = client.model(),
        questions = quiz.questions.len(),
        "quiz generated"
    );

    Ok(Json(GenerateQuizResponse {
        quiz,
        model: client.model().to_string(),
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
