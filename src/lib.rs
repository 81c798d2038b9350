pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod routes;
pub mod state;

use std::sync::Arc;
use tracing::{info, warn};

pub fn build_state(settings: config::Settings) -> anyhow::Result<state::AppState> {
    let schema_raw = include_str!("../contracts/quiz.schema.json");
    let schema: serde_json::Value = serde_json::from_str(schema_raw)?;
    let quiz_schema = jsonschema::draft202012::new(&schema)
        .map_err(|e| anyhow::anyhow!("quiz schema does not compile: {}", e))?;

    let ai_client: Result<Arc<dyn state::AiQuizClient>, error::ConfigError> = if settings.use_mock {
        info!("USE_MOCK is enabled, quizzes are synthesized locally");
        Ok(Arc::new(state::MockAiClient))
    } else {
        match settings.upstream() {
            Ok(target) => {
                info!(
                    provider = %target.provider,
                    model = %target.model,
                    "forwarding quiz generation upstream"
                );
                Ok(Arc::new(llm::ChatCompletionsClient::new(target, settings.request_timeout)?))
            }
            Err(err) => {
                warn!("{}; quiz generation will fail until this is fixed", err);
                Err(err)
            }
        }
    };
    Ok(state::AppState::new(settings, ai_client, quiz_schema))
}
