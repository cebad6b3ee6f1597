use std::sync::Arc;
use std::time::Duration;

use crate::config::{InferenceConfig, InferenceProvider};
use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::llm::provider::InferenceClient;
use crate::llm::providers::gemini::GeminiClient;
use crate::llm::providers::openai_compatible::OpenAiCompatibleClient;

/// Builds the configured inference client.
///
/// API keys come from `GEMINI_API_KEY` / `SCREENCUE_API_KEY`, then from
/// `config.toml`. A missing key is not an error here; the Gemini client reports
/// it when a run reaches the inference stage.
pub fn client_from_config(config: &InferenceConfig) -> ScreenCueResult<Arc<dyn InferenceClient>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
        .build()
        .map_err(|e| ScreenCueError::Config(format!("failed to build HTTP client: {e}")))?;
    let api_key = config.resolve_api_key();

    let client: Arc<dyn InferenceClient> = match config.provider {
        InferenceProvider::Gemini => {
            Arc::new(GeminiClient::new(config.api_base.clone(), api_key, http))
        }
        InferenceProvider::OpenaiCompatible => Arc::new(OpenAiCompatibleClient::new(
            config.api_base.clone(),
            api_key,
            http,
        )),
    };
    tracing::debug!(
        provider = client.name(),
        api_base = %config.api_base,
        "inference client ready"
    );
    Ok(client)
}
