use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::llm::provider::InferenceClient;
use crate::llm::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InferenceRequest,
    Part,
};

/// Google Gemini `generateContent` over REST.
pub struct GeminiClient {
    api_base: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_base: String, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            api_base,
            api_key,
            client,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!(
            "{}/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model_path
        )
    }
}

pub(crate) fn build_body(request: &InferenceRequest) -> GenerateContentRequest {
    let image_b64 = base64::engine::general_purpose::STANDARD.encode(&request.image_png);
    let system_instruction = (!request.system_instruction.trim().is_empty()).then(|| Content {
        role: None,
        parts: vec![Part::text(request.system_instruction.clone())],
    });
    GenerateContentRequest {
        system_instruction,
        contents: vec![Content {
            role: Some("user".into()),
            parts: vec![Part::png(image_b64), Part::text(request.prompt.clone())],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

/// Pulls `error.message` out of a Gemini error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &InferenceRequest) -> ScreenCueResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ScreenCueError::Inference("GEMINI_API_KEY not set in environment.".into())
            })?;

        let url = self.endpoint(&request.model);
        tracing::debug!(
            model = %request.model,
            image_bytes = request.image_png.len(),
            temperature = request.temperature,
            max_output_tokens = request.max_output_tokens,
            "sending Gemini request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&build_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(ScreenCueError::Inference(format!(
                "Error calling Gemini API: {}: {}",
                status,
                error_message(&err_body)
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.text();
        tracing::info!(
            model = %request.model,
            text_len = text.len(),
            finish_reason = ?parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()),
            "Gemini response received"
        );
        Ok(text)
    }
}
