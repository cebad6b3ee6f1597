use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::llm::provider::InferenceClient;
use crate::llm::types::{ChatMessage, ContentPart, ImageUrl, InferenceRequest, MessageContent};

/// Any `/chat/completions` endpoint that accepts `image_url` content parts.
pub struct OpenAiCompatibleClient {
    api_base: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(api_base: String, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            api_base,
            api_key,
            client,
        }
    }
}

fn build_messages(request: &InferenceRequest) -> Vec<ChatMessage> {
    let image_b64 = base64::engine::general_purpose::STANDARD.encode(&request.image_png);
    let mut messages = Vec::with_capacity(2);
    if !request.system_instruction.trim().is_empty() {
        messages.push(ChatMessage {
            role: "system".into(),
            content: MessageContent::Text(request.system_instruction.clone()),
        });
    }
    messages.push(ChatMessage {
        role: "user".into(),
        content: MessageContent::Parts(vec![
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/png;base64,{image_b64}"),
                },
            },
            ContentPart::Text {
                text: request.prompt.clone(),
            },
        ]),
    });
    messages
}

#[async_trait]
impl InferenceClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn generate(&self, request: &InferenceRequest) -> ScreenCueResult<String> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": build_messages(request),
            "stream": false,
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens,
        });

        tracing::debug!(
            api_base = %self.api_base,
            model = %request.model,
            image_bytes = request.image_png.len(),
            "sending chat completion request"
        );

        let mut builder = self.client.post(&self.api_base).json(&body);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(ScreenCueError::Inference(format!(
                "Error calling inference API: {}: {}",
                status,
                err_body.trim()
            )));
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        tracing::info!(model = %request.model, content_len = content.len(), "chat completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InferenceRequest {
        InferenceRequest {
            image_png: vec![0xff],
            prompt: "What is shown?".into(),
            model: "qwen2-vl".into(),
            system_instruction: String::new(),
            temperature: 0.2,
            max_output_tokens: 64,
        }
    }

    #[test]
    fn system_message_only_when_instruction_present() {
        let msgs = build_messages(&request());
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, "user");

        let mut req = request();
        req.system_instruction = "Be brief".into();
        let msgs = build_messages(&req);
        assert_eq!(msgs[0].role, "system");
        let json = serde_json::to_value(&msgs[1]).unwrap();
        assert_eq!(json["content"][0]["type"], "image_url");
        assert!(json["content"][0]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn reads_first_choice_content() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"A cat"}}]}"#)
            .create_async()
            .await;

        let client = OpenAiCompatibleClient::new(
            format!("{}/v1/chat/completions", server.url()),
            Some("secret".into()),
            reqwest::Client::new(),
        );
        assert_eq!(client.generate(&request()).await.unwrap(), "A cat");
    }

    #[tokio::test]
    async fn server_error_is_inference_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = OpenAiCompatibleClient::new(
            format!("{}/v1/chat/completions", server.url()),
            None,
            reqwest::Client::new(),
        );
        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(err, ScreenCueError::Inference(_)));
        assert!(err.to_string().contains("overloaded"));
    }
}
