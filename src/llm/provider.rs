use async_trait::async_trait;

use crate::errors::ScreenCueResult;
use crate::llm::types::InferenceRequest;

/// Remote vision-language model. Implementations return the generated text,
/// possibly empty; interpreting empty or error-shaped text is the caller's job.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &InferenceRequest) -> ScreenCueResult<String>;
}
