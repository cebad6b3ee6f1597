use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action_engine::sequence::{Sequence, StageOutcome};
use crate::action_engine::state::{ErrorKind, RunResult, RunState};
use crate::config::{AutomationDefaults, TimingsConfig};
use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::executor::input::{ClickKind, InputInjector, MouseButton};
use crate::llm::provider::InferenceClient;
use crate::llm::types::InferenceRequest;
use crate::perception::traits::{Cropper, ScreenCapturer};
use crate::perception::types::{Point, Region};

/// Typed in place of an empty model response.
pub const EMPTY_RESPONSE_FALLBACK: &str = "No response generated";

/// Where the model response is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionPoint {
    /// Type into whatever has focus after the settle delay.
    #[default]
    CurrentFocus,
    /// Click here first, then type.
    At(Point),
}

/// Parameters of one capture automation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub initial_text: String,
    pub initial_delay: Duration,
    pub region: Region,
    pub insertion: InsertionPoint,
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub system_instruction: String,
    pub response_delay: Duration,
}

impl ActionRequest {
    pub fn from_defaults(defaults: &AutomationDefaults, region: Region, insertion: InsertionPoint) -> Self {
        Self {
            initial_text: defaults.initial_text.clone(),
            initial_delay: Duration::from_millis(defaults.initial_delay_ms),
            region,
            insertion,
            prompt: defaults.prompt.clone(),
            model: defaults.model.clone(),
            temperature: defaults.temperature,
            max_output_tokens: defaults.max_output_tokens,
            system_instruction: defaults.system_prompt.clone(),
            response_delay: Duration::from_millis(defaults.response_delay_ms),
        }
    }

    pub fn validate(&self) -> ScreenCueResult<()> {
        if self.region.width == 0 || self.region.height == 0 {
            return Err(ScreenCueError::InvalidRequest(format!(
                "capture region must have a non-zero size, got {}",
                self.region
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ScreenCueError::InvalidRequest(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(ScreenCueError::InvalidRequest(
                "max output tokens must be at least 1".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ScreenCueError::InvalidRequest("model must not be empty".into()));
        }
        Ok(())
    }

    fn inference_request(&self, image_png: Vec<u8>) -> InferenceRequest {
        InferenceRequest {
            image_png,
            prompt: self.prompt.clone(),
            model: self.model.clone(),
            system_instruction: self.system_instruction.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// External collaborators a capture run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub injector: Arc<dyn InputInjector>,
    pub capturer: Arc<dyn ScreenCapturer>,
    pub cropper: Arc<dyn Cropper>,
    pub inference: Arc<dyn InferenceClient>,
}

/// Applies the response conventions: an exactly empty text becomes
/// [`EMPTY_RESPONSE_FALLBACK`]; text starting with "error" in any case is a failure.
pub fn interpret_response(text: String) -> Result<String, String> {
    if text.is_empty() {
        return Ok(EMPTY_RESPONSE_FALLBACK.to_string());
    }
    let is_error = text
        .get(..5)
        .is_some_and(|head| head.eq_ignore_ascii_case("error"));
    if is_error {
        Err(text)
    } else {
        Ok(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    SwitchFocus,
    TypeInitialText,
    CaptureScreen,
    CropRegion,
    Infer,
    Settle { response: String },
    TypeResponse { response: String },
    Finished,
}

/// Focus switch, initial typing, capture, crop, inference and response injection.
pub struct CaptureAutomationSequence {
    request: ActionRequest,
    collaborators: Collaborators,
    timings: TimingsConfig,
    artifact_dir: PathBuf,
    stage: Stage,
    full_capture: Option<PathBuf>,
    cropped: Option<PathBuf>,
}

impl CaptureAutomationSequence {
    pub fn new(
        request: ActionRequest,
        collaborators: Collaborators,
        timings: TimingsConfig,
        artifact_dir: PathBuf,
    ) -> ScreenCueResult<Self> {
        request.validate()?;
        Ok(Self {
            request,
            collaborators,
            timings,
            artifact_dir,
            stage: Stage::SwitchFocus,
            full_capture: None,
            cropped: None,
        })
    }

    pub fn request(&self) -> &ActionRequest {
        &self.request
    }

    fn artifact_path(&self, prefix: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
        self.artifact_dir.join(format!("{prefix}_{stamp}.png"))
    }

    async fn capture(&mut self, run: &mut RunState) -> ScreenCueResult<StageOutcome> {
        let path = self.artifact_path("full_screenshot");
        run.record_artifact(&path);
        tracing::info!(
            capturer = self.collaborators.capturer.name(),
            path = %path.display(),
            "capturing full screen"
        );
        if let Err(e) = self.collaborators.capturer.capture(&path).await {
            return Ok(StageOutcome::Finish(RunResult::failure(
                ErrorKind::CaptureUnavailable,
                e.to_string(),
            )));
        }
        self.full_capture = Some(path);
        self.stage = Stage::CropRegion;
        Ok(StageOutcome::Continue("Screen captured".into()))
    }

    async fn crop(&mut self, run: &mut RunState) -> ScreenCueResult<StageOutcome> {
        let input = self
            .full_capture
            .clone()
            .ok_or_else(|| ScreenCueError::Crop("no full screenshot to crop".into()))?;
        let output = self.artifact_path("cropped_screenshot");
        run.record_artifact(&output);
        let geometry = self.request.region.crop_geometry();
        tracing::info!(cropper = self.collaborators.cropper.name(), %geometry, "cropping capture");

        if let Err(e) = self.collaborators.cropper.crop(&input, &geometry, &output).await {
            return Ok(StageOutcome::Finish(RunResult::failure(
                ErrorKind::CropFailed,
                e.to_string(),
            )));
        }
        self.cropped = Some(output);
        self.stage = Stage::Infer;
        Ok(StageOutcome::Continue(format!("Cropped to {geometry}")))
    }

    async fn infer(&mut self) -> ScreenCueResult<StageOutcome> {
        let cropped = self
            .cropped
            .clone()
            .ok_or_else(|| ScreenCueError::Crop("no cropped image for inference".into()))?;
        let image_png = match read_artifact(&cropped).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(StageOutcome::Finish(RunResult::failure(
                    ErrorKind::CropFailed,
                    e.to_string(),
                )))
            }
        };

        let inference = &self.collaborators.inference;
        tracing::info!(client = inference.name(), model = %self.request.model, "requesting response");
        let text = match inference.generate(&self.request.inference_request(image_png)).await {
            Ok(text) => text,
            Err(e) => {
                return Ok(StageOutcome::Finish(RunResult::failure(
                    ErrorKind::InferenceFailed,
                    e.to_string(),
                )))
            }
        };

        match interpret_response(text) {
            Ok(response) => {
                let status = format!("Response received ({} chars)", response.chars().count());
                self.stage = Stage::Settle { response };
                Ok(StageOutcome::Continue(status))
            }
            Err(text) => Ok(StageOutcome::Finish(RunResult::failure(
                ErrorKind::InferenceFailed,
                text,
            ))),
        }
    }
}

async fn read_artifact(path: &Path) -> ScreenCueResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ScreenCueError::Crop(format!("cannot read {}: {e}", path.display())))
}

#[async_trait]
impl Sequence for CaptureAutomationSequence {
    fn name(&self) -> &'static str {
        "capture_automation"
    }

    fn stage_name(&self) -> &'static str {
        match self.stage {
            Stage::SwitchFocus => "switch_focus",
            Stage::TypeInitialText => "type_initial_text",
            Stage::CaptureScreen => "capture_screen",
            Stage::CropRegion => "crop_region",
            Stage::Infer => "infer",
            Stage::Settle { .. } => "settle",
            Stage::TypeResponse { .. } => "type_response",
            Stage::Finished => "finished",
        }
    }

    async fn advance(&mut self, run: &mut RunState) -> ScreenCueResult<StageOutcome> {
        match std::mem::replace(&mut self.stage, Stage::Finished) {
            Stage::SwitchFocus => {
                self.collaborators.injector.switch_focus().await?;
                tokio::time::sleep(self.timings.focus_settle()).await;
                self.stage = Stage::TypeInitialText;
                Ok(StageOutcome::Continue("Switched window focus".into()))
            }
            Stage::TypeInitialText => {
                self.collaborators
                    .injector
                    .type_text(&self.request.initial_text, self.request.initial_delay)
                    .await?;
                self.stage = Stage::CaptureScreen;
                Ok(StageOutcome::Continue("Typed initial text".into()))
            }
            Stage::CaptureScreen => self.capture(run).await,
            Stage::CropRegion => self.crop(run).await,
            Stage::Infer => self.infer().await,
            Stage::Settle { response } => {
                tokio::time::sleep(self.timings.response_settle()).await;
                self.stage = Stage::TypeResponse { response };
                Ok(StageOutcome::Continue("Ready to type response".into()))
            }
            Stage::TypeResponse { response } => {
                let injector = &self.collaborators.injector;
                if let InsertionPoint::At(point) = self.request.insertion {
                    tracing::debug!(%point, "clicking insertion point");
                    injector
                        .click(Some(point), MouseButton::Primary, ClickKind::Single)
                        .await?;
                }
                injector
                    .type_text(&response, self.request.response_delay)
                    .await?;
                Ok(StageOutcome::Finish(RunResult::success(self.cropped.clone())))
            }
            Stage::Finished => Err(ScreenCueError::InvalidRequest(
                "capture sequence advanced past its end".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ActionRequest {
        ActionRequest::from_defaults(
            &AutomationDefaults::default(),
            Region::new(100, 200, 300, 150),
            InsertionPoint::CurrentFocus,
        )
    }

    #[test]
    fn defaults_make_a_valid_request() {
        let req = request();
        assert!(req.validate().is_ok());
        assert_eq!(req.initial_text, "11115");
        assert_eq!(req.initial_delay, Duration::from_millis(800));
        assert_eq!(req.response_delay, Duration::from_millis(80));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut req = request();
        req.temperature = 2.5;
        assert!(req.validate().is_err());

        let mut req = request();
        req.temperature = f64::NAN;
        assert!(req.validate().is_err());

        let mut req = request();
        req.max_output_tokens = 0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.region.height = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_response_uses_fallback() {
        assert_eq!(interpret_response(String::new()).unwrap(), EMPTY_RESPONSE_FALLBACK);
        assert_eq!(interpret_response("  ".into()).unwrap(), "  ");
    }

    #[test]
    fn error_prefix_is_case_insensitive() {
        for text in ["Error: quota", "ERROR", "errors everywhere"] {
            assert_eq!(interpret_response(text.into()).unwrap_err(), text);
        }
        assert!(interpret_response(" Error with leading space".into()).is_ok());
        assert!(interpret_response("No error here".into()).is_ok());
        assert!(interpret_response("Érror".into()).is_ok());
    }
}
