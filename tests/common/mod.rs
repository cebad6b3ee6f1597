#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use screencue::action_engine::capture_sequence::Collaborators;
use screencue::errors::{ScreenCueError, ScreenCueResult};
use screencue::executor::input::{ClickKind, InputInjector, MouseButton};
use screencue::llm::provider::InferenceClient;
use screencue::llm::types::InferenceRequest;
use screencue::perception::traits::{Cropper, ScreenCapturer};
use screencue::perception::types::Point;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    SwitchFocus,
    Type { text: String, delay: Duration },
    Click { at: Option<Point>, button: MouseButton, kind: ClickKind },
    SamplePointer,
}

/// Records every input call. The pointer sits at `pointer`.
pub struct RecordingInjector {
    pub pointer: Point,
    events: Mutex<Vec<InputEvent>>,
}

impl RecordingInjector {
    pub fn new(pointer: Point) -> Arc<Self> {
        Arc::new(Self {
            pointer,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                InputEvent::Type { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<Option<Point>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                InputEvent::Click { at, .. } => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn pointer_samples(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == InputEvent::SamplePointer)
            .count()
    }

    fn push(&self, event: InputEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl InputInjector for RecordingInjector {
    async fn switch_focus(&self) -> ScreenCueResult<()> {
        self.push(InputEvent::SwitchFocus);
        Ok(())
    }

    async fn type_text(&self, text: &str, per_char_delay: Duration) -> ScreenCueResult<()> {
        self.push(InputEvent::Type {
            text: text.to_string(),
            delay: per_char_delay,
        });
        Ok(())
    }

    async fn click(&self, at: Option<Point>, button: MouseButton, kind: ClickKind) -> ScreenCueResult<()> {
        self.push(InputEvent::Click { at, button, kind });
        Ok(())
    }

    async fn pointer_position(&self) -> ScreenCueResult<Point> {
        self.push(InputEvent::SamplePointer);
        Ok(self.pointer)
    }
}

/// Writes a placeholder file, or fails like a missing capture tool.
/// With a gate set, each capture waits for `release` after signalling `entered`.
#[derive(Default)]
pub struct FakeCapturer {
    pub fail: bool,
    pub gate: Option<Gate>,
    pub calls: AtomicUsize,
}

#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl FakeCapturer {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Gate::default()),
            ..Self::default()
        })
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("capturer is not gated")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenCapturer for FakeCapturer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn capture(&self, output: &Path) -> ScreenCueResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail {
            return Err(ScreenCueError::ToolNotFound {
                tool: "spectacle".into(),
                hint: "Install it for KDE screenshot functionality.".into(),
            });
        }
        tokio::fs::write(output, b"full").await?;
        Ok(())
    }
}

/// Records `(input, geometry, output)` and writes a small PNG-ish payload.
#[derive(Default)]
pub struct FakeCropper {
    pub fail: bool,
    calls: Mutex<Vec<(PathBuf, String, PathBuf)>>,
}

impl FakeCropper {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(PathBuf, String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Cropper for FakeCropper {
    fn name(&self) -> &str {
        "fake"
    }

    async fn crop(&self, input: &Path, geometry: &str, output: &Path) -> ScreenCueResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((input.to_path_buf(), geometry.to_string(), output.to_path_buf()));
        if self.fail {
            return Err(ScreenCueError::ToolFailed {
                tool: "gm".into(),
                message: "geometry does not contain image".into(),
            });
        }
        tokio::fs::write(output, b"cropped").await?;
        Ok(())
    }
}

pub enum Reply {
    Text(String),
    Fail(String),
    Panic,
}

/// Answers every request with the same scripted reply.
pub struct ScriptedInference {
    reply: Reply,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedInference {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::new(Reply::Text(text.to_string()))
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &InferenceRequest) -> ScreenCueResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => Err(ScreenCueError::Inference(message.clone())),
            Reply::Panic => panic!("inference backend exploded"),
        }
    }
}

pub struct Mocks {
    pub injector: Arc<RecordingInjector>,
    pub capturer: Arc<FakeCapturer>,
    pub cropper: Arc<FakeCropper>,
    pub inference: Arc<ScriptedInference>,
}

impl Mocks {
    pub fn new(capturer: Arc<FakeCapturer>, cropper: Arc<FakeCropper>, inference: Arc<ScriptedInference>) -> Self {
        Self {
            injector: RecordingInjector::new(Point::new(0, 0)),
            capturer,
            cropper,
            inference,
        }
    }

    pub fn happy(reply: &str) -> Self {
        Self::new(FakeCapturer::ok(), FakeCropper::ok(), ScriptedInference::text(reply))
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            injector: self.injector.clone(),
            capturer: self.capturer.clone(),
            cropper: self.cropper.clone(),
            inference: self.inference.clone(),
        }
    }
}
