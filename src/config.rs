use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::executor::input::{ClickKind, MouseButton};

const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "screencue";

/// Overrides the config file search when set.
pub const ENV_CONFIG_PATH: &str = "SCREENCUE_CONFIG";

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an advanced language model designed to evaluate and respond to questions about advertisements. \
When presented with a description or query about an ad, analyze it and provide responses based on the following guidelines:

1. Emotions and Reactions: Explain what might go through someone's mind when viewing the ad and why it might evoke certain feelings.
2. Key Descriptive Words: Provide two words that best encapsulate the reaction to the ad, ensuring they are relevant and insightful.
3. Appropriateness and Impact: Evaluate whether the ad is suitable for platforms like Facebook or Instagram, and discuss if elements could be offensive, misleading, or inappropriate.
4. Deeper Analysis: Consider the advertiser's image, analyze the prominence and presentation of products in the ad, and reflect on social reactions.

Your answer should be one sentence, short, and use informal, natural language.";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub automation: AutomationDefaults,
    #[serde(default)]
    pub clicker: ClickerDefaults,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub timings: TimingsConfig,
}

/// Default values for every field of a capture automation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutomationDefaults {
    pub initial_text: String,
    /// Delay between keystrokes of the initial text (ms).
    pub initial_delay_ms: u64,
    pub prompt: String,
    /// Delay between keystrokes of the model response (ms).
    pub response_delay_ms: u64,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub system_prompt: String,
}

impl Default for AutomationDefaults {
    fn default() -> Self {
        Self {
            initial_text: "11115".into(),
            initial_delay_ms: 800,
            prompt: "In 8 words or less, why do you feel this is a positive ad for the platform?"
                .into(),
            response_delay_ms: 80,
            model: "models/gemini-2.0-flash".into(),
            temperature: 1.0,
            max_output_tokens: 20,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClickerDefaults {
    /// 0 clicks forever.
    pub count: u64,
    pub interval_secs: f64,
    pub button: MouseButton,
    pub kind: ClickKind,
    pub lock_coordinates: bool,
}

impl Default for ClickerDefaults {
    fn default() -> Self {
        Self {
            count: 0,
            interval_secs: 10.0,
            button: MouseButton::Primary,
            kind: ClickKind::Single,
            lock_coordinates: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBackend {
    #[default]
    Spectacle,
    Xcap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropBackend {
    #[default]
    Gm,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ToolsConfig {
    pub capture: CaptureBackend,
    pub crop: CropBackend,
    /// Where run artifacts are written. Falls back to the system temp dir.
    pub artifact_dir: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InferenceProvider {
    #[default]
    Gemini,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    pub provider: InferenceProvider,
    pub api_base: String,
    /// Optional key stored in config.toml (falls back to `GEMINI_API_KEY` / `SCREENCUE_API_KEY`).
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: InferenceProvider::Gemini,
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key: None,
            request_timeout_secs: 120,
        }
    }
}

impl InferenceConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        let env_name = match self.provider {
            InferenceProvider::Gemini => "GEMINI_API_KEY",
            InferenceProvider::OpenaiCompatible => "SCREENCUE_API_KEY",
        };
        std::env::var(env_name)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

/// Fixed waits used by the automation sequences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingsConfig {
    /// Wait after the focus switch before typing the initial text.
    pub focus_settle_ms: u64,
    /// Wait before injecting the model response, so the user can refocus.
    pub response_settle_ms: u64,
    pub countdown_ticks: u32,
    pub countdown_tick_ms: u64,
    /// Granularity at which the click interval polls for cancellation.
    pub poll_slice_ms: u64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            focus_settle_ms: 500,
            response_settle_ms: 2000,
            countdown_ticks: 3,
            countdown_tick_ms: 1000,
            poll_slice_ms: 100,
        }
    }
}

impl TimingsConfig {
    /// No settle or tick waits; the countdown still runs its ticks.
    pub fn immediate() -> Self {
        Self {
            focus_settle_ms: 0,
            response_settle_ms: 0,
            countdown_ticks: 3,
            countdown_tick_ms: 0,
            poll_slice_ms: 1,
        }
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn response_settle(&self) -> Duration {
        Duration::from_millis(self.response_settle_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.poll_slice_ms.max(1))
    }
}

fn find_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(ENV_CONFIG_PATH) {
        tracing::debug!(path = %explicit, "config path taken from environment");
        return Some(PathBuf::from(explicit));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join(CONFIG_FILE);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in working directory");
            return Some(candidate);
        }
    }

    let candidate = user_config_path()?;
    candidate.exists().then_some(candidate)
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// Loads `config.toml`, or the defaults when no file exists anywhere on the search path.
pub fn load_config() -> ScreenCueResult<AppConfig> {
    match find_config_path() {
        Some(path) => load_config_from(&path),
        None => {
            tracing::info!("no config.toml found; using defaults");
            Ok(AppConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> ScreenCueResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(
        path = %path.display(),
        provider = ?config.inference.provider,
        capture = ?config.tools.capture,
        "config loaded"
    );
    Ok(config)
}

/// Saves to the file that was loaded, or to the per-user config dir.
pub fn save_config(config: &AppConfig) -> ScreenCueResult<PathBuf> {
    let path = find_config_path()
        .or_else(user_config_path)
        .ok_or_else(|| ScreenCueError::Config("no writable config location".into()))?;
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> ScreenCueResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
