use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreenCueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An external tool is not installed. The message names it and how to get it.
    #[error("'{tool}' not found. {hint}")]
    ToolNotFound { tool: String, hint: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Region selection cancelled")]
    SelectionCancelled,

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Crop error: {0}")]
    Crop(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("An automation run is already active; cancel it and wait before starting another")]
    EngineBusy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl serde::Serialize for ScreenCueError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type ScreenCueResult<T> = Result<T, ScreenCueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_names_the_tool() {
        let err = ScreenCueError::ToolNotFound {
            tool: "gm".into(),
            hint: "Install GraphicsMagick.".into(),
        };
        assert_eq!(err.to_string(), "'gm' not found. Install GraphicsMagick.");
    }

    #[test]
    fn serializes_as_display_string() {
        let json = serde_json::to_string(&ScreenCueError::EngineBusy).unwrap();
        assert!(json.contains("already active"));
    }
}
