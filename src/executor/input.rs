// Synthetic keyboard and mouse input.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use serde::{Deserialize, Serialize};

use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::executor::text_input::{keystrokes, Keystroke};
use crate::perception::types::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

impl FromStr for MouseButton {
    type Err = ScreenCueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "left" => Ok(Self::Primary),
            "secondary" | "right" => Ok(Self::Secondary),
            "middle" => Ok(Self::Middle),
            other => Err(ScreenCueError::InvalidRequest(format!(
                "unknown mouse button '{other}' (expected left, right or middle)"
            ))),
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primary => "left",
            Self::Secondary => "right",
            Self::Middle => "middle",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    #[default]
    Single,
    Double,
}

impl FromStr for ClickKind {
    type Err = ScreenCueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            other => Err(ScreenCueError::InvalidRequest(format!(
                "unknown click kind '{other}' (expected single or double)"
            ))),
        }
    }
}

/// Synthetic input driver used by the automation stages.
#[async_trait]
pub trait InputInjector: Send + Sync {
    /// Switches to the previously focused window (Alt+Tab).
    async fn switch_focus(&self) -> ScreenCueResult<()>;

    /// Types `text` one keystroke at a time, waiting `per_char_delay` after each.
    async fn type_text(&self, text: &str, per_char_delay: Duration) -> ScreenCueResult<()>;

    /// Clicks at `at`, or wherever the pointer currently is when `None`.
    async fn click(
        &self,
        at: Option<Point>,
        button: MouseButton,
        kind: ClickKind,
    ) -> ScreenCueResult<()>;

    async fn pointer_position(&self) -> ScreenCueResult<Point>;
}

/// `enigo`-backed injector. A connection is opened per call on the blocking pool,
/// so the injector itself stays `Send + Sync`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnigoInjector;

impl EnigoInjector {
    pub fn new() -> Self {
        Self
    }
}

fn connect() -> ScreenCueResult<Enigo> {
    Enigo::new(&Settings::default())
        .map_err(|e| ScreenCueError::Input(format!("failed to initialize input backend: {e}")))
}

fn input_err(what: &str) -> impl Fn(enigo::InputError) -> ScreenCueError + '_ {
    move |e| ScreenCueError::Input(format!("{what}: {e}"))
}

fn to_enigo(button: MouseButton) -> Button {
    match button {
        MouseButton::Primary => Button::Left,
        MouseButton::Secondary => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

async fn blocking<T, F>(f: F) -> ScreenCueResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ScreenCueResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ScreenCueError::Input(format!("input worker failed: {e}")))?
}

#[async_trait]
impl InputInjector for EnigoInjector {
    async fn switch_focus(&self) -> ScreenCueResult<()> {
        blocking(|| {
            let mut enigo = connect()?;
            enigo
                .key(Key::Alt, Direction::Press)
                .map_err(input_err("failed to hold Alt"))?;
            let tab = enigo.key(Key::Tab, Direction::Click);
            let _ = enigo.key(Key::Alt, Direction::Release);
            tab.map_err(input_err("failed to press Tab"))?;
            tracing::debug!("focus switched (alt+tab)");
            Ok(())
        })
        .await
    }

    async fn type_text(&self, text: &str, per_char_delay: Duration) -> ScreenCueResult<()> {
        let text = text.to_owned();
        blocking(move || {
            let mut enigo = connect()?;
            let mut typed = 0usize;
            for stroke in keystrokes(&text) {
                match stroke {
                    Keystroke::Char(c) => {
                        let mut buf = [0u8; 4];
                        enigo
                            .text(c.encode_utf8(&mut buf))
                            .map_err(input_err("failed to type text"))?;
                    }
                    Keystroke::Return => enigo
                        .key(Key::Return, Direction::Click)
                        .map_err(input_err("failed to press Return"))?,
                    Keystroke::Tab => enigo
                        .key(Key::Tab, Direction::Click)
                        .map_err(input_err("failed to press Tab"))?,
                }
                typed += 1;
                if !per_char_delay.is_zero() {
                    std::thread::sleep(per_char_delay);
                }
            }
            tracing::debug!(keystrokes = typed, delay_ms = per_char_delay.as_millis() as u64, "text typed");
            Ok(())
        })
        .await
    }

    async fn click(
        &self,
        at: Option<Point>,
        button: MouseButton,
        kind: ClickKind,
    ) -> ScreenCueResult<()> {
        blocking(move || {
            let mut enigo = connect()?;
            if let Some(p) = at {
                enigo
                    .move_mouse(p.x, p.y, Coordinate::Abs)
                    .map_err(input_err("failed to move pointer"))?;
            }
            let presses = match kind {
                ClickKind::Single => 1,
                ClickKind::Double => 2,
            };
            for _ in 0..presses {
                enigo
                    .button(to_enigo(button), Direction::Click)
                    .map_err(input_err("failed to click"))?;
            }
            Ok(())
        })
        .await
    }

    async fn pointer_position(&self) -> ScreenCueResult<Point> {
        blocking(|| {
            let enigo = connect()?;
            let (x, y) = enigo
                .location()
                .map_err(input_err("failed to read pointer position"))?;
            Ok(Point::new(x, y))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_button_aliases() {
        assert_eq!("left".parse::<MouseButton>().unwrap(), MouseButton::Primary);
        assert_eq!("RIGHT".parse::<MouseButton>().unwrap(), MouseButton::Secondary);
        assert_eq!("middle".parse::<MouseButton>().unwrap(), MouseButton::Middle);
        assert!("thumb".parse::<MouseButton>().is_err());
    }

    #[test]
    fn parses_click_kind() {
        assert_eq!("double".parse::<ClickKind>().unwrap(), ClickKind::Double);
        assert!("triple".parse::<ClickKind>().is_err());
    }
}
