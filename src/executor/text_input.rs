// Keystroke expansion for character-by-character typing.
// Line breaks and tabs become key presses; everything else is typed as text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Return,
    Tab,
}

/// Splits `text` into the keystrokes sent one at a time. `\r\n` counts as a single Return.
pub fn keystrokes(text: &str) -> impl Iterator<Item = Keystroke> + '_ {
    let mut chars = text.chars().peekable();
    std::iter::from_fn(move || {
        let c = chars.next()?;
        Some(match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                Keystroke::Return
            }
            '\n' => Keystroke::Return,
            '\t' => Keystroke::Tab,
            other => Keystroke::Char(other),
        })
    })
}
