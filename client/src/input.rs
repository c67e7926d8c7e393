//! Maps typed lines to client actions

use shared::Direction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Text to send to the server as a command.
    Move(String),
    Quit,
    /// Blank line, nothing to do.
    None,
}

/// Translates one line of user input.
///
/// Vi and WASD keys are accepted as shorthands for the four directions. Any
/// other text is passed through untouched and left for the server to judge.
pub fn parse_line(line: &str) -> InputAction {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return InputAction::None;
    }

    let direction = match trimmed.to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => return InputAction::Quit,
        "w" | "k" => Some(Direction::Up),
        "s" | "j" => Some(Direction::Down),
        "a" | "h" => Some(Direction::Left),
        "d" | "l" => Some(Direction::Right),
        other => Direction::parse(other),
    };

    match direction {
        Some(direction) => InputAction::Move(direction.as_str().to_string()),
        None => InputAction::Move(trimmed.to_string()),
    }
}
