//! Line commands standing in for the gesture sensor and buttons.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Shake gesture.
    Shake,
    /// Button A.
    ButtonA,
    Status,
}

pub fn parse_console_command(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "shake" | "gesture" => Some(ConsoleCommand::Shake),
        "a" | "button" => Some(ConsoleCommand::ButtonA),
        "status" => Some(ConsoleCommand::Status),
        _ => None,
    }
}
