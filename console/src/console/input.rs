//! Operator input

use crate::console::events::{ControlKind, OutboundCommand};

/// One line typed by the operator, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Command(OutboundCommand),
    /// Empty the local log window
    Clear,
    Quit,
}

/// Parse an input line.
///
/// `/start`, `/stop`, `/restart` and `/kill` are lifecycle actions, `/clear`
/// and `/quit` act locally, everything else is sent as a shell command.
/// Blank lines yield nothing. `//text` sends `/text` verbatim.
///
/// Shell commands keep their surrounding whitespace; only the line ending
/// is removed.
pub fn parse_input(line: &str) -> Result<Option<UserInput>, String> {
    let raw = line.trim_end_matches(['\r', '\n']);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.starts_with("//") {
        return Ok(Some(shell(raw.replacen("//", "/", 1))));
    }

    let Some(word) = trimmed.strip_prefix('/') else {
        return Ok(Some(shell(raw.to_string())));
    };

    let input = match word.to_lowercase().as_str() {
        "clear" | "cls" => UserInput::Clear,
        "quit" | "exit" | "q" => UserInput::Quit,
        other => UserInput::Command(OutboundCommand::ControlAction {
            kind: other.parse::<ControlKind>()?,
        }),
    };
    Ok(Some(input))
}

fn shell(text: String) -> UserInput {
    UserInput::Command(OutboundCommand::ShellCommand { text })
}

/// Usage text printed on startup
pub const HELP: &str =
    "Type a command to run it on the server. /start /stop /restart /kill /clear /quit";
