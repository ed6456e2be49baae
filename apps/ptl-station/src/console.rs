//! # Console Commands
//!
//! Every input line is either an operator command or a scanned barcode.
//!
//! | Line              | Command   |
//! |-------------------|-----------|
//! | `status`          | Status    |
//! | `reset`           | Reset     |
//! | `reload`          | Reload    |
//! | `exit`, `quit`, `q` | Exit    |
//! | `help`, `?`       | Help      |
//! | blank             | Blank     |
//! | anything else     | Scan      |
//!
//! Matching is case-insensitive on the trimmed line.

/// Printed by `help`.
pub const HELP_TEXT: &str = "\
Scan a barcode to place the item in a basket.
Commands:
  status        show basket occupancy
  reset         empty every basket (asks for confirmation)
  reload        re-read the barcode limit file
  exit, quit, q write the report and stop
  help, ?       show this text";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Reset,
    Reload,
    Exit,
    Help,
    Blank,
    /// Raw scanner input, trimmed.
    Scan(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => ConsoleCommand::Blank,
            "status" => ConsoleCommand::Status,
            "reset" => ConsoleCommand::Reset,
            "reload" => ConsoleCommand::Reload,
            "exit" | "quit" | "q" => ConsoleCommand::Exit,
            "help" | "?" => ConsoleCommand::Help,
            _ => ConsoleCommand::Scan(trimmed.to_string()),
        }
    }
}

/// Whether an answer to a yes/no prompt means yes.
pub fn is_confirmation(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "si" | "y" | "yes"
    )
}
