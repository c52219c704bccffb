//! Services the store needs from whatever is hosting it: a clipboard, a way
//! to choose files, and a way to ask the user a question. The CLI supplies
//! terminal versions; tests supply scripted ones.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Receives copied snippet text.
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> io::Result<()>;
}

/// Chooses a path for import or export. `None` means the user cancelled.
pub trait PathPicker {
    fn pick(&mut self, purpose: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Yes,
    No,
    Cancel,
}

/// Asks a yes/no/cancel question.
pub trait Confirm {
    fn ask(&mut self, question: &str) -> ConfirmChoice;
}

// ---------------------------------------------------------------------------
// Terminal implementations
// ---------------------------------------------------------------------------

/// Writes copied text to stdout, for piping into a system clipboard tool.
#[derive(Debug, Default)]
pub struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            out.write_all(b"\n")?;
        }
        out.flush()
    }
}

/// A path given on the command line.
#[derive(Debug, Clone)]
pub struct ArgPath(pub Option<PathBuf>);

impl PathPicker for ArgPath {
    fn pick(&mut self, _purpose: &str) -> Option<PathBuf> {
        self.0.take()
    }
}

/// Prompts on stderr and reads an answer from stdin, unless `assume_yes`.
/// End of input counts as cancel.
#[derive(Debug, Clone, Copy)]
pub struct TerminalConfirm {
    pub assume_yes: bool,
}

impl Confirm for TerminalConfirm {
    fn ask(&mut self, question: &str) -> ConfirmChoice {
        if self.assume_yes {
            return ConfirmChoice::Yes;
        }
        eprint!("{} [y/n/c] ", question);
        let _ = io::stderr().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => ConfirmChoice::Cancel,
            Ok(_) => parse_answer(&line),
        }
    }
}

fn parse_answer(line: &str) -> ConfirmChoice {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ConfirmChoice::Yes,
        "n" | "no" => ConfirmChoice::No,
        _ => ConfirmChoice::Cancel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), ConfirmChoice::Yes);
        assert_eq!(parse_answer(" YES "), ConfirmChoice::Yes);
        assert_eq!(parse_answer("n"), ConfirmChoice::No);
        assert_eq!(parse_answer(""), ConfirmChoice::Cancel);
        assert_eq!(parse_answer("later"), ConfirmChoice::Cancel);
    }

    #[test]
    fn test_arg_path_is_used_once() {
        let mut picker = ArgPath(Some(PathBuf::from("deeds.json")));
        assert_eq!(picker.pick("export"), Some(PathBuf::from("deeds.json")));
        assert_eq!(picker.pick("export"), None);
    }

    #[test]
    fn test_assume_yes() {
        let mut confirm = TerminalConfirm { assume_yes: true };
        assert_eq!(confirm.ask("Delete?"), ConfirmChoice::Yes);
    }
}
