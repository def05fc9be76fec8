//! External command handling via stdin.
//!
//! The headless launcher is driven by JSONL commands on stdin, one JSON object
//! per line with a `type` tag.
//!
//! # Protocol
//!
//! ```json
//! {"type": "selectFolder", "path": "~/scripts"}
//! {"type": "expand", "path": "/home/me"}
//! {"type": "collapse", "path": "/home/me"}
//! {"type": "selectScript", "name": "backup.py"}
//! {"type": "run"}
//! {"type": "stop"}
//! {"type": "toggleTheme"}
//! {"type": "selectInterpreter", "path": "/usr/bin/python3"}
//! {"type": "cancelInterpreter"}
//! {"type": "showTree"}
//! {"type": "quit"}
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! printf '%s\n' '{"type":"selectFolder","path":"~/scripts"}' \
//!     '{"type":"selectScript","name":"hello.py"}' '{"type":"run"}' | ./easy-launcher
//! ```

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use async_channel::Sender;

use crate::logging;

/// External commands that can be sent to the app via stdin
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExternalCommand {
    /// Reveal a folder in the tree and list its scripts
    SelectFolder { path: String },
    /// Open a tree node, loading its children on first use
    Expand { path: String },
    Collapse { path: String },
    /// Select a script in the current folder by file name
    SelectScript { name: String },
    /// Run the selected script
    Run,
    /// Stop the selected script
    Stop,
    ToggleTheme,
    /// Validate and save an interpreter, or answer a pending interpreter prompt
    SelectInterpreter { path: String },
    /// Decline a pending interpreter prompt
    CancelInterpreter,
    /// Print the visible tree rows
    ShowTree,
    Quit,
}

/// What the stdin listener posts to the UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinEvent {
    Command(ExternalCommand),
    /// stdin reached EOF or failed
    Closed,
}

/// Parse one protocol line; blank lines yield `None`
pub fn parse_command(line: &str) -> Option<Result<ExternalCommand, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str::<ExternalCommand>(line))
}

/// Read commands from `reader` until EOF, forwarding them to `tx`
///
/// Unparseable lines are logged and skipped. `StdinEvent::Closed` is sent last.
pub fn read_commands<R, E>(reader: R, tx: &Sender<E>)
where
    R: BufRead,
    E: From<StdinEvent>,
{
    for line in reader.lines() {
        match line {
            Ok(line) => match parse_command(&line) {
                Some(Ok(cmd)) => {
                    logging::log("STDIN", &format!("Parsed command: {:?}", cmd));
                    if tx.send_blocking(StdinEvent::Command(cmd).into()).is_err() {
                        logging::log("STDIN", "Command channel closed, exiting");
                        return;
                    }
                }
                Some(Err(e)) => {
                    logging::log("STDIN", &format!("Failed to parse command: {}", e));
                }
                None => {}
            },
            Err(e) => {
                logging::log("STDIN", &format!("Error reading stdin: {}", e));
                break;
            }
        }
    }
    let _ = tx.send_blocking(StdinEvent::Closed.into());
}

/// Start a thread that forwards stdin commands into the UI channel
pub fn start_stdin_listener<E>(tx: Sender<E>) -> std::io::Result<JoinHandle<()>>
where
    E: From<StdinEvent> + Send + 'static,
{
    thread::Builder::new()
        .name("stdin-listener".to_string())
        .spawn(move || {
            logging::log("STDIN", "External command listener started");
            let stdin = std::io::stdin();
            read_commands(stdin.lock(), &tx);
            logging::log("STDIN", "External command listener exiting");
        })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_select_folder_deserialization() {
        let json = r#"{"type": "selectFolder", "path": "/home/me/scripts"}"#;
        let cmd: ExternalCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd,
            ExternalCommand::SelectFolder {
                path: "/home/me/scripts".to_string()
            }
        );
    }

    #[test]
    fn test_unit_commands_deserialization() {
        for (json, expected) in [
            (r#"{"type": "run"}"#, ExternalCommand::Run),
            (r#"{"type": "stop"}"#, ExternalCommand::Stop),
            (r#"{"type": "toggleTheme"}"#, ExternalCommand::ToggleTheme),
            (r#"{"type": "cancelInterpreter"}"#, ExternalCommand::CancelInterpreter),
            (r#"{"type": "showTree"}"#, ExternalCommand::ShowTree),
            (r#"{"type": "quit"}"#, ExternalCommand::Quit),
        ] {
            assert_eq!(serde_json::from_str::<ExternalCommand>(json).unwrap(), expected);
        }
    }

    #[test]
    fn test_select_script_deserialization() {
        let cmd = parse_command(r#"{"type":"selectScript","name":"a.py"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            ExternalCommand::SelectScript {
                name: "a.py".to_string()
            }
        );
    }

    #[test]
    fn test_missing_field_is_error() {
        assert!(parse_command(r#"{"type": "expand"}"#).unwrap().is_err());
    }

    #[test]
    fn test_unknown_type_is_error() {
        assert!(parse_command(r#"{"type": "explode"}"#).unwrap().is_err());
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert!(parse_command("   ").is_none());
    }

    #[test]
    fn test_read_commands_skips_garbage_and_reports_close() {
        let input = "{\"type\":\"run\"}\nnot json\n\n{\"type\":\"quit\"}\n";
        let (tx, rx) = async_channel::unbounded::<StdinEvent>();
        read_commands(Cursor::new(input), &tx);

        assert_eq!(rx.try_recv().unwrap(), StdinEvent::Command(ExternalCommand::Run));
        assert_eq!(rx.try_recv().unwrap(), StdinEvent::Command(ExternalCommand::Quit));
        assert_eq!(rx.try_recv().unwrap(), StdinEvent::Closed);
        assert!(rx.try_recv().is_err());
    }
}
