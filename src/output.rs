//! Terminal rendering of session events.

use crate::session::{SessionEvent, SessionState};
use crate::transcript::TranscriptTurn;
use chrono::Local;
use std::io::{self, IsTerminal};

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// ANSI styling, or nothing when stderr is not a terminal.
#[derive(Debug, Clone, Copy)]
struct Palette {
    dim: &'static str,
    bold: &'static str,
    green: &'static str,
    cyan: &'static str,
    red: &'static str,
    reset: &'static str,
}

impl Palette {
    fn new(color: bool) -> Self {
        if color {
            Self {
                dim: DIM,
                bold: BOLD,
                green: GREEN,
                cyan: CYAN,
                red: RED,
                reset: RESET,
            }
        } else {
            Self {
                dim: "",
                bold: "",
                green: "",
                cyan: "",
                red: "",
                reset: "",
            }
        }
    }
}

/// Clear the current terminal line.
pub fn clear_line() {
    if io::stderr().is_terminal() {
        eprint!("\r\x1b[2K");
    }
}

fn format_turn(turn: &TranscriptTurn, p: Palette) -> String {
    let time = turn.timestamp().with_timezone(&Local).format("%H:%M:%S");
    let mut out = format!("{}{time}{} {}{}{}", p.dim, p.reset, p.bold, turn.source_text(), p.reset);
    if !turn.target_text().is_empty() {
        out.push_str(&format!("\n         {}→ {}{}", p.cyan, turn.target_text(), p.reset));
    }
    out
}

/// Text for one event, or `None` for events not worth a line.
pub fn format_event(event: &SessionEvent, color: bool) -> Option<String> {
    let p = Palette::new(color);
    match event {
        SessionEvent::StateChanged(SessionState::Connecting) => {
            Some(format!("{}Connecting...{}", p.dim, p.reset))
        }
        SessionEvent::StateChanged(SessionState::Active) => {
            Some(format!("{}Listening{} (Ctrl-C to stop)", p.green, p.reset))
        }
        SessionEvent::StateChanged(SessionState::Idle) => {
            Some(format!("{}Session ended{}", p.dim, p.reset))
        }
        SessionEvent::StateChanged(_) => None,
        SessionEvent::Turn(turn) => Some(format_turn(turn, p)),
        SessionEvent::Error(message) => Some(format!("{}{message}{}", p.red, p.reset)),
    }
}

/// Write one event to stderr.
pub fn render_event(event: &SessionEvent) {
    if let Some(line) = format_event(event, io::stderr().is_terminal()) {
        clear_line();
        eprintln!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(source: &str, target: &str) -> TranscriptTurn {
        let mut aggregator = crate::transcript::TranscriptAggregator::new(1);
        aggregator.source_fragment(source);
        aggregator.target_fragment(target);
        aggregator.turn_complete().unwrap()
    }

    #[test]
    fn test_plain_state_lines() {
        assert_eq!(
            format_event(&SessionEvent::StateChanged(SessionState::Connecting), false).as_deref(),
            Some("Connecting...")
        );
        assert_eq!(
            format_event(&SessionEvent::StateChanged(SessionState::Active), false).as_deref(),
            Some("Listening (Ctrl-C to stop)")
        );
        assert!(format_event(&SessionEvent::StateChanged(SessionState::Closing), false).is_none());
        assert!(format_event(&SessionEvent::StateChanged(SessionState::Errored), false).is_none());
    }

    #[test]
    fn test_turn_shows_both_sides() {
        let line = format_event(&SessionEvent::Turn(turn("こんにちは", "你好")), false).unwrap();
        assert!(line.contains("こんにちは"));
        assert!(line.contains("→ 你好"));
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn test_turn_without_translation_is_one_line() {
        let line = format_event(&SessionEvent::Turn(turn("はい", "")), false).unwrap();
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_error_is_red_with_color() {
        let line = format_event(&SessionEvent::Error("boom".into()), true).unwrap();
        assert_eq!(line, format!("{RED}boom{RESET}"));
    }
}
