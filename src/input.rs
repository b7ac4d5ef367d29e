//! Input events and the terminal command syntax that produces them.
//!
//! The device reads one command per line. Arrow keys arrive as ANSI escape
//! sequences when the terminal is in line mode, so those are accepted too.

use crate::ShapeKind;
use std::fmt;

/// Discrete user action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    MoveNext,
    MovePrevious,
    ToggleMark,
    SetShape(ShapeKind),
    ChangeYear(i32),
    SwitchView,
    Quit,
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEvent::MoveNext => write!(f, "next day"),
            InputEvent::MovePrevious => write!(f, "previous day"),
            InputEvent::ToggleMark => write!(f, "toggle mark"),
            InputEvent::SetShape(shape) => write!(f, "shape {shape}"),
            InputEvent::ChangeYear(delta) => write!(f, "year {delta:+}"),
            InputEvent::SwitchView => write!(f, "switch view"),
            InputEvent::Quit => write!(f, "quit"),
        }
    }
}

/// Parse one input line. `None` for anything unrecognised.
pub fn parse_command(line: &str) -> Option<InputEvent> {
    // Keep a lone space: it is the toggle key
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed == " " {
        return Some(InputEvent::ToggleMark);
    }

    let command = trimmed.trim().to_ascii_lowercase();
    let event = match command.as_str() {
        "" | "t" | "space" | "toggle" => InputEvent::ToggleMark,
        "n" | "l" | "right" | "\x1b[c" => InputEvent::MoveNext,
        "p" | "h" | "left" | "\x1b[d" => InputEvent::MovePrevious,
        "+" | "up" | "\x1b[a" => InputEvent::ChangeYear(1),
        "-" | "down" | "\x1b[b" => InputEvent::ChangeYear(-1),
        "v" | "plot" | "view" => InputEvent::SwitchView,
        "q" | "quit" | "exit" => InputEvent::Quit,
        other => {
            let code = other.parse::<u8>().ok()?;
            InputEvent::SetShape(ShapeKind::from_code(code)?)
        }
    };
    Some(event)
}

/// Short help text printed at start-up
pub fn help() -> String {
    let shapes = ShapeKind::ALL
        .iter()
        .map(|shape| format!("{}={}", shape.code(), shape.name()))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "Commands: n/right next day, p/left previous day, t/enter toggle mark, \
         {shapes}, +/- year, v plot view, q quit"
    )
}
