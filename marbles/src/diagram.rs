//! Marble diagram codec.
//!
//! A diagram is a fixed-width string where the character at index `i` stands
//! for time offset `(i + 1) * interval`:
//!
//! - `-`: nothing happens
//! - `|`: Complete
//! - `#`: Error
//! - `(...)`: every enclosed token fires at the offset of the `(`
//! - anything else: a Next carrying that character, or its mapped value
//!
//! Characters after a group keep their own string index, so `(ab)-c` puts
//! `a` and `b` at index 0 and `c` at index 5.
//!
//! Encoding is the reverse. Every slot takes one cell, whatever the width of
//! its value, and several events that land in the same slot are written as a
//! group. A group absorbs the empty slots its extra columns cover, so later
//! events keep the string index the parser gives them. A non-empty slot
//! inside that width cannot keep its index, which is why [`slots`] exists:
//! two logs are equal in time only if their slot sequences match.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use crate::recorder::LogEntry;
use crate::scheduler::VirtualTime;
use crate::stream::{Event, StreamError};

/// Message carried by the error a diagram's `#` produces.
pub const DIAGRAM_ERROR: &str = "diagram error";

/// Error returned when a diagram string is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramError {
    /// A `(` appeared inside an open group.
    NestedGroup { index: usize },
    /// A `)` appeared with no open group.
    UnbalancedGroup { index: usize },
    /// The diagram ended inside the group opened at `index`.
    UnclosedGroup { index: usize },
    /// A token has no entry in the supplied value mapping.
    UnmappedToken { token: char, index: usize },
}

impl std::fmt::Display for DiagramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NestedGroup { index } => write!(f, "nested group at index {index}"),
            Self::UnbalancedGroup { index } => {
                write!(f, "closing ')' without an open group at index {index}")
            }
            Self::UnclosedGroup { index } => {
                write!(f, "group opened at index {index} is never closed")
            }
            Self::UnmappedToken { token, index } => {
                write!(f, "token '{token}' at index {index} has no mapped value")
            }
        }
    }
}

impl std::error::Error for DiagramError {}

/// Parse a diagram into timed events, using each character as its own value.
///
/// # Errors
///
/// Returns an error for nested, stray or unclosed groups.
pub fn parse(text: &str, interval: VirtualTime) -> Result<Vec<LogEntry<char>>, DiagramError> {
    parse_tokens(text, interval, |token, _| Ok(token))
}

/// Parse a diagram into timed events, looking every token up in `values`.
///
/// # Errors
///
/// Returns an error for malformed groups or a token missing from `values`.
pub fn parse_with<T: Clone>(
    text: &str,
    interval: VirtualTime,
    values: &HashMap<char, T>,
) -> Result<Vec<LogEntry<T>>, DiagramError> {
    parse_tokens(text, interval, |token, index| {
        values
            .get(&token)
            .cloned()
            .ok_or(DiagramError::UnmappedToken { token, index })
    })
}

fn parse_tokens<T>(
    text: &str,
    interval: VirtualTime,
    resolve: impl Fn(char, usize) -> Result<T, DiagramError>,
) -> Result<Vec<LogEntry<T>>, DiagramError> {
    let mut entries = Vec::new();
    let mut group_start: Option<usize> = None;

    for (index, token) in text.chars().enumerate() {
        let slot = group_start.unwrap_or(index) as u64;
        let offset = slot.saturating_add(1).saturating_mul(interval);

        let event = match token {
            '(' => {
                if group_start.is_some() {
                    return Err(DiagramError::NestedGroup { index });
                }
                group_start = Some(index);
                continue;
            }
            ')' => {
                if group_start.take().is_none() {
                    return Err(DiagramError::UnbalancedGroup { index });
                }
                continue;
            }
            '-' => continue,
            '|' => Event::Complete,
            '#' => Event::Error(StreamError::new(DIAGRAM_ERROR)),
            other => Event::Next(resolve(other, index)?),
        };
        entries.push(LogEntry { offset, event });
    }

    if let Some(index) = group_start {
        return Err(DiagramError::UnclosedGroup { index });
    }
    Ok(entries)
}

/// The slot every entry of `log` falls into, in log order.
///
/// Offsets below one interval land in slot 0.
#[must_use]
pub fn slots<T>(log: &[LogEntry<T>], interval: VirtualTime) -> Vec<u64> {
    let interval = interval.max(1);
    log.iter()
        .map(|entry| (entry.offset / interval).saturating_sub(1))
        .collect()
}

/// Encode a recorded log as a diagram.
///
/// An empty log encodes to the empty string.
#[must_use]
pub fn encode<T: Display>(log: &[LogEntry<T>], interval: VirtualTime) -> String {
    let mut grouped: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    for (slot, entry) in slots(log, interval).into_iter().zip(log) {
        grouped.entry(slot).or_default().push(token(&entry.event));
    }

    let Some(max_offset) = log.iter().map(|entry| entry.offset).max() else {
        return String::new();
    };
    let last_slot = grouped.keys().next_back().copied().unwrap_or(0);
    let slot_count = max_offset.div_ceil(interval.max(1)).max(last_slot + 1);

    let mut diagram = String::new();
    // Column the parser would assign to the next character.
    let mut column = 0u64;
    for slot in 0..slot_count {
        match grouped.get(&slot) {
            None if column > slot => {}
            None => {
                diagram.push('-');
                column += 1;
            }
            Some(tokens) => {
                if let [single] = tokens.as_slice() {
                    diagram.push_str(single);
                    column += 1;
                } else {
                    let group = format!("({})", tokens.concat());
                    column += group.chars().count() as u64;
                    diagram.push_str(&group);
                }
            }
        }
    }
    diagram
}

fn token<T: Display>(event: &Event<T>) -> String {
    match event {
        Event::Next(value) => value.to_string(),
        Event::Error(_) => "#".to_string(),
        Event::Complete => "|".to_string(),
    }
}
