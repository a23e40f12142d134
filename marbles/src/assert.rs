//! Diagram-level equality assertions.
//!
//! Both streams are recorded, encoded with the scheduler's interval and
//! compared as strings. The slot of every entry is compared as well, since a
//! group's width can hide a timing difference from the string. The outcome is
//! reported to the scheduler, which surfaces failures from [`Scheduler::run`]
//! once the queue drains.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use crate::diagram;
use crate::recorder::LogEntry;
use crate::scheduler::{Scheduler, VirtualTime};
use crate::stream::{Event, Stream};

/// Two streams whose diagrams differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramMismatch {
    pub actual: String,
    pub expected: String,
}

impl std::fmt::Display for DiagramMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expected\n\n{}\n\nGot\n\n{}", self.expected, self.actual)
    }
}

impl std::error::Error for DiagramMismatch {}

/// A terminated stream, as the asserter compares it.
struct Recorded {
    diagram: String,
    slots: Vec<u64>,
}

impl Recorded {
    fn new<T: Display>(log: &[LogEntry<T>], interval: VirtualTime) -> Self {
        Self {
            diagram: diagram::encode(log, interval),
            slots: diagram::slots(log, interval),
        }
    }

    /// The diagram followed by its slots, for reports where the diagrams
    /// alone read the same.
    fn with_slots(&self) -> String {
        let slots: Vec<String> = self.slots.iter().map(u64::to_string).collect();
        format!("{} (slots {})", self.diagram, slots.join(" "))
    }
}

#[derive(Default)]
struct Countdown {
    actual: Option<Recorded>,
    expected: Option<Recorded>,
}

impl Scheduler {
    /// Assert that both streams produce the same diagram.
    pub fn assert_equal<T, U>(&self, actual: &Stream<T>, expected: &Stream<U>)
    where
        T: Clone + Display + 'static,
        U: Clone + Display + 'static,
    {
        self.assert_equal_with(actual, expected, |a: &str, e: &str| a == e);
    }

    /// Assert that `comparator(actual_diagram, expected_diagram)` holds and
    /// that every entry of both streams falls into the same slot.
    ///
    /// Nothing is reported until both streams terminate; if either never
    /// does, the assertion stays pending.
    pub fn assert_equal_with<T, U>(
        &self,
        actual: &Stream<T>,
        expected: &Stream<U>,
        comparator: impl Fn(&str, &str) -> bool + 'static,
    ) where
        T: Clone + Display + 'static,
        U: Clone + Display + 'static,
    {
        self.register_assertion();

        let state = Rc::new(RefCell::new(Countdown::default()));
        let interval = self.config().interval;

        #[allow(clippy::disallowed_methods)] // Rc clones share the countdown
        let settle = {
            let state = Rc::clone(&state);
            let scheduler = self.clone();
            move || {
                let mut state = state.borrow_mut();
                let (Some(actual), Some(expected)) = (&state.actual, &state.expected) else {
                    return;
                };
                let outcome = if actual.slots == expected.slots
                    && comparator(actual.diagram.as_str(), expected.diagram.as_str())
                {
                    Ok(())
                } else if actual.diagram == expected.diagram {
                    Err(DiagramMismatch {
                        actual: actual.with_slots(),
                        expected: expected.with_slots(),
                    })
                } else {
                    Err(DiagramMismatch {
                        actual: actual.diagram.clone(),
                        expected: expected.diagram.clone(),
                    })
                };
                state.actual = None;
                state.expected = None;
                drop(state);
                scheduler.report_assertion(outcome);
            }
        };
        let settle = Rc::new(settle);

        #[allow(clippy::disallowed_methods)]
        let (actual_state, actual_settle) = (Rc::clone(&state), Rc::clone(&settle));
        let _ = self.record(actual).subscribe(move |event: &Event<Vec<LogEntry<T>>>| {
            if let Event::Next(log) = event {
                actual_state.borrow_mut().actual = Some(Recorded::new(log, interval));
                (*actual_settle)();
            }
        });

        let _ = self.record(expected).subscribe(move |event: &Event<Vec<LogEntry<U>>>| {
            if let Event::Next(log) = event {
                state.borrow_mut().expected = Some(Recorded::new(log, interval));
                (*settle)();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::TimeConfig;
    use crate::scheduler::{ImmediateTaskQueue, RunError};
    use crate::time_source::SimulatedTimeSource;

    fn scheduler() -> Scheduler {
        Scheduler::with_parts(
            TimeConfig::default(),
            ImmediateTaskQueue,
            SimulatedTimeSource::new(0),
        )
    }

    #[tokio::test]
    async fn test_equal_diagrams_pass() {
        let scheduler = scheduler();
        let actual = scheduler.diagram("--a--b|").unwrap();
        let expected = scheduler.diagram("--a--b|").unwrap();
        scheduler.assert_equal(&actual, &expected);

        scheduler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_mismatch_reports_both_diagrams() {
        let scheduler = scheduler();
        let actual = scheduler.diagram("--a--b|").unwrap();
        let expected = scheduler.diagram("--a-b-|").unwrap();
        scheduler.assert_equal(&actual, &expected);

        let Err(RunError::AssertionsFailed(mismatches)) = scheduler.run().await else {
            panic!("expected a mismatch");
        };
        assert_eq!(
            mismatches,
            vec![DiagramMismatch {
                actual: "--a--b|".to_string(),
                expected: "--a-b-|".to_string(),
            }]
        );
        assert_eq!(
            mismatches[0].to_string(),
            "Expected\n\n--a-b-|\n\nGot\n\n--a--b|"
        );
    }

    #[tokio::test]
    async fn test_custom_comparator() {
        let scheduler = scheduler();
        let actual = scheduler.diagram("--a|").unwrap();
        let expected = scheduler.diagram("--b|").unwrap();
        scheduler.assert_equal_with(&actual, &expected, |a: &str, e: &str| a.len() == e.len());

        scheduler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_two_digit_values_one_slot_apart_differ() {
        let scheduler = scheduler();
        let values = HashMap::from([('x', 10), ('y', 20)]);
        let actual = scheduler.diagram_with("-xy------|", &values).unwrap();
        let expected = scheduler.diagram_with("-x-y-----|", &values).unwrap();
        scheduler.assert_equal(&actual, &expected);

        let Err(RunError::AssertionsFailed(mismatches)) = scheduler.run().await else {
            panic!("expected a mismatch");
        };
        assert_eq!(mismatches[0].actual, "-1020------|");
        assert_eq!(mismatches[0].expected, "-10-20-----|");
    }

    #[tokio::test]
    async fn test_timing_hidden_by_group_width_still_fails() {
        let scheduler = scheduler();
        // 'c' lands in slot 2, inside the width of the group in slot 0.
        let actual = Stream::merge(&[
            scheduler.diagram("(ab)|").unwrap(),
            scheduler.diagram("--c|").unwrap(),
        ]);
        let expected = scheduler.diagram("(ab)c|").unwrap();
        scheduler.assert_equal(&actual, &expected);

        let Err(RunError::AssertionsFailed(mismatches)) = scheduler.run().await else {
            panic!("expected a mismatch");
        };
        assert_eq!(mismatches[0].actual, "(ab)c| (slots 0 0 2 4)");
        assert_eq!(mismatches[0].expected, "(ab)c| (slots 0 0 4 5)");
    }

    #[tokio::test]
    async fn test_never_terminating_stream_does_not_fail() {
        let scheduler = scheduler();
        let actual = scheduler.diagram("--a--").unwrap();
        let expected = scheduler.diagram("--b|").unwrap();
        scheduler.assert_equal(&actual, &expected);

        scheduler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_matching_errors_pass() {
        let scheduler = scheduler();
        let actual = scheduler.diagram("-a-#").unwrap();
        let expected = scheduler.diagram("-a-#").unwrap();
        scheduler.assert_equal(&actual, &expected);

        scheduler.run().await.unwrap();
    }
}
