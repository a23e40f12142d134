//! Common helpers for scenario tests.

use std::fmt::Display;

use crate::scheduler::RunError;
use crate::testing::with_time;
use crate::{Scheduler, Stream, TimeConfig};

/// Assert inside a fresh scheduler that `build(scheduler)` produces `expected`.
pub fn expect_diagram<T, F>(config: TimeConfig, expected: &str, build: F)
where
    T: Clone + Display + 'static,
    F: FnOnce(&Scheduler) -> Stream<T>,
{
    let result = with_time(config, |scheduler| {
        let actual = build(scheduler);
        let expected = scheduler.diagram(expected).unwrap();
        scheduler.assert_equal(&actual, &expected);
    });
    if let Err(e) = result {
        panic!("{e}");
    }
}

/// Unwrap a run result that is expected to carry exactly one mismatch.
pub fn single_mismatch(result: Result<(), RunError>) -> crate::DiagramMismatch {
    match result {
        Err(RunError::AssertionsFailed(mut mismatches)) if mismatches.len() == 1 => {
            mismatches.remove(0)
        }
        other => panic!("expected exactly one mismatch, got {other:?}"),
    }
}
