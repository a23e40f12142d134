//! `throttle(p)` passes a value only after `p` quiet units.

use crate::TimeConfig;
use crate::scenarios::helpers::expect_diagram;

#[test]
fn test_throttle_drops_values_inside_window() {
    // a passes; b and c each arrive 40 after the previous value; d after 100.
    expect_diagram(TimeConfig::default(), "-a--------d|", |time| {
        time.diagram("-a-b-c----d|").unwrap().compose(time.throttle(40))
    });
}

#[test]
fn test_throttle_passes_sparse_values() {
    expect_diagram(TimeConfig::default(), "a---b---c|", |time| {
        time.diagram("a---b---c|").unwrap().compose(time.throttle(40))
    });
}

#[test]
fn test_throttle_first_value_always_passes() {
    expect_diagram(TimeConfig::default(), "a|", |time| {
        time.diagram("a|").unwrap().compose(time.throttle(1_000))
    });
}
