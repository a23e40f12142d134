//! `debounce(p)` emits the last value of a burst `p` units after it.

use crate::TimeConfig;
use crate::scenarios::helpers::expect_diagram;

#[test]
fn test_debounce_keeps_second_of_close_pair() {
    // a at 300, b at 500; b comes out at 800.
    expect_diagram(TimeConfig::default().with_interval(100), "-------b-|", |time| {
        time.diagram("--a-b----|").unwrap().compose(time.debounce(300))
    });
}

#[test]
fn test_debounce_lets_spaced_values_through() {
    expect_diagram(TimeConfig::default(), "---a----b--|", |time| {
        time.diagram("-a----b----|").unwrap().compose(time.debounce(40))
    });
}

#[test]
fn test_debounce_complete_overtakes_pending_value() {
    expect_diagram(TimeConfig::default(), "---|", |time| {
        time.diagram("--a|").unwrap().compose(time.debounce(60))
    });
}
