//! Error notifications are terminal and encode as `#`.

use crate::TimeConfig;
use crate::scenarios::helpers::{expect_diagram, single_mismatch};
use crate::testing::with_time;

#[test]
fn test_error_diagrams_compare_equal() {
    expect_diagram(TimeConfig::default(), "-a-#", |time| {
        time.diagram("-a-#").unwrap()
    });
}

#[test]
fn test_error_is_not_completion() {
    let result = with_time(TimeConfig::default(), |time| {
        let actual = time.diagram("-a-#").unwrap();
        let expected = time.diagram("-a-|").unwrap();
        time.assert_equal(&actual, &expected);
    });

    let mismatch = single_mismatch(result);
    assert_eq!(mismatch.actual, "-a-#");
}

#[test]
fn test_delay_carries_errors() {
    expect_diagram(TimeConfig::default(), "--a-#", |time| {
        time.diagram("-a-#").unwrap().compose(time.delay(20))
    });
}

#[test]
fn test_events_after_error_are_ignored() {
    expect_diagram(TimeConfig::default(), "-#", |time| {
        time.diagram("-#-a|").unwrap()
    });
}
