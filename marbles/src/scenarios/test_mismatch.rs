//! Differing diagrams fail the run with both diagrams in the report.

use crate::TimeConfig;
use crate::scenarios::helpers::single_mismatch;
use crate::testing::with_time;

#[test]
fn test_mismatch_shows_both_diagrams() {
    let result = with_time(TimeConfig::default(), |time| {
        let actual = time.diagram("--a--b--|").unwrap();
        let expected = time.diagram("--a--c--|").unwrap();
        time.assert_equal(&actual, &expected);
    });

    let mismatch = single_mismatch(result);
    assert_eq!(mismatch.actual, "--a--b--|");
    assert_eq!(mismatch.expected, "--a--c--|");
    assert_eq!(
        mismatch.to_string(),
        "Expected\n\n--a--c--|\n\nGot\n\n--a--b--|"
    );
}

#[test]
fn test_mismatch_on_timing_only() {
    let result = with_time(TimeConfig::default(), |time| {
        let actual = time.diagram("a|").unwrap().compose(time.delay(20));
        let expected = time.diagram("a|").unwrap();
        time.assert_equal(&actual, &expected);
    });

    let mismatch = single_mismatch(result);
    assert_eq!(mismatch.actual, "-a|");
    assert_eq!(mismatch.expected, "a|");
}

#[test]
fn test_passing_and_failing_assertions_in_one_run() {
    let result = with_time(TimeConfig::default(), |time| {
        let same = time.diagram("-x|").unwrap();
        time.assert_equal(&same, &time.diagram("-x|").unwrap());

        let left = time.diagram("-x|").unwrap();
        time.assert_equal(&left, &time.diagram("-y|").unwrap());
    });

    let mismatch = single_mismatch(result);
    assert_eq!(mismatch.expected, "-y|");
}
