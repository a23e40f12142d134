//! Merged diagrams interleave by time.

use crate::TimeConfig;
use crate::scenarios::helpers::expect_diagram;
use crate::stream::Stream;

#[test]
fn test_merge_interleaves() {
    expect_diagram(TimeConfig::default(), "--2--1--2--1--|", |time| {
        let ones = time.diagram("-----1-----1--|").unwrap();
        let twos = time.diagram("--2-----2-----|").unwrap();
        Stream::merge(&[ones, twos])
    });
}

#[test]
fn test_merge_waits_for_last_completion() {
    expect_diagram(TimeConfig::default(), "a-b---|", |time| {
        let short = time.diagram("a|").unwrap();
        let long = time.diagram("--b---|").unwrap();
        Stream::merge(&[short, long])
    });
}

#[test]
fn test_merge_simultaneous_values_form_group() {
    expect_diagram(TimeConfig::default(), "-(xy)|", |time| {
        let left = time.diagram("-x|").unwrap();
        let right = time.diagram("-y---|").unwrap();
        Stream::merge(&[left, right])
    });
}
