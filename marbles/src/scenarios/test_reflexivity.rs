//! A diagram always equals itself.

use crate::TimeConfig;
use crate::testing::{DiagramGenerator, with_time};

#[test]
fn test_identical_diagrams_are_equal() {
    let result = with_time(TimeConfig::default(), |time| {
        let actual = time.diagram("--1--2--3--|").unwrap();
        let expected = time.diagram("--1--2--3--|").unwrap();
        time.assert_equal(&actual, &expected);
    });
    assert!(result.is_ok());
}

#[test]
fn test_stream_equals_itself() {
    let result = with_time(TimeConfig::default(), |time| {
        let stream = time.diagram("-a-(bc)--d|").unwrap();
        time.assert_equal(&stream, &stream);
    });
    assert!(result.is_ok());
}

#[test]
fn test_generated_diagrams_are_reflexive() {
    let mut generator = DiagramGenerator::new(11);

    for _ in 0..50 {
        let text = generator.next_diagram();
        let result = with_time(TimeConfig::default(), |time| {
            let actual = time.diagram(&text).unwrap();
            let expected = time.diagram(&text).unwrap();
            time.assert_equal(&actual, &expected);
        });
        assert!(result.is_ok(), "diagram {text} did not equal itself");
    }
}
