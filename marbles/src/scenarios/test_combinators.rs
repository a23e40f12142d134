//! Stream combinators driven through diagrams.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::scenarios::helpers::expect_diagram;
use crate::stream::{Event, Stream};
use crate::testing::with_time;
use crate::{TimeConfig, diagram};

#[test]
fn test_of_emits_everything_at_subscription() {
    expect_diagram(TimeConfig::default(), "(ABC|)", |_| Stream::of(['A', 'B', 'C']));
}

#[test]
fn test_map_transforms_values() {
    expect_diagram(TimeConfig::default(), "-A-B|", |time| {
        time.diagram("-a-b|").unwrap().map(char::to_ascii_uppercase)
    });
}

#[test]
fn test_filter_drops_values() {
    expect_diagram(TimeConfig::default(), "-1---3--|", |time| {
        time.diagram("-1-2-3-4|")
            .unwrap()
            .filter(|digit| matches!(digit, '1' | '3'))
    });
}

#[test]
fn test_take_completes_with_last_value() {
    expect_diagram(TimeConfig::default(), "--1--2--(3|)", |time| {
        time.diagram("--1--2--3--4|").unwrap().take(3)
    });
}

#[test]
fn test_fold_counts_values() {
    let values = HashMap::from([('1', 1u32)]);
    expect_diagram(TimeConfig::default(), "01-2-3|", |time| {
        time.diagram_with("-1-1-1|", &values)
            .unwrap()
            .fold(0u32, |count, value| count + value)
    });
}

#[test]
fn test_diagram_with_maps_tokens() {
    let values = HashMap::from([('x', 10u32), ('y', 20u32)]);
    let recorded = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&recorded);
    with_time(TimeConfig::default(), |time| {
        let stream = time.diagram_with("-x--y|", &values).unwrap();
        let _ = time.record(&stream).subscribe(move |event| {
            if let Event::Next(log) = event {
                *slot.borrow_mut() = Some(log.clone());
            }
        });
    })
    .unwrap();

    let log = recorded.borrow_mut().take().unwrap();
    // One cell per slot, whatever the width of the value.
    assert_eq!(diagram::encode(&log, 20), "-10--20|");
    assert_eq!(diagram::slots(&log, 20), vec![1, 4, 5]);
}
