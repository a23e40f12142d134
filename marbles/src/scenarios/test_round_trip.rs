//! Parsing then encoding gives back the input diagram.

use std::cell::RefCell;
use std::rc::Rc;

use crate::diagram::{encode, parse};
use crate::stream::Event;
use crate::testing::{DiagramGenConfig, DiagramGenerator, with_time};
use crate::TimeConfig;

#[test]
fn test_codec_round_trip_for_generated_diagrams() {
    let mut generator = DiagramGenerator::new(2024);

    for _ in 0..500 {
        let text = generator.next_diagram();
        let log = parse(&text, 20).unwrap();
        assert_eq!(encode(&log, 20), text);
    }
}

#[test]
fn test_round_trip_with_dense_groups() {
    let config = DiagramGenConfig {
        group_rate: 0.4,
        max_group_size: 4,
        terminal_group_rate: 0.5,
        ..DiagramGenConfig::default()
    };
    let mut generator = DiagramGenerator::with_config(99, config);

    for _ in 0..200 {
        let text = generator.next_diagram();
        let log = parse(&text, 7).unwrap();
        assert_eq!(encode(&log, 7), text);
    }
}

#[test]
fn test_recorded_diagram_encodes_to_input() {
    let mut generator = DiagramGenerator::new(5);

    for _ in 0..30 {
        let text = generator.next_diagram();
        let encoded = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&encoded);

        let result = with_time(TimeConfig::default(), |time| {
            let interval = time.config().interval;
            let _ = time
                .record(&time.diagram(&text).unwrap())
                .subscribe(move |event: &Event<Vec<crate::LogEntry<char>>>| {
                    if let Event::Next(log) = event {
                        *slot.borrow_mut() = Some(encode(log, interval));
                    }
                });
        });

        assert!(result.is_ok());
        assert_eq!(encoded.borrow().as_deref(), Some(text.as_str()));
    }
}
