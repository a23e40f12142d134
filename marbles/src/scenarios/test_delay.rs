//! `delay(k)` shifts every event by `k`.

use crate::TimeConfig;
use crate::scenarios::helpers::expect_diagram;
use crate::testing::{DiagramGenerator, with_time};

#[test]
fn test_delay_by_whole_columns() {
    expect_diagram(TimeConfig::default(), "----a--b--|", |time| {
        time.diagram("--a--b--|").unwrap().compose(time.delay(40))
    });
}

#[test]
fn test_delay_keeps_groups_together() {
    expect_diagram(TimeConfig::default(), "--(ab)-c|", |time| {
        time.diagram("-(ab)-c|").unwrap().compose(time.delay(20))
    });
}

#[test]
fn test_delay_prefixes_generated_diagrams() {
    let mut generator = DiagramGenerator::new(77);
    let config = TimeConfig::default();

    for columns in 0..20 {
        let text = generator.next_diagram();
        let shifted = format!("{}{text}", "-".repeat(columns % 5));
        let delay = (columns % 5) as u64 * config.interval;

        let result = with_time(config, |time| {
            let delayed = time.diagram(&text).unwrap().compose(time.delay(delay));
            let expected = time.diagram(&shifted).unwrap();
            time.assert_equal(&delayed, &expected);
        });
        assert!(result.is_ok(), "delay {delay} of {text}: {result:?}");
    }
}
