//! `interval(p)` bounded with `take(n)` yields exactly `0..n`.

use crate::TimeConfig;
use crate::scenarios::helpers::expect_diagram;

#[test]
fn test_interval_take_four() {
    expect_diagram(TimeConfig::default(), "012(3|)", |time| {
        time.interval(20).take(4)
    });
}

#[test]
fn test_periodic_every_other_column() {
    expect_diagram(TimeConfig::default(), "-0-1-(2|)", |time| {
        time.periodic(40).take(3)
    });
}

#[test]
fn test_interval_delayed() {
    expect_diagram(TimeConfig::default(), "--0-1-(2|)", |time| {
        time.interval(40).take(3).compose(time.delay(20))
    });
}
