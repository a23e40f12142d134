//! Scenario tests at the diagram level.
//!
//! Each file covers one behavior end to end: diagrams in, operators applied,
//! recorded output compared as diagrams through `with_time`.

#![cfg(test)]

mod helpers;

mod test_combinators;
mod test_debounce;
mod test_delay;
mod test_errors;
mod test_interval;
mod test_merge;
mod test_mismatch;
mod test_reflexivity;
mod test_round_trip;
mod test_throttle;
