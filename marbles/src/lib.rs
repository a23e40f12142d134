//! Deterministic virtual-time scheduling for single-threaded streams.
//!
//! Streams are driven from marble diagrams, shifted through time operators,
//! recorded, and compared as diagrams, all on a virtual clock that jumps
//! straight from one event to the next.
//!
//! ```
//! use marbles::{Scheduler, TimeConfig, testing::with_time};
//!
//! let result = with_time(TimeConfig::default(), |time: &Scheduler| {
//!     let input = time.diagram("--a--b--|").unwrap();
//!     let expected = time.diagram("---a--b--|").unwrap();
//!     time.assert_equal(&input.compose(time.delay(20)), &expected);
//! });
//! assert!(result.is_ok());
//! ```
//!
//! Components, leaves first:
//! - [`stream`]: the driveable stream contract plus a few combinators
//! - [`diagram`]: the diagram codec
//! - [`scheduler`]: clock, queue, drain loops
//! - [`operators`]: `delay`, `throttle`, `debounce`, `interval`
//! - [`recorder`] and [`assert`]: capture histories and compare them

pub mod assert;
pub mod cli;
pub mod config;
pub mod diagram;
pub mod operators;
pub mod recorder;
pub mod scheduler;
pub mod stream;
pub mod testing;
pub mod time_source;

mod scenarios;

pub use assert::DiagramMismatch;
pub use config::{ConfigError, TimeConfig};
pub use diagram::DiagramError;
pub use recorder::LogEntry;
pub use scheduler::{
    Action, CancellationToken, Continuation, RunError, Scheduler, TaskQueue, VirtualTime,
};
pub use stream::{Event, Stream, StreamError, Subscription};
