//! Virtual-time scheduler.
//!
//! The scheduler owns a virtual clock and an ordered queue of pending
//! entries. Every time-aware piece of the crate (diagram sources, the time
//! operators, the recorder and the asserter) works by reading the clock and
//! writing entries into the queue; nothing else moves time.
//!
//! # Drain modes
//!
//! - [`Scheduler::run`] pops entries one by one, jumping the clock straight to
//!   each entry's due time and yielding to the host after every dispatch.
//! - [`Scheduler::run_realtime`] follows a [`TimeSource`] instead, dispatching
//!   whatever has come due on each frame.
//!
//! # Invariants
//!
//! - The clock never decreases.
//! - No entry is ever due before the clock value at the moment it was queued;
//!   earlier requests are clamped to `now`.
//! - Entries with equal due times dispatch in insertion order.
//! - A cancelled entry is never dispatched.

mod action;
mod queue;
mod task_queue;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

pub use action::{Action, Continuation};
pub use queue::CancellationToken;
pub use task_queue::{ImmediateTaskQueue, TaskQueue, TokioTaskQueue};

use action::{Dispatch, ScheduledAction};
use queue::{Popped, ScheduleQueue};

use crate::assert::DiagramMismatch;
use crate::config::TimeConfig;
use crate::diagram::{self, DiagramError};
use crate::recorder::LogEntry;
use crate::stream::Stream;
use crate::time_source::{SystemTimeSource, TimeSource};

/// Scheduler time, in abstract units (milliseconds in realtime mode).
pub type VirtualTime = u64;

/// Error returned when a drain finishes unsuccessfully.
#[derive(Debug)]
pub enum RunError {
    /// One or more equality assertions reported a mismatch.
    AssertionsFailed(Vec<DiagramMismatch>),
    /// The async runtime needed to drive the scheduler could not be built.
    Runtime(std::io::Error),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssertionsFailed(mismatches) => match mismatches.as_slice() {
                [single] => write!(f, "{single}"),
                many => {
                    write!(f, "{} assertions failed", many.len())?;
                    for mismatch in many {
                        write!(f, "\n\n{mismatch}")?;
                    }
                    Ok(())
                }
            },
            Self::Runtime(e) => write!(f, "failed to build runtime: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AssertionsFailed(_) => None,
            Self::Runtime(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for RunError {
    fn from(e: std::io::Error) -> Self {
        Self::Runtime(e)
    }
}

struct State {
    now: VirtualTime,
    queue: ScheduleQueue<Box<dyn Dispatch>>,
    pending_assertions: usize,
    failures: Vec<DiagramMismatch>,
}

struct Inner {
    config: TimeConfig,
    state: RefCell<State>,
    task_queue: Box<dyn TaskQueue>,
    time_source: Box<dyn TimeSource>,
}

/// Handle to a virtual-time scheduler.
///
/// Cloning is cheap and every clone drives the same clock and queue. The
/// handle is `!Send`: a scheduler and everything wired to it live on one
/// thread.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("now", &state.now)
            .field("pending_entries", &state.queue.len())
            .field("pending_assertions", &state.pending_assertions)
            .finish_non_exhaustive()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(TimeConfig::default())
    }
}

impl Scheduler {
    /// Create a scheduler that yields through tokio and reads the wall clock
    /// in realtime mode.
    #[must_use]
    pub fn new(config: TimeConfig) -> Self {
        Self::with_parts(
            config,
            TokioTaskQueue::new(Duration::from_millis(config.frame_interval_ms)),
            SystemTimeSource::new(),
        )
    }

    /// Create a scheduler with an injected task queue and time source.
    #[must_use]
    pub fn with_parts(
        config: TimeConfig,
        task_queue: impl TaskQueue + 'static,
        time_source: impl TimeSource + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                state: RefCell::new(State {
                    now: 0,
                    queue: ScheduleQueue::new(),
                    pending_assertions: 0,
                    failures: Vec::new(),
                }),
                task_queue: Box::new(task_queue),
                time_source: Box::new(time_source),
            }),
        }
    }

    #[must_use]
    pub fn now(&self) -> VirtualTime {
        self.inner.state.borrow().now
    }

    #[must_use]
    pub fn config(&self) -> &TimeConfig {
        &self.inner.config
    }

    /// Entries still queued, cancelled ones included.
    #[must_use]
    pub fn pending_entries(&self) -> usize {
        self.inner.state.borrow().queue.len()
    }

    /// Queue `action` for `target` at `due`.
    ///
    /// A due time earlier than the clock is clamped to `now`.
    pub fn schedule<T: 'static>(
        &self,
        target: &Stream<T>,
        due: VirtualTime,
        action: Action<T>,
    ) -> CancellationToken {
        let mut state = self.inner.state.borrow_mut();
        let due = if due < state.now {
            tracing::warn!(
                "due time {due} is before now ({}), clamping",
                state.now
            );
            state.now
        } else {
            due
        };

        #[allow(clippy::disallowed_methods)] // Stream clone shares the same core
        let entry = ScheduledAction {
            target: target.clone(),
            action,
        };
        state.queue.insert(due, Box::new(entry))
    }

    /// Queue `action` for `target` at `now + delay`.
    pub fn schedule_after<T: 'static>(
        &self,
        target: &Stream<T>,
        delay: VirtualTime,
        action: Action<T>,
    ) -> CancellationToken {
        let due = self.now().saturating_add(delay);
        self.schedule(target, due, action)
    }

    /// Mark a queued entry cancelled.
    ///
    /// Returns `false` if the entry was already dispatched or cancelled.
    pub fn cancel(&self, token: CancellationToken) -> bool {
        self.inner.state.borrow_mut().queue.cancel(token)
    }

    /// Build a stream of characters from a diagram, relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the diagram is malformed. Nothing is scheduled in
    /// that case.
    pub fn diagram(&self, text: &str) -> Result<Stream<char>, DiagramError> {
        let events = diagram::parse(text, self.inner.config.interval)?;
        Ok(self.schedule_log(events))
    }

    /// Build a stream from a diagram, mapping each token through `values`.
    ///
    /// # Errors
    ///
    /// Returns an error if the diagram is malformed or uses a token missing
    /// from `values`. Nothing is scheduled in that case.
    pub fn diagram_with<T: Clone + 'static>(
        &self,
        text: &str,
        values: &HashMap<char, T>,
    ) -> Result<Stream<T>, DiagramError> {
        let events = diagram::parse_with(text, self.inner.config.interval, values)?;
        Ok(self.schedule_log(events))
    }

    fn schedule_log<T: 'static>(&self, entries: Vec<LogEntry<T>>) -> Stream<T> {
        let stream = Stream::new();
        let start = self.now();
        for entry in entries {
            self.schedule(
                &stream,
                start.saturating_add(entry.offset),
                entry.event.into(),
            );
        }
        stream
    }

    pub(crate) fn register_assertion(&self) {
        self.inner.state.borrow_mut().pending_assertions += 1;
    }

    pub(crate) fn report_assertion(&self, outcome: Result<(), DiagramMismatch>) {
        let mut state = self.inner.state.borrow_mut();
        state.pending_assertions = state.pending_assertions.saturating_sub(1);
        match outcome {
            Ok(()) => tracing::debug!("assertion passed at {}", state.now),
            Err(mismatch) => {
                tracing::warn!("assertion failed at {}\n{mismatch}", state.now);
                state.failures.push(mismatch);
            }
        }
    }

    /// Drain the queue in virtual time.
    ///
    /// Resolves once the queue is empty. Never resolves while some producer
    /// keeps rescheduling itself.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::AssertionsFailed`] if any equality assertion
    /// reported a mismatch during the drain.
    pub async fn run(&self) -> Result<(), RunError> {
        tracing::debug!(
            "virtual run started at {} with {} pending entries",
            self.now(),
            self.pending_entries()
        );

        let mut dispatched = 0usize;
        loop {
            let popped = self.inner.state.borrow_mut().queue.pop();
            match popped {
                None => break,
                Some(Popped::Cancelled(due)) => {
                    tracing::trace!("skipping cancelled entry due at {due}");
                }
                Some(Popped::Live(due, entry)) => {
                    {
                        let mut state = self.inner.state.borrow_mut();
                        state.now = state.now.max(due);
                    }
                    tracing::trace!("dispatching entry due at {due}");
                    entry.dispatch(self, due);
                    dispatched += 1;
                    self.inner.task_queue.yield_now().await;
                }
            }
        }

        self.finish(dispatched)
    }

    fn finish(&self, dispatched: usize) -> Result<(), RunError> {
        let mut state = self.inner.state.borrow_mut();
        tracing::debug!(
            "virtual run finished at {} after {dispatched} dispatches",
            state.now
        );

        if state.pending_assertions > 0 {
            tracing::warn!(
                "{} assertions never completed; their streams did not terminate",
                state.pending_assertions
            );
        }

        let failures = std::mem::take(&mut state.failures);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RunError::AssertionsFailed(failures))
        }
    }

    /// Run one realtime frame.
    ///
    /// Moves the clock up to the time source's reading, then dispatches every
    /// entry due by then, including ones queued during this frame. Returns the
    /// number of entries dispatched.
    pub fn realtime_frame(&self) -> usize {
        let wall = self.inner.time_source.now_ms();
        let now = {
            let mut state = self.inner.state.borrow_mut();
            state.now = state.now.max(wall);
            state.now
        };

        let mut dispatched = 0;
        loop {
            let popped = {
                let mut state = self.inner.state.borrow_mut();
                match state.queue.peek_due() {
                    Some(due) if due <= now => state.queue.pop(),
                    _ => None,
                }
            };
            match popped {
                None => break,
                Some(Popped::Cancelled(_)) => {}
                Some(Popped::Live(due, entry)) => {
                    tracing::trace!("dispatching entry due at {due} in frame at {now}");
                    entry.dispatch(self, now);
                    dispatched += 1;
                }
            }
        }
        dispatched
    }

    /// Drive the scheduler from the wall clock, one frame at a time, forever.
    pub async fn run_realtime(&self) {
        tracing::debug!("realtime run started at {}", self.now());
        loop {
            self.realtime_frame();
            self.inner.task_queue.next_frame().await;
        }
    }
}
