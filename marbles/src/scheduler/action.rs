use super::{Scheduler, VirtualTime};
use crate::stream::{Event, Stream, StreamError};

/// What happens to a stream when its entry comes due.
pub enum Action<T> {
    Next(T),
    Error(StreamError),
    Complete,
    /// Delivers `value`, after first running `continuation` so it can
    /// enqueue the following tick.
    RepeatingTick {
        value: T,
        continuation: Box<dyn Continuation<T>>,
    },
}

impl<T> From<Event<T>> for Action<T> {
    fn from(event: Event<T>) -> Self {
        match event {
            Event::Next(value) => Self::Next(value),
            Event::Error(error) => Self::Error(error),
            Event::Complete => Self::Complete,
        }
    }
}

impl<T> std::fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Next(_) => f.write_str("Next"),
            Self::Error(error) => write!(f, "Error({error})"),
            Self::Complete => f.write_str("Complete"),
            Self::RepeatingTick { .. } => f.write_str("RepeatingTick"),
        }
    }
}

/// Follow-up work for a [`Action::RepeatingTick`].
pub trait Continuation<T> {
    /// Called when the tick carrying `value` fires at `fired_at`, before the
    /// value reaches `target`.
    fn resume(
        self: Box<Self>,
        scheduler: &Scheduler,
        target: &Stream<T>,
        value: &T,
        fired_at: VirtualTime,
    );
}

/// Type-erased queue entry.
pub(crate) trait Dispatch {
    fn dispatch(self: Box<Self>, scheduler: &Scheduler, fired_at: VirtualTime);
}

pub(crate) struct ScheduledAction<T> {
    pub(crate) target: Stream<T>,
    pub(crate) action: Action<T>,
}

impl<T: 'static> Dispatch for ScheduledAction<T> {
    fn dispatch(self: Box<Self>, scheduler: &Scheduler, fired_at: VirtualTime) {
        let Self { target, action } = *self;
        match action {
            Action::Next(value) => target.next(value),
            Action::Error(error) => target.error(error),
            Action::Complete => target.complete(),
            Action::RepeatingTick {
                value,
                continuation,
            } => {
                continuation.resume(scheduler, &target, &value, fired_at);
                target.next(value);
            }
        }
    }
}
