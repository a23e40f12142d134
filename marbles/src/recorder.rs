//! Materializes a stream's full history as a single value.

use serde::{Deserialize, Serialize};

use crate::scheduler::{Scheduler, VirtualTime};
use crate::stream::{Event, Sink, Stream};

/// One notification, stamped with the virtual time it was observed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry<T> {
    pub offset: VirtualTime,
    #[serde(flatten)]
    pub event: Event<T>,
}

impl Scheduler {
    /// Record every notification of `stream`.
    ///
    /// The returned stream emits the complete log exactly once, when `stream`
    /// completes or errors, and then completes itself. Recording begins when
    /// the returned stream gets its first listener; later listeners share that
    /// log instead of starting their own.
    #[must_use]
    pub fn record<T: Clone + 'static>(&self, stream: &Stream<T>) -> Stream<Vec<LogEntry<T>>> {
        #[allow(clippy::disallowed_methods)] // Scheduler clone shares the clock
        let scheduler = self.clone();
        #[allow(clippy::disallowed_methods)]
        let sources = vec![stream.clone()];
        Stream::relay(sources, move |sink: Sink<Vec<LogEntry<T>>>| {
            #[allow(clippy::disallowed_methods)]
            let clock = scheduler.clone();
            let mut log = Vec::new();
            move |event: &Event<T>| {
                log.push(LogEntry {
                    offset: clock.now(),
                    event: event.clone(),
                });
                if event.is_terminal() {
                    tracing::trace!("recorded {} entries", log.len());
                    sink.next(std::mem::take(&mut log));
                    sink.complete();
                }
            }
        })
    }
}
