//! Time-shifting operators.
//!
//! Each operator reacts to upstream notifications by queueing derived entries
//! on the scheduler rather than emitting directly, so its output always
//! follows virtual time. Operator state (last emission, pending debounce
//! entry) is per subscription.

use std::cell::Cell;
use std::rc::Rc;

use crate::scheduler::{Action, CancellationToken, Continuation, Scheduler, VirtualTime};
use crate::stream::{Event, Producer, Sink, Stream};

impl Scheduler {
    /// Shift every notification `delay` units later.
    pub fn delay<T: Clone + 'static>(
        &self,
        delay: VirtualTime,
    ) -> impl FnOnce(Stream<T>) -> Stream<T> {
        #[allow(clippy::disallowed_methods)] // Scheduler clone shares the clock
        let scheduler = self.clone();
        move |source: Stream<T>| {
            Stream::relay(vec![source], move |sink: Sink<T>| {
                #[allow(clippy::disallowed_methods)]
                let clock = scheduler.clone();
                move |event: &Event<T>| {
                    if let Some(target) = sink.stream() {
                        clock.schedule_after(&target, delay, event.clone().into());
                    }
                }
            })
        }
    }

    /// Leading-edge throttle.
    ///
    /// A value passes only if more than `period` units have elapsed since the
    /// previous upstream value, whether that one passed or not.
    pub fn throttle<T: Clone + 'static>(
        &self,
        period: VirtualTime,
    ) -> impl FnOnce(Stream<T>) -> Stream<T> {
        #[allow(clippy::disallowed_methods)]
        let scheduler = self.clone();
        move |source: Stream<T>| {
            Stream::relay(vec![source], move |sink: Sink<T>| {
                #[allow(clippy::disallowed_methods)]
                let clock = scheduler.clone();
                let mut last_seen: Option<VirtualTime> = None;
                move |event: &Event<T>| {
                    let Some(target) = sink.stream() else {
                        return;
                    };
                    let now = clock.now();
                    if let Event::Next(value) = event {
                        let passes = last_seen.is_none_or(|last| now.saturating_sub(last) > period);
                        if passes {
                            clock.schedule(&target, now, Action::Next(value.clone()));
                        }
                        last_seen = Some(now);
                    } else {
                        clock.schedule(&target, now, event.clone().into());
                    }
                }
            })
        }
    }

    /// Trailing-edge debounce.
    ///
    /// Every value is queued `period` units later; a queued value is
    /// cancelled when a newer one arrives within `period` of it. Completion
    /// and errors are queued immediately and can overtake a pending value.
    pub fn debounce<T: Clone + 'static>(
        &self,
        period: VirtualTime,
    ) -> impl FnOnce(Stream<T>) -> Stream<T> {
        #[allow(clippy::disallowed_methods)]
        let scheduler = self.clone();
        move |source: Stream<T>| {
            Stream::relay(vec![source], move |sink: Sink<T>| {
                #[allow(clippy::disallowed_methods)]
                let clock = scheduler.clone();
                let mut pending: Option<CancellationToken> = None;
                move |event: &Event<T>| {
                    let Some(target) = sink.stream() else {
                        return;
                    };
                    let now = clock.now();
                    if let Event::Next(value) = event {
                        let candidate = now.saturating_add(period);
                        if let Some(previous) = pending.take()
                            && candidate.saturating_sub(previous.due_time()) <= period
                        {
                            clock.cancel(previous);
                        }
                        pending =
                            Some(clock.schedule(&target, candidate, Action::Next(value.clone())));
                    } else {
                        clock.schedule(&target, now, event.clone().into());
                    }
                }
            })
        }
    }

    /// Lazy counter emitting `0, 1, 2, ...` every `period` units, starting
    /// one period after the first subscription.
    ///
    /// Never completes on its own; bound it with [`Stream::take`] before
    /// calling [`Scheduler::run`].
    #[must_use]
    pub fn interval(&self, period: VirtualTime) -> Stream<u64> {
        #[allow(clippy::disallowed_methods)]
        let scheduler = self.clone();
        Stream::with_producer(IntervalProducer {
            scheduler,
            period,
            stopped: Rc::new(Cell::new(false)),
        })
    }

    /// Alias for [`Scheduler::interval`].
    #[must_use]
    pub fn periodic(&self, period: VirtualTime) -> Stream<u64> {
        self.interval(period)
    }
}

struct IntervalProducer {
    scheduler: Scheduler,
    period: VirtualTime,
    stopped: Rc<Cell<bool>>,
}

impl Producer<u64> for IntervalProducer {
    fn start(&mut self, sink: Sink<u64>) {
        let Some(target) = sink.stream() else {
            return;
        };
        // Fresh flag per start so an earlier run's stray tick can't revive.
        self.stopped = Rc::new(Cell::new(false));
        #[allow(clippy::disallowed_methods)]
        let stopped = Rc::clone(&self.stopped);
        self.scheduler.schedule_after(
            &target,
            self.period,
            Action::RepeatingTick {
                value: 0,
                continuation: Box::new(IntervalTick {
                    period: self.period,
                    stopped,
                }),
            },
        );
    }

    fn stop(&mut self) {
        self.stopped.set(true);
    }
}

struct IntervalTick {
    period: VirtualTime,
    stopped: Rc<Cell<bool>>,
}

impl Continuation<u64> for IntervalTick {
    fn resume(
        self: Box<Self>,
        scheduler: &Scheduler,
        target: &Stream<u64>,
        value: &u64,
        fired_at: VirtualTime,
    ) {
        if self.stopped.get() {
            return;
        }
        let due = fired_at.saturating_add(self.period);
        scheduler.schedule(
            target,
            due,
            Action::RepeatingTick {
                value: value + 1,
                continuation: self,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeConfig;
    use crate::scheduler::ImmediateTaskQueue;
    use crate::time_source::SimulatedTimeSource;
    use std::cell::RefCell;

    fn scheduler() -> Scheduler {
        Scheduler::with_parts(
            TimeConfig::default(),
            ImmediateTaskQueue,
            SimulatedTimeSource::new(0),
        )
    }

    fn timeline<T: Clone + 'static>(
        scheduler: &Scheduler,
        stream: &Stream<T>,
    ) -> Rc<RefCell<Vec<(VirtualTime, Event<T>)>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let clock = scheduler.clone();
        let _ = stream.subscribe(move |event: &Event<T>| {
            sink.borrow_mut().push((clock.now(), event.clone()));
        });
        seen
    }

    #[tokio::test]
    async fn test_delay_shifts_everything() {
        let scheduler = scheduler();
        let delayed = scheduler
            .diagram("-a-b|")
            .unwrap()
            .compose(scheduler.delay(15));
        let seen = timeline(&scheduler, &delayed);

        scheduler.run().await.unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (55, Event::Next('a')),
                (95, Event::Next('b')),
                (115, Event::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn test_throttle_drop_still_resets_window() {
        let scheduler = scheduler();
        let source = Stream::new();
        for (due, value) in [(0, 1), (10, 2), (20, 3), (35, 4)] {
            scheduler.schedule(&source, due, Action::Next(value));
        }
        scheduler.schedule(&source, 40, Action::Complete);
        let throttled = source.compose(scheduler.throttle(12));
        let seen = timeline(&scheduler, &throttled);

        scheduler.run().await.unwrap();

        // 2 and 3 arrive within 12 of the previous value; 4 arrives 15 later.
        assert_eq!(
            *seen.borrow(),
            vec![(0, Event::Next(1)), (35, Event::Next(4)), (40, Event::Complete)]
        );
    }

    #[tokio::test]
    async fn test_debounce_emits_last_of_burst() {
        let scheduler = scheduler();
        let source = Stream::new();
        for (due, value) in [(0, 'a'), (5, 'b'), (8, 'c'), (50, 'd')] {
            scheduler.schedule(&source, due, Action::Next(value));
        }
        scheduler.schedule(&source, 100, Action::Complete);
        let debounced = source.compose(scheduler.debounce(10));
        let seen = timeline(&scheduler, &debounced);

        scheduler.run().await.unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (18, Event::Next('c')),
                (60, Event::Next('d')),
                (100, Event::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn test_debounce_complete_overtakes_pending_value() {
        let scheduler = scheduler();
        let source = Stream::new();
        scheduler.schedule(&source, 10, Action::Next('a'));
        scheduler.schedule(&source, 12, Action::Complete);
        let debounced = source.compose(scheduler.debounce(30));
        let seen = timeline(&scheduler, &debounced);

        scheduler.run().await.unwrap();

        assert_eq!(*seen.borrow(), vec![(12, Event::Complete)]);
    }

    #[tokio::test]
    async fn test_interval_with_take() {
        let scheduler = scheduler();
        let ticks = scheduler.interval(10).take(3);
        let seen = timeline(&scheduler, &ticks);

        scheduler.run().await.unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (10, Event::Next(0)),
                (20, Event::Next(1)),
                (30, Event::Next(2)),
                (30, Event::Complete),
            ]
        );
        // One stray tick fired into no listeners after the stop.
        assert_eq!(scheduler.now(), 40);
        assert_eq!(scheduler.pending_entries(), 0);
    }

    #[tokio::test]
    async fn test_interval_starts_relative_to_subscription() {
        let scheduler = scheduler();
        let trigger: Stream<u8> = Stream::new();
        scheduler.schedule(&trigger, 100, Action::Complete);
        scheduler.run().await.unwrap();

        let ticks = scheduler.periodic(25).take(2);
        let seen = timeline(&scheduler, &ticks);
        scheduler.run().await.unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (125, Event::Next(0)),
                (150, Event::Next(1)),
                (150, Event::Complete),
            ]
        );
    }
}
