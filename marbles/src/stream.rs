//! Driveable single-threaded streams.
//!
//! A [`Stream`] is the minimal reactive contract the scheduler needs:
//! it can be constructed and pushed into from the outside, and listeners can
//! subscribe to its `Next` / `Error` / `Complete` notifications.
//!
//! # Laziness
//!
//! Streams built with [`Stream::with_producer`] (and every combinator) are
//! lazy: the [`Producer`] starts when the first listener subscribes and stops
//! when the last listener leaves or the stream terminates. Streams built with
//! [`Stream::new`] have no producer and are driven purely by pushes, which is
//! how the scheduler feeds diagram streams.
//!
//! # Invariants
//!
//! - Nothing is delivered after a terminal notification (`Error` or `Complete`).
//! - A terminated stream drops all of its listeners and stops its producer.
//! - Notifications pushed while the stream is already dispatching are queued
//!   and delivered in push order once the current notification finishes.
//! - Listeners may subscribe or unsubscribe (including themselves) from inside
//!   a dispatch.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

/// Error payload carried by a stream's terminal `Error` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl StreamError {
    /// Create a stream error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream error: {}", self.message)
    }
}

impl std::error::Error for StreamError {}

/// A notification delivered to stream listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Event<T> {
    /// A value.
    Next(T),
    /// Terminal failure.
    Error(StreamError),
    /// Terminal success.
    Complete,
}

impl<T> Event<T> {
    /// Whether this notification ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Complete)
    }
}

/// The source behind a lazy stream.
///
/// `start` is called when the first listener subscribes, `stop` when the last
/// listener leaves or the stream terminates. A producer may be started again
/// after being stopped.
pub trait Producer<T> {
    /// Begin pushing notifications into `sink`.
    fn start(&mut self, sink: Sink<T>);
    /// Stop pushing notifications and release upstream resources.
    fn stop(&mut self);
}

type Listener<T> = Box<dyn FnMut(&Event<T>)>;

/// Builds a fresh event handler each time a relay stream starts.
type HandlerFactory<T, U> = Rc<dyn Fn(Sink<U>) -> Box<dyn FnMut(&Event<T>)>>;

struct Core<T> {
    listeners: Vec<(u64, Listener<T>)>,
    next_listener_id: u64,
    producer: Option<Box<dyn Producer<T>>>,
    producing: bool,
    dispatching: bool,
    /// Listeners removed while their list was taken out for dispatch.
    removed: Vec<u64>,
    queued: VecDeque<Event<T>>,
    terminated: bool,
}

impl<T> Core<T> {
    fn new(producer: Option<Box<dyn Producer<T>>>) -> Self {
        Self {
            listeners: Vec::new(),
            next_listener_id: 0,
            producer,
            producing: false,
            dispatching: false,
            removed: Vec::new(),
            queued: VecDeque::new(),
            terminated: false,
        }
    }

    /// Take the producer out if it is running with nobody left to feed.
    fn idle_producer(&mut self) -> Option<Box<dyn Producer<T>>> {
        if self.producing && !self.dispatching && self.listeners.is_empty() {
            self.producing = false;
            return self.producer.take();
        }
        None
    }
}

/// A handle to a single-threaded stream.
///
/// Cloning the handle is cheap and yields another handle to the same stream.
pub struct Stream<T> {
    core: Rc<RefCell<Core<T>>>,
}

impl<T> Clone for Stream<T> {
    #[allow(clippy::disallowed_methods)] // Rc::clone is the handle copy
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("Stream")
            .field("listeners", &core.listeners.len())
            .field("producing", &core.producing)
            .field("terminated", &core.terminated)
            .finish()
    }
}

/// A weak, push-only handle given to producers.
///
/// Pushing into a sink whose stream has been dropped is a no-op.
pub struct Sink<T> {
    core: Weak<RefCell<Core<T>>>,
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

impl<T: 'static> Sink<T> {
    /// Push a value.
    pub fn next(&self, value: T) {
        self.push(Event::Next(value));
    }

    /// Push a terminal error.
    pub fn error(&self, error: StreamError) {
        self.push(Event::Error(error));
    }

    /// Push a terminal completion.
    pub fn complete(&self) {
        self.push(Event::Complete);
    }

    /// Push an arbitrary notification.
    pub fn push(&self, event: Event<T>) {
        if let Some(core) = self.core.upgrade() {
            emit(&core, event);
        }
    }

    /// Upgrade to a strong stream handle, if the stream is still alive.
    #[must_use]
    pub fn stream(&self) -> Option<Stream<T>> {
        self.core.upgrade().map(|core| Stream { core })
    }
}

/// A listener registration.
///
/// Dropping a `Subscription` does not detach the listener; call
/// [`Subscription::unsubscribe`] to do that.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    const fn inert() -> Self {
        Self { detach: None }
    }

    /// Detach the listener from its stream.
    ///
    /// If this was the last listener of a lazy stream, its producer stops.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

impl<T: 'static> Default for Stream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Stream<T> {
    /// Create a stream driven only by pushes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Rc::new(RefCell::new(Core::new(None))),
        }
    }

    /// Create a lazy stream backed by `producer`.
    #[must_use]
    pub fn with_producer(producer: impl Producer<T> + 'static) -> Self {
        Self {
            core: Rc::new(RefCell::new(Core::new(Some(Box::new(producer))))),
        }
    }

    /// Create a lazy stream that listens to `sources` while it has listeners.
    ///
    /// `factory` is invoked on every start to build a fresh handler, so
    /// per-start state (counters, timers) lives inside the handler.
    /// Every source feeds the same handler; notifications that reach it while
    /// it is already running are queued and handled in arrival order.
    #[must_use]
    pub fn relay<S, F, H>(sources: Vec<Stream<S>>, factory: F) -> Self
    where
        S: Clone + 'static,
        F: Fn(Sink<T>) -> H + 'static,
        H: FnMut(&Event<S>) + 'static,
    {
        let factory: HandlerFactory<S, T> =
            Rc::new(move |sink| -> Box<dyn FnMut(&Event<S>)> { Box::new(factory(sink)) });
        Self::with_producer(Relay {
            sources,
            factory,
            subscriptions: Vec::new(),
        })
    }

    /// Push a value.
    pub fn next(&self, value: T) {
        emit(&self.core, Event::Next(value));
    }

    /// Push a terminal error.
    pub fn error(&self, error: StreamError) {
        emit(&self.core, Event::Error(error));
    }

    /// Push a terminal completion.
    pub fn complete(&self) {
        emit(&self.core, Event::Complete);
    }

    /// Push an arbitrary notification.
    pub fn push(&self, event: Event<T>) {
        emit(&self.core, event);
    }

    /// A weak push handle to this stream.
    #[must_use]
    pub fn sink(&self) -> Sink<T> {
        Sink {
            core: Rc::downgrade(&self.core),
        }
    }

    /// Whether a terminal notification has been delivered.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.core.borrow().terminated
    }

    /// Number of attached listeners (excluding any mid-dispatch bookkeeping).
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.core.borrow().listeners.len()
    }

    /// Attach a listener.
    ///
    /// Subscribing to a terminated stream returns an inert subscription.
    /// If this is the first listener of a lazy stream, its producer starts
    /// before `subscribe` returns, so synchronous producers deliver to
    /// `listener` immediately.
    pub fn subscribe(&self, listener: impl FnMut(&Event<T>) + 'static) -> Subscription {
        let (id, producer) = {
            let mut core = self.core.borrow_mut();
            if core.terminated {
                return Subscription::inert();
            }
            let id = core.next_listener_id;
            core.next_listener_id += 1;
            core.listeners.push((id, Box::new(listener)));
            let producer = if core.producing {
                None
            } else {
                core.producer.take()
            };
            if producer.is_some() {
                core.producing = true;
            }
            (id, producer)
        };

        if let Some(mut producer) = producer {
            producer.start(self.sink());
            let stop_now = {
                let core = self.core.borrow();
                core.terminated || core.listeners.is_empty()
            };
            if stop_now {
                producer.stop();
                self.core.borrow_mut().producing = false;
            }
            self.core.borrow_mut().producer = Some(producer);
        }

        let weak = Rc::downgrade(&self.core);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    detach(&core, id);
                }
            })),
        }
    }

    /// Apply an operator to this stream.
    pub fn compose<U>(self, operator: impl FnOnce(Self) -> Stream<U>) -> Stream<U> {
        operator(self)
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// A lazy stream that emits `values` synchronously on start, then completes.
    #[must_use]
    pub fn of(values: impl IntoIterator<Item = T>) -> Self {
        Self::with_producer(Of {
            values: values.into_iter().collect(),
        })
    }

    /// Transform every value.
    #[must_use]
    pub fn map<U: 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Stream<U> {
        let f = Rc::new(f);
        Stream::relay(vec![self.clone()], move |sink: Sink<U>| {
            #[allow(clippy::disallowed_methods)] // Rc::clone shares the mapping fn
            let f = Rc::clone(&f);
            move |event: &Event<T>| match event {
                Event::Next(value) => sink.next(f(value)),
                Event::Error(error) => sink.error(error.clone()),
                Event::Complete => sink.complete(),
            }
        })
    }

    /// Keep only the values matching `predicate`.
    #[must_use]
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        let predicate = Rc::new(predicate);
        Self::relay(vec![self.clone()], move |sink: Sink<T>| {
            #[allow(clippy::disallowed_methods)] // Rc::clone shares the predicate
            let predicate = Rc::clone(&predicate);
            move |event: &Event<T>| match event {
                Event::Next(value) if !predicate(value) => {}
                other => sink.push(other.clone()),
            }
        })
    }

    /// Interleave several streams; completes once all of them complete.
    ///
    /// The first error from any input terminates the merged stream.
    #[must_use]
    pub fn merge(streams: &[Self]) -> Self {
        let total = streams.len();
        Self::relay(streams.to_vec(), move |sink: Sink<T>| {
            let mut completed = 0;
            move |event: &Event<T>| match event {
                Event::Complete => {
                    completed += 1;
                    if completed == total {
                        sink.complete();
                    }
                }
                other => sink.push(other.clone()),
            }
        })
    }

    /// Emit the first `count` values, then complete and detach from upstream.
    #[must_use]
    pub fn take(&self, count: usize) -> Self {
        Self::relay(vec![self.clone()], move |sink: Sink<T>| {
            if count == 0 {
                sink.complete();
            }
            let mut taken = 0;
            move |event: &Event<T>| {
                if taken >= count {
                    return;
                }
                match event {
                    Event::Next(value) => {
                        taken += 1;
                        sink.next(value.clone());
                        if taken == count {
                            sink.complete();
                        }
                    }
                    other => sink.push(other.clone()),
                }
            }
        })
    }

    /// Emit `seed` on start, then the running accumulation after every value.
    #[must_use]
    pub fn fold<A>(&self, seed: A, step: impl Fn(&A, &T) -> A + 'static) -> Stream<A>
    where
        A: Clone + 'static,
    {
        let step = Rc::new(step);
        Stream::relay(vec![self.clone()], move |sink: Sink<A>| {
            #[allow(clippy::disallowed_methods)] // Rc::clone shares the step fn
            let step = Rc::clone(&step);
            let mut accumulated = seed.clone();
            sink.next(accumulated.clone());
            move |event: &Event<T>| match event {
                Event::Next(value) => {
                    accumulated = step(&accumulated, value);
                    sink.next(accumulated.clone());
                }
                Event::Error(error) => sink.error(error.clone()),
                Event::Complete => sink.complete(),
            }
        })
    }
}

/// Deliver `event` to every listener, queueing it if a dispatch is running.
fn emit<T: 'static>(core: &Rc<RefCell<Core<T>>>, event: Event<T>) {
    {
        let mut state = core.borrow_mut();
        if state.dispatching {
            state.queued.push_back(event);
            return;
        }
        state.dispatching = true;
    }

    let mut current = Some(event);
    while let Some(event) = current {
        deliver(core, &event);
        current = core.borrow_mut().queued.pop_front();
    }

    let producer = {
        let mut state = core.borrow_mut();
        state.dispatching = false;
        state.idle_producer()
    };
    if let Some(producer) = producer {
        stop_producer(core, producer);
    }
}

fn deliver<T>(core: &Rc<RefCell<Core<T>>>, event: &Event<T>) {
    let mut listeners = {
        let mut state = core.borrow_mut();
        if state.terminated {
            return;
        }
        if event.is_terminal() {
            state.terminated = true;
        }
        std::mem::take(&mut state.listeners)
    };

    for (id, listener) in &mut listeners {
        if core.borrow().removed.contains(id) {
            continue;
        }
        listener(event);
    }

    let mut state = core.borrow_mut();
    let removed = std::mem::take(&mut state.removed);
    listeners.retain(|(id, _)| !removed.contains(id));
    listeners.append(&mut state.listeners);
    if state.terminated {
        listeners.clear();
        state.queued.clear();
    }
    state.listeners = listeners;
}

fn detach<T>(core: &Rc<RefCell<Core<T>>>, id: u64) {
    let producer = {
        let mut state = core.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        if state.dispatching && state.listeners.len() == before {
            state.removed.push(id);
        }
        state.idle_producer()
    };
    if let Some(producer) = producer {
        stop_producer(core, producer);
    }
}

fn stop_producer<T>(core: &Rc<RefCell<Core<T>>>, mut producer: Box<dyn Producer<T>>) {
    producer.stop();
    core.borrow_mut().producer = Some(producer);
}

struct Of<T> {
    values: Vec<T>,
}

impl<T: Clone + 'static> Producer<T> for Of<T> {
    fn start(&mut self, sink: Sink<T>) {
        for value in &self.values {
            sink.next(value.clone());
        }
        sink.complete();
    }

    fn stop(&mut self) {}
}

struct Relay<S, T> {
    sources: Vec<Stream<S>>,
    factory: HandlerFactory<S, T>,
    subscriptions: Vec<Subscription>,
}

impl<S: Clone + 'static, T: 'static> Producer<T> for Relay<S, T> {
    fn start(&mut self, sink: Sink<T>) {
        let handler = Rc::new(RelayHandler {
            output: sink.stream(),
            handler: RefCell::new((self.factory)(sink)),
            pending: RefCell::new(VecDeque::new()),
        });
        for source in &self.sources {
            #[allow(clippy::disallowed_methods)] // Rc::clone shares the handler across sources
            let handler = Rc::clone(&handler);
            let subscription = source.subscribe(move |event| handler.handle(event));
            self.subscriptions.push(subscription);
        }
    }

    fn stop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

/// Handler shared by every source of one relay start.
///
/// Holds the output strongly until `stop` detaches the sources, so an output
/// nobody else references keeps running while it has listeners.
struct RelayHandler<S, T> {
    output: Option<Stream<T>>,
    handler: RefCell<Box<dyn FnMut(&Event<S>)>>,
    /// Events that arrived while the handler was running, e.g. a downstream
    /// listener pushing back into a source.
    pending: RefCell<VecDeque<Event<S>>>,
}

impl<S: Clone, T: 'static> RelayHandler<S, T> {
    fn is_live(&self) -> bool {
        self.output.as_ref().is_some_and(|output| !output.is_terminated())
    }

    fn handle(&self, event: &Event<S>) {
        if !self.is_live() {
            return;
        }
        let Ok(mut handler) = self.handler.try_borrow_mut() else {
            self.pending.borrow_mut().push_back(event.clone());
            return;
        };

        (*handler)(event);
        while self.is_live() {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            (*handler)(&event);
        }
        self.pending.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn collect<T: Clone + 'static>(stream: &Stream<T>) -> Rc<RefCell<Vec<Event<T>>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _ = stream.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    #[test]
    fn test_push_reaches_listeners() {
        let stream = Stream::new();
        let seen = collect(&stream);

        stream.next(1);
        stream.next(2);
        stream.complete();

        assert_eq!(
            *seen.borrow(),
            vec![Event::Next(1), Event::Next(2), Event::Complete]
        );
    }

    #[test]
    fn test_nothing_after_terminal() {
        let stream = Stream::new();
        let seen = collect(&stream);

        stream.error(StreamError::new("boom"));
        stream.next(1);
        stream.complete();

        assert_eq!(*seen.borrow(), vec![Event::Error(StreamError::new("boom"))]);
        assert!(stream.is_terminated());
        assert_eq!(stream.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let stream = Stream::new();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let subscription = stream.subscribe(move |_| counter.set(counter.get() + 1));

        stream.next(1);
        subscription.unsubscribe();
        stream.next(2);

        assert_eq!(seen.get(), 1);
        assert_eq!(stream.listener_count(), 0);
    }

    #[test]
    fn test_of_is_lazy() {
        let stream = Stream::of(vec!['a', 'b']);
        let seen = collect(&stream);

        assert_eq!(
            *seen.borrow(),
            vec![Event::Next('a'), Event::Next('b'), Event::Complete]
        );
    }

    #[test]
    fn test_map_filter_chain() {
        let source = Stream::new();
        let doubled_evens = source.filter(|n: &i32| n % 2 == 0).map(|n| n * 2);
        let seen = collect(&doubled_evens);

        for n in 1..=4 {
            source.next(n);
        }
        source.complete();

        assert_eq!(
            *seen.borrow(),
            vec![Event::Next(4), Event::Next(8), Event::Complete]
        );
    }

    #[test]
    fn test_merge_completes_after_all_inputs() {
        let a = Stream::new();
        let b = Stream::new();
        let merged = Stream::merge(&[a.clone(), b.clone()]);
        let seen = collect(&merged);

        a.next(1);
        b.next(2);
        a.complete();
        assert!(!merged.is_terminated());
        b.complete();

        assert_eq!(
            *seen.borrow(),
            vec![Event::Next(1), Event::Next(2), Event::Complete]
        );
    }

    #[test]
    fn test_merge_handles_value_fed_back_into_source() {
        let a = Stream::new();
        let b = Stream::new();
        let merged = Stream::merge(&[a.clone(), b.clone()]);
        let seen = collect(&merged);
        let feedback = b.clone();
        let _ = merged.subscribe(move |event| {
            if event == &Event::Next('x') {
                feedback.next('y');
            }
        });

        a.next('x');

        assert_eq!(*seen.borrow(), vec![Event::Next('x'), Event::Next('y')]);
    }

    #[test]
    fn test_map_handles_reentrant_push_in_order() {
        let source = Stream::new();
        let doubled = source.map(|n: &i32| n * 2);
        let seen = collect(&doubled);
        let feedback = source.clone();
        let _ = doubled.subscribe(move |event| {
            if let Event::Next(n) = event
                && *n < 8
            {
                feedback.next(*n);
            }
        });

        source.next(1);

        assert_eq!(
            *seen.borrow(),
            vec![Event::Next(2), Event::Next(4), Event::Next(8)]
        );
    }

    #[test]
    fn test_take_detaches_upstream() {
        let source = Stream::new();
        let first_two = source.take(2);
        let seen = collect(&first_two);
        assert_eq!(source.listener_count(), 1);

        source.next(1);
        source.next(2);
        source.next(3);

        assert_eq!(
            *seen.borrow(),
            vec![Event::Next(1), Event::Next(2), Event::Complete]
        );
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_take_zero_completes_immediately() {
        let source: Stream<i32> = Stream::new();
        let none = source.take(0);
        let seen = collect(&none);

        assert_eq!(*seen.borrow(), vec![Event::Complete]);
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_fold_emits_seed_first() {
        let source = Stream::new();
        let total = source.fold(0, |acc: &i32, n: &i32| acc + n);
        let seen = collect(&total);

        source.next(1);
        source.next(1);
        source.complete();

        assert_eq!(
            *seen.borrow(),
            vec![
                Event::Next(0),
                Event::Next(1),
                Event::Next(2),
                Event::Complete
            ]
        );
    }

    #[test]
    fn test_push_during_dispatch_is_queued_in_order() {
        let stream = Stream::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let echo = stream.sink();
        let log = Rc::clone(&seen);
        let _ = stream.subscribe(move |event: &Event<i32>| {
            if let Event::Next(n) = event {
                log.borrow_mut().push(*n);
                if *n == 1 {
                    echo.next(10);
                }
            }
        });

        stream.next(1);
        stream.next(2);

        assert_eq!(*seen.borrow(), vec![1, 10, 2]);
    }

    #[test]
    fn test_producer_stops_when_last_listener_leaves() {
        struct Flag(Rc<Cell<bool>>);

        impl Producer<i32> for Flag {
            fn start(&mut self, _sink: Sink<i32>) {
                self.0.set(true);
            }

            fn stop(&mut self) {
                self.0.set(false);
            }
        }

        let running = Rc::new(Cell::new(false));
        let stream = Stream::with_producer(Flag(Rc::clone(&running)));
        assert!(!running.get());

        let first = stream.subscribe(|_| {});
        let second = stream.subscribe(|_| {});
        assert!(running.get());

        first.unsubscribe();
        assert!(running.get());
        second.unsubscribe();
        assert!(!running.get());
    }

    #[test]
    fn test_event_serializes_tagged() {
        let json = serde_json::to_string(&Event::Next('a')).expect("serialize");
        assert_eq!(json, r#"{"type":"next","value":"a"}"#);

        let complete: Event<char> = serde_json::from_str(r#"{"type":"complete"}"#).expect("parse");
        assert_eq!(complete, Event::Complete);
    }
}
