//! Host-side suspension points for the drain loops.

use std::time::Duration;

use futures::future::{self, LocalBoxFuture};

/// Where the scheduler hands control back to its host.
///
/// `run` awaits `yield_now` after every dispatched entry; `run_realtime`
/// awaits `next_frame` between frames.
pub trait TaskQueue {
    fn yield_now(&self) -> LocalBoxFuture<'static, ()>;

    fn next_frame(&self) -> LocalBoxFuture<'static, ()>;
}

/// Suspends through the ambient tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct TokioTaskQueue {
    frame_interval: Duration,
}

impl TokioTaskQueue {
    #[must_use]
    pub const fn new(frame_interval: Duration) -> Self {
        Self { frame_interval }
    }
}

impl TaskQueue for TokioTaskQueue {
    fn yield_now(&self) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::task::yield_now())
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(self.frame_interval))
    }
}

/// Never suspends. Draining with it is effectively synchronous.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateTaskQueue;

impl TaskQueue for ImmediateTaskQueue {
    fn yield_now(&self) -> LocalBoxFuture<'static, ()> {
        Box::pin(future::ready(()))
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        Box::pin(future::ready(()))
    }
}
