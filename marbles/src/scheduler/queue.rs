//! Ordered schedule queue with lazy cancellation.
//!
//! Entries live in an arena of slots; a binary heap orders `(due, seq)` keys
//! that point into the arena. Cancelling an entry only flips its slot's flag,
//! and the entry is discarded when its key reaches the front of the heap.
//!
//! # Invariants
//!
//! - Keys pop in ascending `due`, and FIFO (`seq`) among equal `due`.
//! - A slot is reused only after its key has been popped; its generation is
//!   bumped on release so stale tokens never match a new occupant.
//! - `slots.len() == live + free.len()` where `live` is the number of keys in
//!   the heap.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use super::VirtualTime;

/// Opaque handle to a scheduled entry, returned by
/// [`Scheduler::schedule`](super::Scheduler::schedule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancellationToken {
    slot: usize,
    generation: u64,
    due: VirtualTime,
}

impl CancellationToken {
    /// The virtual time the entry is due at.
    #[must_use]
    pub const fn due_time(&self) -> VirtualTime {
        self.due
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueKey {
    due: VirtualTime,
    seq: u64,
    slot: usize,
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Slot<E> {
    generation: u64,
    cancelled: bool,
    entry: Option<E>,
}

/// What came off the front of the queue.
pub(crate) enum Popped<E> {
    /// A live entry, due at the given time.
    Live(VirtualTime, E),
    /// A cancelled entry that was discarded.
    Cancelled(VirtualTime),
}

pub(crate) struct ScheduleQueue<E> {
    heap: BinaryHeap<Reverse<QueueKey>>,
    slots: Vec<Slot<E>>,
    free: Vec<usize>,
    next_seq: u64,
}

impl<E> ScheduleQueue<E> {
    pub(crate) const fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn insert(&mut self, due: VirtualTime, entry: E) -> CancellationToken {
        let slot = if let Some(slot) = self.free.pop() {
            let reused = &mut self.slots[slot];
            reused.cancelled = false;
            reused.entry = Some(entry);
            slot
        } else {
            self.slots.push(Slot {
                generation: 0,
                cancelled: false,
                entry: Some(entry),
            });
            self.slots.len() - 1
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(QueueKey { due, seq, slot }));

        CancellationToken {
            slot,
            generation: self.slots[slot].generation,
            due,
        }
    }

    /// Mark an entry cancelled. Returns `false` if it already left the queue.
    pub(crate) fn cancel(&mut self, token: CancellationToken) -> bool {
        match self.slots.get_mut(token.slot) {
            Some(slot)
                if slot.generation == token.generation
                    && slot.entry.is_some()
                    && !slot.cancelled =>
            {
                slot.cancelled = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn peek_due(&self) -> Option<VirtualTime> {
        self.heap.peek().map(|Reverse(key)| key.due)
    }

    pub(crate) fn pop(&mut self) -> Option<Popped<E>> {
        let Reverse(key) = self.heap.pop()?;
        let slot = &mut self.slots[key.slot];
        let entry = slot.entry.take();
        let cancelled = slot.cancelled;
        slot.cancelled = false;
        slot.generation += 1;
        self.free.push(key.slot);

        match entry {
            Some(entry) if !cancelled => Some(Popped::Live(key.due, entry)),
            _ => Some(Popped::Cancelled(key.due)),
        }
    }

    /// Number of queued entries, cancelled ones included.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut ScheduleQueue<&'static str>) -> Vec<(VirtualTime, &'static str)> {
        let mut out = Vec::new();
        while let Some(popped) = queue.pop() {
            if let Popped::Live(due, entry) = popped {
                out.push((due, entry));
            }
        }
        out
    }

    #[test]
    fn test_orders_by_due_time() {
        let mut queue = ScheduleQueue::new();
        queue.insert(30, "c");
        queue.insert(10, "a");
        queue.insert(20, "b");

        assert_eq!(drain(&mut queue), vec![(10, "a"), (20, "b"), (30, "c")]);
    }

    #[test]
    fn test_equal_due_times_are_fifo() {
        let mut queue = ScheduleQueue::new();
        for name in ["first", "second", "third", "fourth"] {
            queue.insert(5, name);
        }

        let order: Vec<_> = drain(&mut queue).into_iter().map(|(_, e)| e).collect();
        assert_eq!(order, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_cancel_is_lazy() {
        let mut queue = ScheduleQueue::new();
        let doomed = queue.insert(10, "doomed");
        queue.insert(20, "kept");

        assert!(queue.cancel(doomed));
        // Still occupies the queue until popped.
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek_due(), Some(10));

        assert!(matches!(queue.pop(), Some(Popped::Cancelled(10))));
        assert!(matches!(queue.pop(), Some(Popped::Live(20, "kept"))));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_cancel_twice_or_after_pop_is_noop() {
        let mut queue = ScheduleQueue::new();
        let token = queue.insert(10, "a");

        assert!(queue.cancel(token));
        assert!(!queue.cancel(token));

        let popped_token = queue.insert(11, "b");
        let _ = queue.pop();
        let _ = queue.pop();
        assert!(!queue.cancel(popped_token));
    }

    #[test]
    fn test_stale_token_does_not_hit_reused_slot() {
        let mut queue = ScheduleQueue::new();
        let stale = queue.insert(1, "old");
        let _ = queue.pop();

        // Reuses the freed slot.
        let fresh = queue.insert(2, "new");
        assert!(!queue.cancel(stale));
        assert_eq!(drain(&mut queue), vec![(2, "new")]);
        assert_ne!(stale, fresh);
    }

    #[test]
    fn test_token_reports_due_time() {
        let mut queue = ScheduleQueue::new();
        let token = queue.insert(42, "x");
        assert_eq!(token.due_time(), 42);
    }
}
