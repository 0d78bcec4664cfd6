//! Slot queue
//!
//! Ordered, lock-free queue of pending work items paired with their batch
//! index. Popping a slot is the only point that decides which lane runs it.

use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicBool, Ordering};

/// A pending work item and its position in the original batch
#[derive(Debug)]
pub struct Slot<P> {
    pub index: usize,
    pub payload: P,
}

/// FIFO queue filled once per batch
#[derive(Debug)]
pub struct SlotQueue<P> {
    slots: SegQueue<Slot<P>>,
    sealed: AtomicBool,
}

impl<P> SlotQueue<P> {
    pub fn new() -> Self {
        Self {
            slots: SegQueue::new(),
            sealed: AtomicBool::new(false),
        }
    }

    /// Populate the queue in submission order.
    ///
    /// # Panics
    ///
    /// Panics if the queue was already filled; a batch queue is never refilled.
    pub fn enqueue_all(&self, items: impl IntoIterator<Item = P>) {
        if self.sealed.swap(true, Ordering::AcqRel) {
            panic!("slot queue was filled twice for the same batch");
        }
        for (index, payload) in items.into_iter().enumerate() {
            self.slots.push(Slot { index, payload });
        }
    }

    /// Take the next pending slot without blocking
    pub fn try_pop(&self) -> Option<Slot<P>> {
        self.slots.pop()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<P> Default for SlotQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}
