//! Result array and completion counter
//!
//! Every slot owns one write-once cell. Lanes write disjoint cells, then
//! decrement the shared counter; the decrement that reaches zero belongs to
//! the lane that finalizes the batch.

use crossbeam::atomic::AtomicCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::{ItemOutcome, ResponseItem};

/// Fixed-size, index-addressed outcome storage for one batch
pub struct ResultArray<T> {
    cells: Box<[AtomicCell<Option<Box<ItemOutcome<T>>>>]>,
}

impl<T> ResultArray<T> {
    pub fn new(size: usize) -> Self {
        Self {
            cells: (0..size).map(|_| AtomicCell::new(None)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Store the outcome for `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the slot was already written.
    pub fn set(&self, index: usize, outcome: ItemOutcome<T>) {
        let cell = self.cells.get(index).unwrap_or_else(|| {
            panic!(
                "result index {index} out of bounds for batch of {}",
                self.cells.len()
            )
        });
        if cell.swap(Some(Box::new(outcome))).is_some() {
            panic!("result slot {index} written twice");
        }
    }

    /// Move every outcome out, in index order.
    ///
    /// # Panics
    ///
    /// Panics if any slot was never written.
    pub fn take_all(&self) -> Vec<ResponseItem<T>> {
        self.cells
            .iter()
            .enumerate()
            .map(|(index, cell)| match cell.take() {
                Some(outcome) => ResponseItem::new(index, *outcome),
                None => panic!("result slot {index} finalized before it was written"),
            })
            .collect()
    }
}

/// Countdown of outstanding slots
#[derive(Debug)]
pub struct CompletionCounter {
    remaining: AtomicUsize,
}

impl CompletionCounter {
    pub fn new(size: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(size),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Count one completion. Returns `true` only for the call that brings
    /// the counter to zero.
    ///
    /// # Panics
    ///
    /// Panics if the counter is already at zero.
    pub fn complete_one(&self) -> bool {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous == 1,
            Err(_) => panic!("completion counter decremented below zero"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_take_all_in_index_order() {
        let results = ResultArray::new(3);
        results.set(2, ItemOutcome::Success("c"));
        results.set(0, ItemOutcome::Success("a"));
        results.set(1, ItemOutcome::Failure(anyhow::anyhow!("b failed")));

        let items = results.take_all();
        let indices: Vec<_> = items.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(items[0].outcome.value(), Some(&"a"));
        assert!(items[1].outcome.is_failure());
    }

    #[test]
    #[should_panic(expected = "written twice")]
    fn test_double_write_panics() {
        let results = ResultArray::new(1);
        results.set(0, ItemOutcome::Success(1));
        results.set(0, ItemOutcome::Success(2));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_panics() {
        let results = ResultArray::new(1);
        results.set(1, ItemOutcome::Success(1));
    }

    #[test]
    #[should_panic(expected = "before it was written")]
    fn test_take_missing_panics() {
        let results: ResultArray<u8> = ResultArray::new(2);
        results.set(0, ItemOutcome::Success(1));
        results.take_all();
    }

    #[test]
    fn test_cells_are_lock_free() {
        assert!(AtomicCell::<Option<Box<ItemOutcome<u64>>>>::is_lock_free());
    }

    #[test]
    fn test_counter_reaches_zero_once() {
        let counter = CompletionCounter::new(2);
        assert!(!counter.complete_one());
        assert!(counter.complete_one());
        assert_eq!(counter.remaining(), 0);
    }

    #[test]
    #[should_panic(expected = "below zero")]
    fn test_counter_underflow_panics() {
        let counter = CompletionCounter::new(1);
        counter.complete_one();
        counter.complete_one();
    }

    #[test]
    fn test_single_finalizer_under_contention() {
        let counter = Arc::new(CompletionCounter::new(10_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let counter = counter.clone();
                thread::spawn(move || {
                    let mut zero_seen = 0;
                    for _ in (t..10_000).step_by(8) {
                        if counter.complete_one() {
                            zero_seen += 1;
                        }
                    }
                    zero_seen
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1);
    }
}
