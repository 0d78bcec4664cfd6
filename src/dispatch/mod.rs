//! Batch dispatch engine
//!
//! Queues a batch of independent items, runs them on a bounded set of lanes
//! and collects every outcome into its original slot.

pub mod clock;
mod dispatcher;
mod executor;
mod queue;
mod results;

pub use clock::{Clock, ClockReading, ManualClock, SystemClock};
pub use dispatcher::{
    default_concurrency, BatchHandle, BatchPhase, BatchRequest, DequeueHook, DispatchResult,
    Dispatcher, PendingBatch,
};
pub use executor::{ItemExecutor, SharedExecutor};
pub use queue::{Slot, SlotQueue};
pub use results::{CompletionCounter, ResultArray};
