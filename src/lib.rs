//! # `batch_dispatch`
//!
//! Dispatches an ordered batch of independent items concurrently and reports
//! a single aggregate response carrying every item's outcome, in submission
//! order, together with the total took time.
//!
//! ## Example
//!
//! ```rust
//! use batch_dispatch::{Dispatcher, ManualClock};
//! use std::sync::Arc;
//! use tokio::runtime::Handle;
//!
//! # #[tokio::main(flavor = "multi_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let clock = Arc::new(ManualClock::new());
//! let hook_clock = clock.clone();
//!
//! let dispatcher = Dispatcher::new(Handle::current(), |query: &'static str| async move {
//!     Ok::<_, anyhow::Error>(query.len())
//! })
//! .with_shared_clock(clock)
//! .with_max_concurrent(4)
//! .on_dequeue(move |_, _| hook_clock.set_nanos(1_000_000));
//!
//! let response = dispatcher.dispatch(vec!["alpha", "beta"]).await?;
//! assert_eq!(response.len(), 2);
//! assert_eq!(response.took_millis(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - Bounded lanes: at most `max_concurrent` items run at once, however large the batch
//! - Results land in their original slot regardless of completion order
//! - Exactly one response per batch, delivered by the last completing item
//! - Pluggable clock: real monotonic time or a controllable clock for tests
//! - Per-item failures and panics are recorded, never abort the batch

pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod output;
pub mod simulate;
pub mod utils;

pub use dispatch::{
    BatchHandle, BatchPhase, BatchRequest, Clock, ClockReading, Dispatcher, ItemExecutor,
    ManualClock, PendingBatch, SystemClock,
};
pub use error::DispatchError;
pub use models::{AggregateResponse, ItemOutcome, ResponseItem};
