//! Data models for batch dispatch
//!
//! This module contains the response structures handed back to callers.

mod response;

pub use response::{AggregateResponse, ItemOutcome, ResponseItem};
