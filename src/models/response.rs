//! Aggregate response models
//!
//! Defines per-slot outcomes and the single response delivered per batch.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Outcome recorded for one slot of a batch
#[derive(Debug)]
pub enum ItemOutcome<T> {
    Success(T),
    Failure(anyhow::Error),
}

impl<T> ItemOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Get the successful value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            ItemOutcome::Success(value) => Some(value),
            ItemOutcome::Failure(_) => None,
        }
    }

    /// Get the failure, if any
    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            ItemOutcome::Success(_) => None,
            ItemOutcome::Failure(err) => Some(err),
        }
    }

    pub fn into_result(self) -> anyhow::Result<T> {
        match self {
            ItemOutcome::Success(value) => Ok(value),
            ItemOutcome::Failure(err) => Err(err),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ItemOutcome::Success(_) => "success",
            ItemOutcome::Failure(_) => "failure",
        }
    }
}

impl<T> From<anyhow::Result<T>> for ItemOutcome<T> {
    fn from(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => ItemOutcome::Success(value),
            Err(err) => ItemOutcome::Failure(err),
        }
    }
}

/// One entry of the aggregate response
#[derive(Debug)]
pub struct ResponseItem<T> {
    pub index: usize,
    pub outcome: ItemOutcome<T>,
}

impl<T> ResponseItem<T> {
    pub fn new(index: usize, outcome: ItemOutcome<T>) -> Self {
        Self { index, outcome }
    }
}

impl<T: fmt::Debug> fmt::Display for ResponseItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ItemOutcome::Success(value) => write!(f, "#{} success: {:?}", self.index, value),
            ItemOutcome::Failure(err) => write!(f, "#{} failure: {:#}", self.index, err),
        }
    }
}

impl<T: Serialize> Serialize for ResponseItem<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("index", &self.index)?;
        map.serialize_entry("status", self.outcome.status())?;
        match &self.outcome {
            ItemOutcome::Success(value) => map.serialize_entry("response", value)?,
            ItemOutcome::Failure(err) => map.serialize_entry("error", &format!("{err:#}"))?,
        }
        map.end()
    }
}

/// Response for a whole batch: one item per submitted payload, in
/// submission order, plus the total took time.
#[derive(Debug)]
pub struct AggregateResponse<T> {
    items: Vec<ResponseItem<T>>,
    took: Duration,
}

impl<T> AggregateResponse<T> {
    pub fn new(items: Vec<ResponseItem<T>>, took: Duration) -> Self {
        Self { items, took }
    }

    /// Response for an empty batch
    pub fn empty() -> Self {
        Self::new(Vec::new(), Duration::ZERO)
    }

    pub fn took(&self) -> Duration {
        self.took
    }

    /// Took time truncated to whole milliseconds
    pub fn took_millis(&self) -> u64 {
        self.took.as_millis() as u64
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ResponseItem<T>] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResponseItem<T>> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ResponseItem<T>> {
        self.items.get(index)
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn into_items(self) -> Vec<ResponseItem<T>> {
        self.items
    }
}

impl<T: Serialize> Serialize for AggregateResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AggregateResponse", 2)?;
        state.serialize_field("took", &self.took_millis())?;
        state.serialize_field("responses", &self.items)?;
        state.end()
    }
}
