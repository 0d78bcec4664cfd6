//! Simulated item executor
//!
//! Stands in for a real backend when exercising the dispatcher from the CLI:
//! every item sleeps for a configurable time and may be made to fail.

use futures::future::BoxFuture;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

use crate::config::RunConfig;
use crate::dispatch::ItemExecutor;

/// Successful result of a simulated item
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SimulatedHit {
    pub id: usize,
    pub latency_ms: u64,
}

/// Executor that sleeps per item and fails on a fixed cadence
#[derive(Clone, Debug, Default)]
pub struct SimulatedExecutor {
    delay: Duration,
    jitter: Duration,
    fail_every: usize,
}

impl SimulatedExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(Duration::from_millis(config.delay_ms))
            .with_jitter(Duration::from_millis(config.jitter_ms))
            .fail_every(config.fail_every)
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Make every `n`th item (1-based) fail; 0 disables failures
    pub fn fail_every(mut self, n: usize) -> Self {
        self.fail_every = n;
        self
    }

    fn should_fail(&self, id: usize) -> bool {
        self.fail_every > 0 && (id + 1) % self.fail_every == 0
    }

    fn latency(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

impl ItemExecutor<usize> for SimulatedExecutor {
    type Output = SimulatedHit;

    fn execute(&self, id: usize) -> BoxFuture<'static, anyhow::Result<SimulatedHit>> {
        let latency = self.latency();
        let fail = self.should_fail(id);

        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if fail {
                anyhow::bail!("simulated failure for item {}", id);
            }
            Ok(SimulatedHit {
                id,
                latency_ms: latency.as_millis() as u64,
            })
        })
    }
}
