//! Batch dispatcher
//!
//! Runs an ordered batch of payloads through an [`ItemExecutor`] on a bounded
//! number of lanes and delivers exactly one [`AggregateResponse`] per batch.

use crossbeam::atomic::AtomicCell;
use futures::FutureExt;
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, ClockReading, SystemClock};
use super::executor::ItemExecutor;
use super::queue::{Slot, SlotQueue};
use super::results::{CompletionCounter, ResultArray};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::models::{AggregateResponse, ItemOutcome};

/// Result handed to a batch listener
pub type DispatchResult<T> = Result<AggregateResponse<T>, DispatchError>;

/// Callback invoked once per popped slot, before the item runs
pub type DequeueHook<P> = Arc<dyn Fn(usize, &P) + Send + Sync>;

type Listener<T> = Box<dyn FnOnce(DispatchResult<T>) + Send>;

/// Number of lanes used when no limit is configured
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Lifecycle of one batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Started,
    Draining,
    Completed,
}

/// Ordered payloads submitted together
#[derive(Clone, Debug)]
pub struct BatchRequest<P> {
    items: Vec<P>,
    max_concurrent: Option<usize>,
}

impl<P> BatchRequest<P> {
    pub fn new(items: Vec<P>) -> Self {
        Self {
            items,
            max_concurrent: None,
        }
    }

    /// Append a payload to the end of the batch
    pub fn add(mut self, payload: P) -> Self {
        self.items.push(payload);
        self
    }

    /// Override the dispatcher's lane limit for this batch only
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn max_concurrent(&self) -> Option<usize> {
        self.max_concurrent
    }

    pub fn items(&self) -> &[P] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<P> Default for BatchRequest<P> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<P> From<Vec<P>> for BatchRequest<P> {
    fn from(items: Vec<P>) -> Self {
        Self::new(items)
    }
}

#[derive(Debug)]
struct BatchStatus {
    phase: AtomicCell<BatchPhase>,
    cancelled: AtomicBool,
}

/// Caller-side view of a submitted batch
#[derive(Clone, Debug)]
pub struct BatchHandle {
    status: Arc<BatchStatus>,
}

impl BatchHandle {
    fn new() -> Self {
        Self {
            status: Arc::new(BatchStatus {
                phase: AtomicCell::new(BatchPhase::Idle),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    pub fn phase(&self) -> BatchPhase {
        self.status.phase.load()
    }

    pub fn is_completed(&self) -> bool {
        self.phase() == BatchPhase::Completed
    }

    /// Cancel every slot no lane has picked up yet. Items already running
    /// finish normally and the batch still produces one response.
    pub fn cancel(&self) {
        if !self.status.cancelled.swap(true, Ordering::AcqRel) {
            debug!("Batch cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.cancelled.load(Ordering::Acquire)
    }

    fn set_phase(&self, phase: BatchPhase) {
        self.status.phase.store(phase);
    }
}

/// A submitted batch whose response has not been awaited yet
#[derive(Debug)]
pub struct PendingBatch<T> {
    handle: BatchHandle,
    receiver: oneshot::Receiver<DispatchResult<T>>,
}

impl<T> PendingBatch<T> {
    pub fn handle(&self) -> &BatchHandle {
        &self.handle
    }

    /// Wait for the aggregate response
    pub async fn wait(self) -> DispatchResult<T> {
        self.receiver.await.unwrap_or(Err(DispatchError::Abandoned))
    }
}

/// Shared state for one batch invocation
struct Batch<P, T> {
    queue: SlotQueue<P>,
    results: ResultArray<T>,
    counter: CompletionCounter,
    clock: Arc<dyn Clock>,
    start: ClockReading,
    handle: BatchHandle,
    listener: AtomicCell<Option<Box<Listener<T>>>>,
}

impl<P, T> Batch<P, T> {
    /// Store a slot's outcome and finalize if it was the last one outstanding
    fn record(&self, index: usize, outcome: ItemOutcome<T>) {
        self.results.set(index, outcome);
        if self.counter.complete_one() {
            self.finish();
        }
    }

    fn finish(&self) {
        let took = self.clock.now().duration_since(self.start);
        let response = AggregateResponse::new(self.results.take_all(), took);
        let listener = self
            .listener
            .take()
            .unwrap_or_else(|| panic!("batch finalized twice"));

        self.handle.set_phase(BatchPhase::Completed);
        info!(
            "Batch of {} items completed in {}ms ({} failed)",
            response.len(),
            response.took_millis(),
            response.failed()
        );

        listener(Ok(response));
    }
}

impl<P, T> Drop for Batch<P, T> {
    /// Every lane is gone but the batch never finished: a lane died outside
    /// its item future. The listener still hears about it exactly once.
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            error!(
                "Batch abandoned with {} of {} items outstanding",
                self.counter.remaining(),
                self.results.len()
            );
            self.handle.set_phase(BatchPhase::Completed);
            listener(Err(DispatchError::Abandoned));
        }
    }
}

/// Dispatches batches onto an externally owned tokio runtime
pub struct Dispatcher<P, E: ItemExecutor<P>> {
    runtime: Handle,
    executor: Arc<E>,
    clock: Arc<dyn Clock>,
    max_concurrent: Option<usize>,
    max_batch_size: Option<usize>,
    on_dequeue: Option<DequeueHook<P>>,
}

impl<P, E> Dispatcher<P, E>
where
    P: Send + 'static,
    E: ItemExecutor<P>,
{
    /// Create a dispatcher that spawns its lanes on `runtime`.
    ///
    /// The runtime stays owned by the caller; the dispatcher never shuts it down.
    pub fn new(runtime: Handle, executor: E) -> Self {
        Self {
            runtime,
            executor: Arc::new(executor),
            clock: Arc::new(SystemClock::new()),
            max_concurrent: None,
            max_batch_size: None,
            on_dequeue: None,
        }
    }

    pub fn with_clock(self, clock: impl Clock + 'static) -> Self {
        self.with_shared_clock(Arc::new(clock))
    }

    pub fn with_shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    /// Apply limits from configuration
    pub fn with_config(mut self, config: &DispatchConfig) -> Self {
        if let Some(n) = config.max_concurrent {
            self.max_concurrent = Some(n);
        }
        if let Some(n) = config.max_batch_size {
            self.max_batch_size = Some(n);
        }
        self
    }

    pub fn on_dequeue(mut self, hook: impl Fn(usize, &P) + Send + Sync + 'static) -> Self {
        self.on_dequeue = Some(Arc::new(hook));
        self
    }

    /// Lane limit that applies to `request`
    pub fn concurrency_for(&self, request: &BatchRequest<P>) -> usize {
        request
            .max_concurrent
            .or(self.max_concurrent)
            .unwrap_or_else(default_concurrency)
    }

    /// Dispatch a batch and wait for its aggregate response
    pub async fn dispatch(&self, request: impl Into<BatchRequest<P>>) -> DispatchResult<E::Output> {
        self.submit(request).wait().await
    }

    /// Dispatch a batch and return immediately with a handle to await it
    pub fn submit(&self, request: impl Into<BatchRequest<P>>) -> PendingBatch<E::Output> {
        let (tx, rx) = oneshot::channel();
        let handle = self.dispatch_with_listener(request, move |result| {
            let _ = tx.send(result);
        });
        PendingBatch {
            handle,
            receiver: rx,
        }
    }

    /// Dispatch a batch; `listener` is invoked exactly once, either with an
    /// invocation error before any item runs or with the aggregate response.
    pub fn dispatch_with_listener<F>(
        &self,
        request: impl Into<BatchRequest<P>>,
        listener: F,
    ) -> BatchHandle
    where
        F: FnOnce(DispatchResult<E::Output>) + Send + 'static,
    {
        let request: BatchRequest<P> = request.into();
        let handle = BatchHandle::new();

        let concurrency = match self.validate(&request) {
            Ok(concurrency) => concurrency,
            Err(e) => {
                warn!("Rejecting batch of {} items: {}", request.len(), e);
                listener(Err(e));
                return handle;
            }
        };

        let size = request.len();
        handle.set_phase(BatchPhase::Started);

        if size == 0 {
            debug!("Empty batch, completing immediately");
            handle.set_phase(BatchPhase::Completed);
            listener(Ok(AggregateResponse::empty()));
            return handle;
        }

        let batch = Arc::new(Batch {
            queue: SlotQueue::new(),
            results: ResultArray::new(size),
            counter: CompletionCounter::new(size),
            clock: self.clock.clone(),
            start: self.clock.now(),
            handle: handle.clone(),
            listener: AtomicCell::new(Some(Box::new(
                Box::new(listener) as Listener<E::Output>
            ))),
        });
        batch.queue.enqueue_all(request.items);

        let lanes = concurrency.min(size);
        debug!("Dispatching batch of {} items across {} lanes", size, lanes);

        // Must precede the spawns: a fast lane may already complete the batch.
        handle.set_phase(BatchPhase::Draining);
        for lane in 0..lanes {
            self.runtime.spawn(run_lane(
                lane,
                batch.clone(),
                self.executor.clone(),
                self.on_dequeue.clone(),
            ));
        }

        handle
    }

    fn validate(&self, request: &BatchRequest<P>) -> Result<usize, DispatchError> {
        let concurrency = self.concurrency_for(request);
        if concurrency == 0 {
            return Err(DispatchError::InvalidConcurrency(concurrency));
        }
        if let Some(max) = self.max_batch_size {
            if request.len() > max {
                return Err(DispatchError::BatchTooLarge {
                    size: request.len(),
                    max,
                });
            }
        }
        Ok(concurrency)
    }
}

async fn run_lane<P, E>(
    lane: usize,
    batch: Arc<Batch<P, E::Output>>,
    executor: Arc<E>,
    on_dequeue: Option<DequeueHook<P>>,
) where
    P: Send + 'static,
    E: ItemExecutor<P>,
{
    debug!("Lane {} started", lane);
    let mut processed = 0usize;

    while let Some(Slot { index, payload }) = batch.queue.try_pop() {
        let outcome = if batch.handle.is_cancelled() {
            ItemOutcome::Failure(DispatchError::Cancelled.into())
        } else {
            if let Some(hook) = &on_dequeue {
                hook(index, &payload);
            }
            execute_item(executor.as_ref(), index, payload).await
        };

        processed += 1;
        batch.record(index, outcome);
    }

    debug!("Lane {} finished after {} items", lane, processed);
}

async fn execute_item<P, E>(executor: &E, index: usize, payload: P) -> ItemOutcome<E::Output>
where
    E: ItemExecutor<P>,
{
    let result = AssertUnwindSafe(async move { executor.execute(payload).await })
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(value)) => ItemOutcome::Success(value),
        Ok(Err(e)) => {
            warn!("Item {} failed: {:#}", index, e);
            ItemOutcome::Failure(e)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!("Item {} panicked: {}", index, message);
            ItemOutcome::Failure(anyhow::anyhow!("item {index} panicked: {message}"))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::clock::ManualClock;
    use rand::Rng;
    use std::sync::atomic::{AtomicU64, AtomicUsize};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tokio::sync::Notify;

    fn counting_executor(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(usize) -> futures::future::BoxFuture<'static, anyhow::Result<usize>> + Send + Sync
    {
        move |i: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok::<_, anyhow::Error>(i) })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_took_with_controlled_clock() {
        let clock = Arc::new(ManualClock::new());
        let hook_clock = clock.clone();

        let dispatcher =
            Dispatcher::new(Handle::current(), |_: ()| async { Ok::<_, anyhow::Error>("hit") })
                .with_shared_clock(clock.clone())
                .on_dequeue(move |_, _| hook_clock.set_nanos(1_000_000));

        let response = dispatcher.dispatch(vec![()]).await.unwrap();
        assert_eq!(response.len(), 1);
        assert_eq!(response.took(), Duration::from_nanos(1_000_000));
        assert_eq!(response.took_millis(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_took_with_real_clock() {
        let spin_for = Duration::from_millis(rand::rng().random_range(0..=10));
        let expected = Arc::new(AtomicU64::new(0));
        let spun = expected.clone();

        let dispatcher =
            Dispatcher::new(Handle::current(), |_: ()| async { Ok::<_, anyhow::Error>(()) })
                .with_clock(SystemClock::new())
                .on_dequeue(move |_, _| {
                    let start = Instant::now();
                    while start.elapsed() < spin_for {
                        std::hint::spin_loop();
                    }
                    spun.store(start.elapsed().as_nanos() as u64, Ordering::SeqCst);
                });

        let response = dispatcher.dispatch(vec![()]).await.unwrap();
        let expected_ms = Duration::from_nanos(expected.load(Ordering::SeqCst)).as_millis() as u64;
        assert!(response.took_millis() >= expected_ms);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_took_covers_slow_item() {
        let dispatcher = Dispatcher::new(Handle::current(), |_: ()| async {
            tokio::time::sleep(Duration::from_millis(15)).await;
            Ok::<_, anyhow::Error>(())
        });

        let response = dispatcher.dispatch(vec![()]).await.unwrap();
        assert!(response.took_millis() >= 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_empty_batch_never_runs_executor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Handle::current(), counting_executor(calls.clone()));

        let response = dispatcher.dispatch(Vec::<usize>::new()).await.unwrap();
        assert!(response.is_empty());
        assert_eq!(response.took(), Duration::ZERO);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_empty_batch_completes_synchronously() {
        let dispatcher =
            Dispatcher::new(Handle::current(), |i: usize| async move { Ok::<_, anyhow::Error>(i) });
        let delivered = Arc::new(AtomicBool::new(false));
        let flag = delivered.clone();

        let handle = dispatcher.dispatch_with_listener(Vec::new(), move |result| {
            assert!(result.unwrap().is_empty());
            flag.store(true, Ordering::SeqCst);
        });

        assert!(delivered.load(Ordering::SeqCst));
        assert_eq!(handle.phase(), BatchPhase::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_order_independent_of_completion() {
        let dispatcher = Dispatcher::new(Handle::current(), |i: usize| async move {
            // Later slots finish first
            tokio::time::sleep(Duration::from_millis((8 - i as u64) * 3)).await;
            Ok::<_, anyhow::Error>(i * 10)
        })
        .with_max_concurrent(8);

        let response = dispatcher.dispatch((0..8).collect::<Vec<_>>()).await.unwrap();
        assert_eq!(response.len(), 8);
        for (pos, item) in response.iter().enumerate() {
            assert_eq!(item.index, pos);
            assert_eq!(item.outcome.value(), Some(&(pos * 10)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        for limit in [1usize, 3] {
            let in_flight = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let (current, max_seen) = (in_flight.clone(), peak.clone());

            let executor = move |_: usize| {
                let current = current.clone();
                let max_seen = max_seen.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(())
                }
            };

            let dispatcher =
                Dispatcher::new(Handle::current(), executor).with_max_concurrent(limit);
            let response = dispatcher.dispatch(vec![0; 24]).await.unwrap();

            assert_eq!(response.len(), 24);
            let peak = peak.load(Ordering::SeqCst);
            assert!(peak >= 1 && peak <= limit, "peak {peak} exceeds limit {limit}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_request_limit_overrides_dispatcher_limit() {
        let dispatcher =
            Dispatcher::new(Handle::current(), |i: usize| async move { Ok::<_, anyhow::Error>(i) })
                .with_max_concurrent(8);
        let request = BatchRequest::new(vec![1, 2]).with_max_concurrent(1);
        assert_eq!(dispatcher.concurrency_for(&request), 1);
        assert_eq!(dispatcher.concurrency_for(&BatchRequest::new(vec![1])), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_do_not_abort_siblings() {
        let dispatcher = Dispatcher::new(Handle::current(), |i: usize| async move {
            if i % 2 == 1 {
                anyhow::bail!("item {} failed", i);
            }
            Ok::<_, anyhow::Error>(i)
        })
        .with_max_concurrent(3);

        let response = dispatcher.dispatch((0..10).collect::<Vec<_>>()).await.unwrap();
        assert_eq!(response.len(), 10);
        assert_eq!(response.succeeded(), 5);
        assert_eq!(response.failed(), 5);
        let err = response.get(3).and_then(|i| i.outcome.error()).unwrap();
        assert_eq!(err.to_string(), "item 3 failed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_item_is_recorded_as_failure() {
        let dispatcher = Dispatcher::new(Handle::current(), |i: usize| async move {
            if i == 1 {
                panic!("boom");
            }
            Ok::<_, anyhow::Error>(i)
        });

        let response = dispatcher.dispatch(vec![0, 1, 2]).await.unwrap();
        assert_eq!(response.succeeded(), 2);
        let err = response.get(1).and_then(|i| i.outcome.error()).unwrap();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_zero_concurrency_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Handle::current(), counting_executor(calls.clone()));

        let request = BatchRequest::new(vec![1, 2, 3]).with_max_concurrent(0);
        let err = dispatcher.dispatch(request).await.unwrap_err();
        assert_eq!(err, DispatchError::InvalidConcurrency(0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_oversized_batch_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Handle::current(), counting_executor(calls.clone()))
            .with_max_batch_size(2);

        let pending = dispatcher.submit(vec![1, 2, 3]);
        assert_eq!(pending.handle().phase(), BatchPhase::Idle);
        let err = pending.wait().await.unwrap_err();
        assert_eq!(err, DispatchError::BatchTooLarge { size: 3, max: 2 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_listener_invoked_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            Dispatcher::new(Handle::current(), |i: usize| async move { Ok::<_, anyhow::Error>(i) })
                .with_max_concurrent(4);

        let (tx, rx) = oneshot::channel();
        let counter = calls.clone();
        let handle = dispatcher.dispatch_with_listener((0..50).collect::<Vec<_>>(), move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        });

        let response = rx.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(response.len(), 50);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.phase(), BatchPhase::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_slot_dequeued_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let dispatcher = Dispatcher::new(Handle::current(), |i: usize| async move {
            let delay = rand::rng().random_range(0..3u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, anyhow::Error>(i)
        })
        .with_max_concurrent(8)
        .on_dequeue(move |index, _| recorder.lock().unwrap().push(index));

        let response = dispatcher.dispatch((0..200).collect::<Vec<_>>()).await.unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
        for (pos, item) in response.iter().enumerate() {
            assert_eq!(item.outcome.value(), Some(&pos));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_skips_pending_slots() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let (on_start, on_release) = (started.clone(), release.clone());

        let executor = move |i: usize| {
            let on_start = on_start.clone();
            let on_release = on_release.clone();
            async move {
                if i == 0 {
                    on_start.notify_one();
                    on_release.notified().await;
                }
                Ok::<_, anyhow::Error>(i)
            }
        };

        let dispatcher = Dispatcher::new(Handle::current(), executor).with_max_concurrent(1);
        let pending = dispatcher.submit(vec![0, 1, 2, 3]);

        started.notified().await;
        pending.handle().cancel();
        release.notify_one();

        let response = pending.wait().await.unwrap();
        assert_eq!(response.len(), 4);
        assert!(response.get(0).unwrap().outcome.is_success());
        for item in &response.items()[1..] {
            let err = item.outcome.error().unwrap();
            assert_eq!(
                err.downcast_ref::<DispatchError>(),
                Some(&DispatchError::Cancelled)
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lane_panic_abandons_batch() {
        let dispatcher =
            Dispatcher::new(Handle::current(), |i: usize| async move { Ok::<_, anyhow::Error>(i) })
                .on_dequeue(|_, _| panic!("hook exploded"));

        let err = dispatcher.dispatch(vec![1]).await.unwrap_err();
        assert_eq!(err, DispatchError::Abandoned);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lane_panic_still_calls_listener() {
        let dispatcher =
            Dispatcher::new(Handle::current(), |i: usize| async move { Ok::<_, anyhow::Error>(i) })
                .with_max_concurrent(2)
                .on_dequeue(|_, _| panic!("hook exploded"));

        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        let counted = calls.clone();
        let handle = dispatcher.dispatch_with_listener(vec![1, 2], move |result| {
            counted.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        });

        let result = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("listener was never called")
            .unwrap();
        assert_eq!(result.unwrap_err(), DispatchError::Abandoned);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.phase(), BatchPhase::Completed);
    }

    #[test]
    fn test_listener_cell_is_lock_free() {
        assert!(AtomicCell::<Option<Box<Listener<u64>>>>::is_lock_free());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_with_config_applies_limits() {
        let config = DispatchConfig {
            max_concurrent: Some(2),
            max_batch_size: Some(1),
            ..DispatchConfig::default()
        };
        let dispatcher =
            Dispatcher::new(Handle::current(), |i: usize| async move { Ok::<_, anyhow::Error>(i) })
                .with_config(&config);

        assert_eq!(dispatcher.concurrency_for(&BatchRequest::new(vec![1])), 2);
        let err = dispatcher.dispatch(vec![1, 2]).await.unwrap_err();
        assert_eq!(err, DispatchError::BatchTooLarge { size: 2, max: 1 });
    }
}
