//! Applies an adapter to every batch, sequentially or on a worker pool

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tracing::{debug, error};

use crate::adapter::{EndpointAdapter, FetchContext};
use crate::batch::Batch;
use crate::table::BatchOutcome;

/// Lock-free queue handing batches to workers
///
/// The cursor is the only word workers share; each claimed batch is owned by
/// exactly one worker.
struct WorkQueue<S> {
    items: Vec<S>,
    cursor: AtomicUsize,
}

impl<S> WorkQueue<S> {
    fn new(items: Vec<S>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next item together with its slot index
    fn next(&self) -> Option<(usize, &S)> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i).map(|item| (i, item))
    }

    fn total(&self) -> usize {
        self.items.len()
    }
}

/// Run `adapter` over `batches` and return one outcome per batch, in batch order
///
/// With `worker_count <= 1` batches run one after another. Otherwise a fixed
/// pool of `min(worker_count, batches)` tasks pulls batches from a shared
/// queue and results are placed by slot, so completion order does not matter.
/// A panicking adapter only loses its own batch.
pub async fn dispatch<A: EndpointAdapter>(
    batches: Vec<Batch>,
    adapter: Arc<A>,
    ctx: Arc<FetchContext>,
    worker_count: usize,
) -> Vec<BatchOutcome<A::Record>> {
    if worker_count <= 1 || batches.len() <= 1 {
        debug!(endpoint = adapter.name(), batches = batches.len(), "Dispatching sequentially");
        let mut outcomes = Vec::with_capacity(batches.len());
        for batch in &batches {
            outcomes.push(run_isolated(adapter.as_ref(), batch, &ctx).await);
        }
        return outcomes;
    }

    let queue = Arc::new(WorkQueue::new(batches));
    let workers = worker_count.min(queue.total());
    debug!(
        endpoint = adapter.name(),
        batches = queue.total(),
        workers,
        "Dispatching on worker pool"
    );

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            let adapter = Arc::clone(&adapter);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let mut produced = Vec::new();
                while let Some((slot, batch)) = queue.next() {
                    debug!(worker, batch = slot, "Worker claimed batch");
                    produced.push((slot, run_isolated(adapter.as_ref(), batch, &ctx).await));
                }
                produced
            })
        })
        .collect();

    let mut slots: Vec<Option<BatchOutcome<A::Record>>> =
        std::iter::repeat_with(|| None).take(queue.total()).collect();

    for handle in handles {
        match handle.await {
            Ok(produced) => {
                for (slot, outcome) in produced {
                    slots[slot] = Some(outcome);
                }
            }
            Err(err) => error!(error = %err, "Worker task failed"),
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(slot, outcome)| {
            outcome.unwrap_or_else(|| {
                BatchOutcome::unavailable(format!("Worker task failed before reporting batch {slot}"))
            })
        })
        .collect()
}

async fn run_isolated<A: EndpointAdapter>(
    adapter: &A,
    batch: &Batch,
    ctx: &FetchContext,
) -> BatchOutcome<A::Record> {
    match AssertUnwindSafe(adapter.fetch(batch, ctx)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                endpoint = adapter.name(),
                batch = batch.index(),
                panic = %message,
                "Adapter panicked"
            );
            BatchOutcome::unavailable(format!("Adapter panicked: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
