// src/core/collector/pool.rs

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

/// Upper bound on the default pool size.
const MAX_DEFAULT_WORKERS: usize = 32;

/// Default number of concurrent tasks per fan-out level: the available
/// parallelism plus four, capped at 32. Requests spend most of their time
/// waiting on the network, so the pool is wider than the core count.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .saturating_add(4)
        .min(MAX_DEFAULT_WORKERS)
}

/// Runs `task` for every item on its own bounded pool and waits for all of them.
///
/// At most `workers` tasks make progress at once. Every call owns its
/// semaphore, so nested fan-outs never compete for the same permits and a slow
/// item only holds back its own pool. The function returns once every spawned
/// task has finished; outputs come back in completion order. A task that
/// panics is logged and contributes no output, its siblings keep running.
///
/// # Arguments
/// * `items` - The work items, one task each.
/// * `workers` - Pool size; zero is treated as one.
/// * `task` - Builds the future for one item.
pub async fn fan_out<I, F, Fut, T>(items: I, workers: usize, task: F) -> Vec<T>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut set = JoinSet::new();

    for item in items {
        let permits = Arc::clone(&permits);
        let job = task(item);
        set.spawn(async move {
            // The semaphore is never closed, so acquiring cannot fail.
            let _permit = permits.acquire_owned().await;
            job.await
        });
    }

    let mut outputs = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(output) => outputs.push(output),
            Err(e) => error!(error = %e, "Worker task did not complete."),
        }
    }
    outputs
}
