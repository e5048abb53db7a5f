//! Bounded-parallel execution of one phase's partition tasks
//!
//! Each partition becomes one spawned task. A semaphore caps how many run at
//! once, every task runs under the retry policy, and the phase finishes only
//! when all of them have. The first task that gives up fails the phase and
//! aborts its siblings; so does dropping the phase future, e.g. on a round
//! timeout.

use super::error::{RoundError, TaskError, TaskPhase};
use super::retry::RetryPolicy;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, error};

/// Aborts every task it holds when dropped.
///
/// Aborting a task that already finished is a no-op, so the guard can simply
/// go out of scope on success too.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskPool {
    max_parallel: usize,
    retry: RetryPolicy,
}

impl TaskPool {
    pub fn new(max_parallel: usize, retry: RetryPolicy) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            retry,
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Run `task` once per partition in `0..count` and return the results in
    /// partition order.
    ///
    /// `task` is called again for every retry, so it must be safe to run more
    /// than once for the same partition.
    pub async fn run<T, F, Fut>(&self, phase: TaskPhase, count: usize, task: F) -> Result<Vec<T>, RoundError>
    where
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let task = Arc::new(task);
        let mut futures = FuturesUnordered::new();
        let mut spawned = AbortOnDrop(Vec::with_capacity(count));

        debug!(
            "Running {} {} task(s) (max parallel: {})",
            count, phase, self.max_parallel
        );

        for partition in 0..count {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| RoundError::TaskAborted {
                    phase,
                    message: e.to_string(),
                })?;
            let task = Arc::clone(&task);
            let retry = self.retry.clone();

            let handle = tokio::spawn(async move {
                let context = format!("{phase} partition {partition}");
                let result = retry.execute(&context, || task(partition)).await;
                drop(permit);
                (partition, result)
            });
            spawned.0.push(handle.abort_handle());
            futures.push(handle);
        }

        let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
        while let Some(joined) = futures.next().await {
            match joined {
                Ok((partition, Ok(value))) => results[partition] = Some(value),
                Ok((partition, Err(exhausted))) => {
                    error!(
                        "{} task for partition {} gave up after {} attempt(s): {}",
                        phase, partition, exhausted.attempts, exhausted.error
                    );
                    return Err(RoundError::TaskFailed {
                        phase,
                        partition,
                        attempts: exhausted.attempts,
                        source: exhausted.error,
                    });
                }
                Err(e) => {
                    return Err(RoundError::TaskAborted {
                        phase,
                        message: e.to_string(),
                    })
                }
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}
