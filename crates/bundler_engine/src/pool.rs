//! Fixed-size worker pool shared by the download and compression stages.
//!
//! `workers` tasks drain one queue; each result is appended under a mutex and
//! the call returns only after every worker has exited.
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use engine_logging::engine_debug;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::{JobId, StageError};

/// Run `work` over every job with at most `workers` jobs in flight.
///
/// Jobs are numbered from 1 in queue order. Results come back in that same
/// order even though they complete in any order.
pub async fn run_pool<J, R, F, Fut>(jobs: Vec<J>, workers: usize, work: F) -> Result<Vec<R>, StageError>
where
    J: Send + 'static,
    R: Send + 'static,
    F: Fn(JobId, J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = jobs.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let workers = workers.clamp(1, total);
    engine_debug!("starting pool: {} jobs on {} workers", total, workers);

    let queue: VecDeque<(JobId, J)> = jobs
        .into_iter()
        .enumerate()
        .map(|(idx, job)| (idx + 1, job))
        .collect();
    let queue = Arc::new(Mutex::new(queue));
    let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let work = Arc::new(work);

    let mut set = JoinSet::new();
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let results = Arc::clone(&results);
        let work = Arc::clone(&work);
        set.spawn(async move {
            loop {
                let next = queue.lock().await.pop_front();
                let Some((job_id, job)) = next else {
                    break;
                };
                let result = work(job_id, job).await;
                results.lock().await.push((job_id, result));
            }
        });
    }

    while let Some(joined) = set.join_next().await {
        joined.map_err(|err| StageError::Worker(err.to_string()))?;
    }

    let mut collected = std::mem::take(&mut *results.lock().await);
    collected.sort_by_key(|(job_id, _)| *job_id);
    Ok(collected.into_iter().map(|(_, result)| result).collect())
}
