use crate::stats::StatsRegistry;
use governor::DefaultDirectRateLimiter;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Task hook used by the `#[task]` macro. Not intended to be used manually.
pub async fn task_hook<T, R, E>(name: &'static str, func: T) -> T::Output
where
    T: Future<Output = Result<R, E>>,
    E: std::fmt::Display,
{
    if let Ok(hook) = TASK_HOOK.try_with(|v| v.clone()) {
        let start = Instant::now();
        let res = func.await;
        let elapsed = start.elapsed();

        match &res {
            Ok(_) => hook.stats.record_task(name, elapsed, true),
            Err(err) => {
                tracing::debug!("Task {name} failed: {err}");
                hook.stats.record_task(name, elapsed, false);
            }
        }

        res
    } else {
        tracing::warn!("No hook available, task {name} is not recorded.");
        func.await
    }
}

/// Per-swarm data shared with every user task.
#[derive(Clone)]
pub(crate) struct TaskData {
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub stats: Arc<StatsRegistry>,
}

tokio::task_local! {
    pub(crate) static TASK_HOOK: TaskData;
}
