use coordinator_core::CoordinatorResult;
use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use tracing::debug;

use crate::{context::JobContext, task::Task};

type IndexedTask = BoxFuture<'static, (usize, CoordinatorResult<serde_json::Value>)>;

fn indexed(index: usize, task: Task) -> IndexedTask {
    task.map(move |result| (index, result)).boxed()
}

/// 以有界并发执行任务列表
///
/// 最多 `limit` 个任务同时在执行，空出位置后才开始下一个；`limit` 为 `None`
/// 时全部并行。第一个失败立即返回，仍在执行的任务随集合一起被丢弃，
/// 尚未开始的任务不会再启动。结果按任务在列表中的顺序返回。
pub async fn run_tasks(
    ctx: &JobContext,
    tasks: Vec<Task>,
    limit: Option<usize>,
) -> CoordinatorResult<Vec<serde_json::Value>> {
    let total = tasks.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let limit = limit.unwrap_or(total).clamp(1, total);
    debug!(job_id = %ctx.id(), "running {} tasks with limit {}", total, limit);

    let mut results = vec![serde_json::Value::Null; total];
    let mut pending = tasks.into_iter().enumerate();
    let mut in_flight: FuturesUnordered<IndexedTask> = pending
        .by_ref()
        .take(limit)
        .map(|(index, task)| indexed(index, task))
        .collect();

    while let Some((index, result)) = in_flight.next().await {
        match result {
            Ok(value) => results[index] = value,
            Err(e) => {
                debug!(job_id = %ctx.id(), "task {} failed, aborting remaining tasks", index);
                return Err(e);
            }
        }
        if let Some((next, task)) = pending.next() {
            in_flight.push(indexed(next, task));
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobRole;
    use crate::task::task;
    use coordinator_core::CoordinatorError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx() -> JobContext {
        JobContext::new("job".into(), "TEST".into(), JobRole::Initiator, None)
    }

    /// 记录同时运行的最大任务数
    #[derive(Default)]
    struct ConcurrencyTracker {
        current: AtomicUsize,
        peak: AtomicUsize,
        started: AtomicUsize,
    }

    impl ConcurrencyTracker {
        fn task(self: &Arc<Self>, value: u64, fail: bool) -> Task {
            let tracker = Arc::clone(self);
            task(async move {
                tracker.started.fetch_add(1, Ordering::SeqCst);
                let now = tracker.current.fetch_add(1, Ordering::SeqCst) + 1;
                tracker.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10 + value)).await;
                tracker.current.fetch_sub(1, Ordering::SeqCst);
                if fail {
                    return Err(CoordinatorError::Internal(format!("task {value} failed")));
                }
                Ok(json!(value))
            })
        }
    }

    #[tokio::test]
    async fn test_results_keep_task_order() {
        let tracker = Arc::new(ConcurrencyTracker::default());
        let tasks = vec![tracker.task(30, false), tracker.task(0, false), tracker.task(10, false)];

        let results = run_tasks(&ctx(), tasks, None).await.unwrap();
        assert_eq!(results, vec![json!(30), json!(0), json!(10)]);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_limit_bounds_in_flight_tasks() {
        let tracker = Arc::new(ConcurrencyTracker::default());
        let tasks = (0..6).map(|i| tracker.task(i, false)).collect();

        run_tasks(&ctx(), tasks, Some(2)).await.unwrap();
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_failure_stops_sequential_list() {
        let tracker = Arc::new(ConcurrencyTracker::default());
        let tasks = vec![tracker.task(0, false), tracker.task(1, true), tracker.task(2, false)];

        let err = run_tasks(&ctx(), tasks, Some(1)).await.unwrap_err();
        assert_eq!(err, CoordinatorError::Internal("task 1 failed".to_string()));
        assert_eq!(tracker.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_runner_future_can_be_spawned() {
        let tracker = Arc::new(ConcurrencyTracker::default());
        let tasks = vec![tracker.task(0, false), tracker.task(1, false)];

        // tokio::spawn 要求 Send + 'static
        let handle = tokio::spawn(async move { run_tasks(&ctx(), tasks, Some(1)).await });
        let results = handle.await.unwrap().unwrap();
        assert_eq!(results, vec![json!(0), json!(1)]);
    }

    #[tokio::test]
    async fn test_empty_task_list_succeeds() {
        assert!(run_tasks(&ctx(), Vec::new(), Some(1)).await.unwrap().is_empty());
    }
}
