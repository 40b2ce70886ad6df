use coordinator_core::CoordinatorResult;
use futures::future::BoxFuture;

use crate::context::JobContext;

/// 作业中的一个异步步骤
///
/// 任务在构造时不产生副作用，只有被运行器轮询时才开始执行。
pub type Task = BoxFuture<'static, CoordinatorResult<serde_json::Value>>;

/// 把一个 async 块包装成任务
pub fn task<F>(future: F) -> Task
where
    F: std::future::Future<Output = CoordinatorResult<serde_json::Value>> + Send + 'static,
{
    Box::pin(future)
}

/// 任务列表提供者
///
/// 每个具体作业提供自己的任务列表；作业引擎负责执行、并发控制和进度。
pub trait TaskProvider: Send + Sync + 'static {
    fn tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>>;

    /// 作业自身要求的并发上限，优先于构建器上的设置
    fn parallel_limit(&self) -> Option<usize> {
        None
    }
}
