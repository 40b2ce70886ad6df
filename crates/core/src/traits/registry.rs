use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::{models::ProcessInfo, CoordinatorResult};

/// 进程注册表接口
///
/// 命令服务在每轮广播开始时读取当前活跃进程集合。
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    /// 注册或刷新进程（心跳）
    async fn register(&self, info: &ProcessInfo) -> CoordinatorResult<()>;

    async fn unregister(&self, process_id: &str) -> CoordinatorResult<()>;

    async fn active_processes(&self) -> CoordinatorResult<BTreeSet<String>>;
}
