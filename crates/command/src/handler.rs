use async_trait::async_trait;
use coordinator_core::{models::Command, CoordinatorResult};

/// 命令处理器
///
/// 每个进程为它能执行的每种命令类型注册一个处理器。
/// 返回值作为成功回复的 `result`；错误作为失败回复的 `error`。
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// 路由键，与 `Command::command_type` 匹配
    fn command_type(&self) -> &str;

    async fn handle(&self, command: &Command) -> CoordinatorResult<serde_json::Value>;
}
