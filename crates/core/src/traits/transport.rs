use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{models::Envelope, CoordinatorResult};

/// 订阅得到的消息流
pub type EnvelopeStream = BoxStream<'static, Envelope>;

/// 命令传输抽象接口
///
/// 发布/订阅语义：发布的每条消息投递给所有订阅者（包括发布者自己）。
/// 假定至少一次投递，去重由命令服务负责。
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// 广播一条消息
    async fn publish(&self, envelope: &Envelope) -> CoordinatorResult<()>;

    /// 以给定的进程身份订阅消息流
    async fn subscribe(&self, subscriber_id: &str) -> CoordinatorResult<EnvelopeStream>;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &'static str;
}
