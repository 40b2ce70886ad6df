use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use coordinator_core::{
    models::Envelope,
    traits::{CommandTransport, EnvelopeStream},
    CoordinatorResult,
};
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// 内存命令代理
///
/// 基于 `tokio::sync::broadcast` 的进程内发布/订阅，适用于嵌入式部署和测试。
/// 同一个代理实例上的每个订阅者都会收到全部消息（包括自己发布的）。
#[derive(Debug)]
pub struct InMemoryCommandBroker {
    sender: broadcast::Sender<Envelope>,
    published: AtomicU64,
}

impl Default for InMemoryCommandBroker {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl InMemoryCommandBroker {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// 已发布的消息数量
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl CommandTransport for InMemoryCommandBroker {
    async fn publish(&self, envelope: &Envelope) -> CoordinatorResult<()> {
        self.published.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(envelope.clone()).is_err() {
            // 没有订阅者时消息直接丢弃，与真实广播后端行为一致
            debug!("No subscribers for {} {}", envelope.kind_str(), envelope.id());
        }
        Ok(())
    }

    async fn subscribe(&self, subscriber_id: &str) -> CoordinatorResult<EnvelopeStream> {
        let receiver = self.sender.subscribe();
        let subscriber = subscriber_id.to_string();
        debug!("Subscriber {} attached to in-memory broker", subscriber);

        let stream = futures::stream::unfold(receiver, move |mut receiver| {
            let subscriber = subscriber.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(envelope) => return Some((envelope, receiver)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Subscriber {} lagged, skipped {} envelopes", subscriber, skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_core::models::Command;
    use serde_json::json;

    #[tokio::test]
    async fn test_every_subscriber_receives_broadcast() {
        let broker = InMemoryCommandBroker::default();
        let mut a = broker.subscribe("node-a").await.unwrap();
        let mut b = broker.subscribe("node-b").await.unwrap();

        let command = Command::new("ping", "PING", "job-1", "node-a", json!({}));
        broker.publish(&Envelope::Command(command.clone())).await.unwrap();

        assert_eq!(a.next().await, Some(Envelope::Command(command.clone())));
        assert_eq!(b.next().await, Some(Envelope::Command(command)));
        assert_eq!(broker.published_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let broker = InMemoryCommandBroker::new(4);
        let command = Command::new("ping", "PING", "job-1", "node-a", json!({}));
        assert!(broker.publish(&Envelope::Command(command)).await.is_ok());
        assert_eq!(broker.subscriber_count(), 0);
    }
}
