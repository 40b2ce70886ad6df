use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordinator_core::{
    models::{object_types, Document, DocumentQuery, Envelope, GLOBAL_SITE},
    traits::{CommandTransport, DocumentStore, EnvelopeStream},
    CoordinatorResult,
};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 游标回退量，容忍不同进程之间的写入时钟抖动
const CURSOR_OVERLAP_MS: i64 = 1000;

/// 基于共享文档存储的轮询命令代理
///
/// 没有消息中间件时的后备方案：发布即写入一条 `command_envelope` 文档，
/// 订阅者按创建时间轮询新文档。超过保留时间的文档在发布时被清理。
pub struct StoragePollingCommandBroker {
    store: Arc<dyn DocumentStore>,
    poll_interval: Duration,
    ttl: chrono::Duration,
    last_purge: Mutex<DateTime<Utc>>,
}

impl StoragePollingCommandBroker {
    pub fn new(store: Arc<dyn DocumentStore>, poll_interval: Duration, ttl: Duration) -> Self {
        Self {
            store,
            poll_interval,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(5)),
            last_purge: Mutex::new(Utc::now()),
        }
    }

    /// 删除超过保留时间的消息文档
    pub async fn purge_expired(&self) -> CoordinatorResult<u64> {
        let cutoff = Utc::now() - self.ttl;
        let documents = self
            .store
            .find(&DocumentQuery::of_type(object_types::COMMAND_ENVELOPE))
            .await?;

        let mut purged = 0;
        for document in documents.iter().filter(|d| d.created < cutoff) {
            purged += self.store.purge(&document.document_key()).await?;
        }

        if purged > 0 {
            debug!("Purged {} expired command envelopes", purged);
        }
        Ok(purged)
    }

    async fn maybe_purge(&self) {
        let mut last_purge = self.last_purge.lock().await;
        if Utc::now() - *last_purge < self.ttl / 2 {
            return;
        }
        *last_purge = Utc::now();
        drop(last_purge);

        if let Err(e) = self.purge_expired().await {
            warn!("Failed to purge expired command envelopes: {}", e);
        }
    }
}

/// 单个订阅者的轮询状态
struct PollState {
    store: Arc<dyn DocumentStore>,
    poll_interval: Duration,
    cursor: DateTime<Utc>,
    /// 已投递的文档ID -> 创建时间
    seen: HashMap<String, DateTime<Utc>>,
    buffer: VecDeque<Envelope>,
    first_poll: bool,
}

impl PollState {
    async fn poll(&mut self) -> CoordinatorResult<()> {
        let query = DocumentQuery::of_type(object_types::COMMAND_ENVELOPE).created_after(self.cursor);
        let mut documents = self.store.find(&query).await?;
        documents.sort_by_key(|d| d.created);

        let mut newest = self.cursor;
        for document in documents {
            newest = newest.max(document.created);
            if self.seen.contains_key(&document.id) {
                continue;
            }
            self.seen.insert(document.id.clone(), document.created);
            match serde_json::from_value::<Envelope>(document.body) {
                Ok(envelope) => self.buffer.push_back(envelope),
                Err(e) => warn!("Discarding malformed envelope document {}: {}", document.id, e),
            }
        }

        let cursor = newest - chrono::Duration::milliseconds(CURSOR_OVERLAP_MS);
        if cursor > self.cursor {
            self.cursor = cursor;
            let floor = self.cursor;
            self.seen.retain(|_, created| *created > floor);
        }
        Ok(())
    }

    async fn next(mut self) -> Option<(Envelope, Self)> {
        loop {
            if let Some(envelope) = self.buffer.pop_front() {
                return Some((envelope, self));
            }
            if !self.first_poll {
                tokio::time::sleep(self.poll_interval).await;
            }
            self.first_poll = false;
            if let Err(e) = self.poll().await {
                warn!("Command envelope poll failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl CommandTransport for StoragePollingCommandBroker {
    async fn publish(&self, envelope: &Envelope) -> CoordinatorResult<()> {
        self.maybe_purge().await;

        let document = Document::new(
            object_types::COMMAND_ENVELOPE,
            envelope.id(),
            GLOBAL_SITE,
            serde_json::to_value(envelope)?,
        );
        self.store.save(document).await?;
        debug!("Stored {} {} for polling subscribers", envelope.kind_str(), envelope.id());
        Ok(())
    }

    async fn subscribe(&self, subscriber_id: &str) -> CoordinatorResult<EnvelopeStream> {
        debug!("Subscriber {} polling command envelopes", subscriber_id);
        let mut state = PollState {
            store: self.store.clone(),
            poll_interval: self.poll_interval,
            // 只投递订阅之后写入的消息
            cursor: Utc::now() - chrono::Duration::milliseconds(CURSOR_OVERLAP_MS),
            seen: HashMap::new(),
            buffer: VecDeque::new(),
            first_poll: true,
        };

        // 订阅前已存在的文档不投递
        let existing = self
            .store
            .find(&DocumentQuery::of_type(object_types::COMMAND_ENVELOPE).created_after(state.cursor))
            .await?;
        for document in existing {
            state.seen.insert(document.id, document.created);
        }

        Ok(futures::stream::unfold(state, PollState::next).boxed())
    }

    fn backend_name(&self) -> &'static str {
        "storage_polling"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryDocumentStore;
    use coordinator_core::models::Command;
    use coordinator_core::models::DocumentKey;
    use serde_json::json;

    async fn stored_envelope(store: &dyn DocumentStore, id: &str) -> Option<Document> {
        store
            .get(&DocumentKey::global(object_types::COMMAND_ENVELOPE, id))
            .await
            .unwrap()
    }

    fn broker(store: Arc<InMemoryDocumentStore>) -> StoragePollingCommandBroker {
        StoragePollingCommandBroker::new(
            store,
            Duration::from_millis(10),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_subscriber_receives_each_envelope_once() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let broker = broker(store.clone());
        let mut stream = broker.subscribe("node-a").await.unwrap();

        let first = Envelope::Command(Command::new("ping", "PING_1", "job-1", "node-a", json!({})));
        let second = Envelope::Command(Command::new("ping", "PING_2", "job-1", "node-a", json!({})));
        broker.publish(&first).await.unwrap();
        broker.publish(&second).await.unwrap();

        assert_eq!(stream.next().await, Some(first.clone()));
        assert_eq!(stream.next().await, Some(second));
        assert!(stored_envelope(store.as_ref(), first.id()).await.is_some());

        let nothing = tokio::time::timeout(Duration::from_millis(60), stream.next()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_envelopes_before_subscription_are_skipped() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let broker = broker(store.clone());

        let old = Envelope::Command(Command::new("ping", "OLD", "job-1", "node-a", json!({})));
        broker.publish(&old).await.unwrap();

        let mut stream = broker.subscribe("node-b").await.unwrap();
        let fresh = Envelope::Command(Command::new("ping", "NEW", "job-2", "node-a", json!({})));
        broker.publish(&fresh).await.unwrap();

        assert_eq!(stream.next().await, Some(fresh));
    }

    #[tokio::test]
    async fn test_purge_expired_envelopes() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let broker = StoragePollingCommandBroker::new(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_millis(1),
        );

        let envelope = Envelope::Command(Command::new("ping", "PING", "job-1", "node-a", json!({})));
        broker.publish(&envelope).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(broker.purge_expired().await.unwrap(), 1);
        assert!(stored_envelope(store.as_ref(), envelope.id()).await.is_none());
    }
}
