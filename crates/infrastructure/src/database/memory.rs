use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use coordinator_core::{
    models::{Document, DocumentKey, DocumentQuery},
    traits::DocumentStore,
    CoordinatorResult,
};
use tokio::sync::RwLock;
use tracing::debug;

/// 内存文档存储
///
/// 单进程部署和测试使用。`write_count` 统计保存与删除次数，
/// 用来断言某个失败路径没有产生任何写入。
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentKey, Document>>,
    writes: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(&self, mut document: Document) -> CoordinatorResult<Document> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let key = document.document_key();
        let mut documents = self.documents.write().await;

        if let Some(existing) = documents.get(&key) {
            document.id = existing.id.clone();
            document.created = existing.created;
        }
        document.last_modified = Utc::now();

        debug!("保存文档: {}/{}@{}", key.object_type, key.key, key.site);
        documents.insert(key, document.clone());
        Ok(document)
    }

    async fn get(&self, key: &DocumentKey) -> CoordinatorResult<Option<Document>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn purge(&self, key: &DocumentKey) -> CoordinatorResult<u64> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let removed = self.documents.write().await.remove(key);
        Ok(removed.map_or(0, |_| 1))
    }

    async fn find(&self, query: &DocumentQuery) -> CoordinatorResult<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut found: Vec<Document> = documents
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        found.sort_by_key(|d| d.created);
        Ok(found)
    }
}
