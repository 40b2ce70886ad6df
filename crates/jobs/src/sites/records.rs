use std::sync::Arc;

use coordinator_core::{
    models::{object_types, Document, DocumentKey, DocumentQuery, SiteDescriptor},
    traits::DocumentStore,
    CoordinatorResult,
};

/// 站点文档的读写；站点文档本身属于全局站点
#[derive(Clone)]
pub struct SiteRecords {
    store: Arc<dyn DocumentStore>,
}

impl SiteRecords {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, uid: &str) -> CoordinatorResult<Option<SiteDescriptor>> {
        match self
            .store
            .get(&DocumentKey::global(object_types::SITE, uid))
            .await?
        {
            Some(doc) => Ok(Some(serde_json::from_value(doc.body)?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, site: &SiteDescriptor) -> CoordinatorResult<Document> {
        let body = serde_json::to_value(site)?;
        self.store
            .save(Document::new(
                object_types::SITE,
                &site.uid,
                coordinator_core::models::GLOBAL_SITE,
                body,
            ))
            .await
    }

    pub async fn all(&self) -> CoordinatorResult<Vec<SiteDescriptor>> {
        self.store
            .find(&DocumentQuery::of_type(object_types::SITE))
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc.body).map_err(Into::into))
            .collect()
    }

    /// 主机名是否已被其他站点占用
    pub async fn hostname_taken(&self, hostname: &str, except_uid: &str) -> CoordinatorResult<bool> {
        Ok(self
            .all()
            .await?
            .iter()
            .any(|s| s.uid != except_uid && s.hostname.eq_ignore_ascii_case(hostname)))
    }
}
