use std::collections::BTreeMap;

use coordinator_core::models::SiteDescriptor;
use tokio::sync::RwLock;

/// 进程内站点表
#[derive(Debug, Default)]
pub struct SiteRuntime {
    sites: RwLock<BTreeMap<String, SiteDescriptor>>,
}

impl SiteRuntime {
    pub async fn upsert(&self, site: SiteDescriptor) {
        self.sites.write().await.insert(site.uid.clone(), site);
    }

    /// 修改已知站点的激活状态，站点未知时返回 false
    pub async fn set_active(&self, uid: &str, active: bool) -> bool {
        match self.sites.write().await.get_mut(uid) {
            Some(site) => {
                site.active = active;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, uid: &str) -> Option<SiteDescriptor> {
        self.sites.read().await.get(uid).cloned()
    }

    pub async fn is_active(&self, uid: &str) -> bool {
        self.get(uid).await.is_some_and(|s| s.active)
    }

    pub async fn sites(&self) -> Vec<SiteDescriptor> {
        self.sites.read().await.values().cloned().collect()
    }
}
